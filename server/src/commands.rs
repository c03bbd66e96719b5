//! Host chat commands
//!
//! A chat line from the host that starts with `/` is parsed here. The outcome
//! is always one line of text sent back to the host; argument problems are
//! [`CommandError`]s whose `Display` text is that line.

use log::info;

use crate::error::LobbyError;
use crate::lobby::Lobby;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Must specify message to echo!")]
    MissingEchoText,

    #[error("Must specify map index!")]
    MissingMapIndex,

    #[error("Invalid map index! 0-{max}")]
    InvalidMapIndex { max: i64 },

    #[error("Must specify player to kick!")]
    MissingKickTarget,

    #[error("Unknown player!")]
    UnknownPlayer,

    #[error("Can't kick yourself!")]
    KickSelf,

    #[error("Unknown command!")]
    Unknown,

    #[error("{0}")]
    Lobby(#[from] LobbyError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Echo(Vec<&'a str>),
    Map(&'a str),
    Kick(&'a str),
}

/// Slot addressed by a kick token: number 1-4 or player color
pub fn kick_target(token: &str) -> Option<usize> {
    match token {
        "1" | "yellow" | "y" => Some(0),
        "2" | "blue" | "b" => Some(1),
        "3" | "red" | "r" => Some(2),
        "4" | "green" | "g" => Some(3),
        _ => None,
    }
}

impl<'a> Command<'a> {
    /// Parses a command line with the leading `/` already stripped
    pub fn parse(line: &'a str) -> Result<Self, CommandError> {
        let mut words = line.split(' ');
        let name = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        match name {
            "echo" if args.is_empty() => Err(CommandError::MissingEchoText),
            "echo" => Ok(Command::Echo(args)),
            "map" => args
                .first()
                .copied()
                .map(Command::Map)
                .ok_or(CommandError::MissingMapIndex),
            "kick" => args
                .first()
                .copied()
                .map(Command::Kick)
                .ok_or(CommandError::MissingKickTarget),
            _ => Err(CommandError::Unknown),
        }
    }

    /// Runs the command on behalf of the host in slot `issuer`
    pub fn execute(self, lobby: &Lobby, issuer: usize) -> Result<String, CommandError> {
        match self {
            Command::Echo(words) => Ok(words.join(" ")),
            Command::Map(raw) => {
                let max = lobby.maps().len() as i64 - 1;
                let index = raw
                    .parse::<i32>()
                    .ok()
                    .filter(|index| (0..=max).contains(&i64::from(*index)))
                    .ok_or(CommandError::InvalidMapIndex { max })?;
                lobby.change_map(index)?;
                Ok("Map changed!".to_string())
            }
            Command::Kick(token) => {
                let target = kick_target(token).ok_or(CommandError::UnknownPlayer)?;
                if target == issuer {
                    return Err(CommandError::KickSelf);
                }
                match lobby.evict(target) {
                    Ok(()) => {
                        info!("Host kicked slot {}", target);
                        lobby.handle_departure()?;
                    }
                    Err(LobbyError::EmptySlot(_)) => info!("Slot {} already empty", target),
                    Err(LobbyError::SlotOutOfRange(_)) => return Err(CommandError::UnknownPlayer),
                    Err(e) => return Err(e.into()),
                }
                Ok(format!("Kicked player: {}", token))
            }
        }
    }
}

/// Parses and runs one command line, returning the reply text
pub fn run(lobby: &Lobby, issuer: usize, line: &str) -> String {
    match Command::parse(line).and_then(|command| command.execute(lobby, issuer)) {
        Ok(reply) => reply,
        Err(e) => e.to_string(),
    }
}
