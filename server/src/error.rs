//! Error types for registry and handler failures

use std::net::SocketAddr;

use protocol::{CodecError, PacketType};

/// Failures of lobby registry and lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("lobby has reached max capacity")]
    CapacityExceeded,

    #[error("no player bound to address {0}")]
    UnknownAddress(SocketAddr),

    #[error("no player bound to identity {0}")]
    UnknownIdentity(u64),

    #[error("lobby has no players")]
    NoHost,

    #[error("slot {0} is out of range")]
    SlotOutOfRange(usize),

    #[error("slot {0} is empty")]
    EmptySlot(usize),

    #[error("map catalog is empty")]
    NoMaps,
}

/// Why a single inbound packet was dropped
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("malformed packet: {0}")]
    Malformed(#[from] CodecError),

    #[error(transparent)]
    Lobby(#[from] LobbyError),

    #[error("clients may not send {0:?}")]
    UnexpectedPacket(PacketType),

    #[error("packet has no source address")]
    NoSource,
}
