//! Per-packet handlers
//!
//! [`HandlerContext::dispatch`] routes one inbound packet by its type tag. Only
//! a handful of types are inspected; everything else is relayed verbatim to the
//! other players with the sender's bound identity.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use protocol::{DamageReport, DamageType, Packet, PacketType, PlayerUpdate, Vector2, CONTROL_CHANNEL};

use crate::commands;
use crate::error::{HandlerError, LobbyError};
use crate::identity::IdentityResolver;
use crate::lobby::Lobby;

/// What a damage report did to its victim
#[derive(Debug, Clone, Copy, PartialEq)]
enum DamageOutcome {
    Discarded(&'static str),
    Hurt { health: f32 },
    Killed,
}

#[derive(Clone)]
pub struct HandlerContext {
    pub lobby: Arc<Lobby>,
    pub resolver: Arc<dyn IdentityResolver>,
}

impl HandlerContext {
    pub fn new(lobby: Arc<Lobby>, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { lobby, resolver }
    }

    pub fn dispatch(&self, packet: Packet) -> Result<(), HandlerError> {
        let src = packet.src.ok_or(HandlerError::NoSource)?;
        let packet_type = packet.packet_type;
        if packet_type.is_server_only() {
            return Err(HandlerError::UnexpectedPacket(packet_type));
        }

        match packet_type {
            PacketType::Ping => return self.on_ping(packet, src),
            PacketType::ClientRequestingAccepting => return self.on_requesting_accepting(packet, src),
            _ => {}
        }

        let slot = self.lobby.slot_of(src)?;
        self.lobby.touch(slot);

        match packet_type {
            PacketType::PlayerUpdate => self.on_player_update(packet, slot, src),
            PacketType::PlayerTookDamage => self.on_player_took_damage(packet, slot, src),
            PacketType::PlayerTalked => self.on_player_talked(packet, slot, src),
            PacketType::PlayerFallOut => self.on_player_fall_out(packet, src),
            PacketType::ClientRequestingIndex => self.on_requesting_index(packet, slot, src),
            PacketType::ClientRequestingToSpawn => self.on_requesting_to_spawn(packet, slot),
            PacketType::ClientReadyUp => self.on_ready_up(packet, slot, src),
            PacketType::ClientLeft => self.on_client_left(packet, slot, src),
            _ => {
                trace!("Relaying {:?} from slot {}", packet_type, slot);
                self.lobby.broadcast(packet, Some(src));
                Ok(())
            }
        }
    }

    fn on_ping(&self, packet: Packet, src: SocketAddr) -> Result<(), HandlerError> {
        let reply = Packet::with_body(
            PacketType::PingResponse,
            packet.channel,
            0,
            packet.body().to_vec(),
        );
        self.lobby.send_to(reply, src);
        Ok(())
    }

    fn on_requesting_accepting(&self, packet: Packet, src: SocketAddr) -> Result<(), HandlerError> {
        let slot = match self.lobby.admit(src) {
            Ok(slot) => slot,
            Err(e) => {
                warn!("Turning away {}: {}", src, e);
                self.lobby
                    .send_to(Packet::new(PacketType::KickPlayer, CONTROL_CHANNEL, 0), src);
                return Err(e.into());
            }
        };

        self.lobby.set_identity(src, packet.steam_id)?;
        let name = self.resolver.resolve_username(packet.steam_id);
        info!(
            "Accepted {} ({:?}, id {}) into slot {}",
            src, name, packet.steam_id, slot
        );

        let mut reply = Packet::new(PacketType::ClientAccepted, CONTROL_CHANNEL, 0);
        reply.grow(2);
        reply.write_u8(slot as u8);
        reply.write_u8(self.lobby.capacity() as u8);
        self.lobby.send_to(reply, src);
        Ok(())
    }

    fn on_player_update(&self, mut packet: Packet, slot: usize, src: SocketAddr) -> Result<(), HandlerError> {
        let update = PlayerUpdate::decode(&mut packet)?;
        trace!("New state for slot {}: {:?}", slot, update);

        if self.lobby.with_player(slot, |p| p.apply_update(update))? {
            debug!("Player {} has moved!", slot);
        }

        self.lobby.broadcast(packet, Some(src));
        Ok(())
    }

    /// The victim is whoever sent the report
    fn on_player_took_damage(
        &self,
        mut packet: Packet,
        victim: usize,
        src: SocketAddr,
    ) -> Result<(), HandlerError> {
        let report = DamageReport::decode(&mut packet)?;
        let attacker = usize::from(report.attacker);
        if attacker >= self.lobby.capacity() {
            return Err(LobbyError::SlotOutOfRange(attacker).into());
        }

        if attacker == victim {
            warn!("Player {} tried damaging themselves", victim);
            if self.lobby.rejects_self_damage() {
                return Ok(());
            }
        }

        let in_lobby = self.lobby.is_in_lobby();
        let outcome = self.lobby.with_player(victim, |p| {
            if p.status.dead {
                return DamageOutcome::Discarded("being dead");
            }
            if !p.status.ready && !in_lobby {
                return DamageOutcome::Discarded("not being ready");
            }
            if report.is_killing_blow() {
                p.kill();
                DamageOutcome::Killed
            } else {
                p.status.health -= report.damage;
                DamageOutcome::Hurt {
                    health: p.status.health,
                }
            }
        })?;

        let punched = report.damage_type == DamageType::Punch && attacker != victim;
        match outcome {
            DamageOutcome::Discarded(reason) => {
                warn!("Player {} took damage despite {}, tossing", victim, reason);
                return Ok(());
            }
            DamageOutcome::Hurt { health } => {
                if punched {
                    self.lobby.with_player(attacker, |p| p.stats.punches_landed += 1)?;
                }
                info!(
                    "Player {} took {} {:?} damage from player {} ({} left)",
                    victim, report.damage, report.damage_type, attacker, health
                );
            }
            DamageOutcome::Killed => {
                self.lobby.with_player(attacker, |p| {
                    if punched {
                        p.stats.punches_landed += 1;
                    }
                    p.stats.kills += 1;
                })?;
                info!(
                    "Player {} took a killing blow from player {} of type {:?}",
                    victim, attacker, report.damage_type
                );
                if self.lobby.occupants_excluding(Some(victim)) > 0 {
                    self.lobby.check_winner(attacker)?;
                }
            }
        }

        self.lobby.broadcast(packet, Some(src));
        Ok(())
    }

    fn on_player_talked(&self, packet: Packet, slot: usize, src: SocketAddr) -> Result<(), HandlerError> {
        let body = packet.body().to_vec();
        self.lobby.broadcast(packet, Some(src));

        let Some(line) = body.strip_prefix(b"/") else {
            return Ok(());
        };
        if self.lobby.host_slot()? != slot {
            return Ok(());
        }

        let line = String::from_utf8_lossy(line);
        info!("Host ran command: /{}", line);
        let reply = commands::run(&self.lobby, slot, &line);

        let host = self.lobby.player(slot).unwrap_or_default();
        let response = Packet::with_body(
            PacketType::PlayerTalked,
            host.event_channel,
            host.steam_id,
            reply.into_bytes(),
        );
        self.lobby.send_to(response, src);
        Ok(())
    }

    fn on_player_fall_out(&self, mut packet: Packet, src: SocketAddr) -> Result<(), HandlerError> {
        let victim = usize::from(packet.read_u8()?);
        self.lobby.with_player(victim, |p| p.kill())?;
        info!("Player {} fell out of the map", victim);

        self.lobby.check_winner(victim)?;
        self.lobby.broadcast(packet, Some(src));
        Ok(())
    }

    fn on_requesting_index(&self, packet: Packet, slot: usize, src: SocketAddr) -> Result<(), HandlerError> {
        let mut reply = Packet::new(PacketType::ClientRequestingIndex, packet.channel, 0);
        reply.grow(1);
        reply.write_u8(slot as u8);
        self.lobby.send_to(reply, src);
        Ok(())
    }

    fn on_requesting_to_spawn(&self, mut packet: Packet, slot: usize) -> Result<(), HandlerError> {
        let values = packet.read_f32_le_n(4)?;
        let position = Vector2::new(values[0], values[1]);
        let rotation = Vector2::new(values[2], values[3]);
        self.lobby.spawn_player(slot, position, rotation)?;
        Ok(())
    }

    fn on_ready_up(&self, packet: Packet, slot: usize, src: SocketAddr) -> Result<(), HandlerError> {
        self.lobby.ready_up(slot)?;
        self.lobby.broadcast(packet, Some(src));
        Ok(())
    }

    fn on_client_left(&self, packet: Packet, slot: usize, src: SocketAddr) -> Result<(), HandlerError> {
        self.lobby.broadcast(packet, Some(src));
        self.lobby.release(slot)?;
        info!("Player {} left ({})", slot, src);
        self.lobby.handle_departure()?;
        Ok(())
    }
}
