//! Match lifecycle: readiness, map rotation, spawning and winner detection
//!
//! Waiting room (map index -1) → map chosen, players readying up → match
//! running → a sole survivor is crowned, which immediately rotates to a random
//! map and starts the cycle over.

use std::net::SocketAddr;

use log::{debug, info, warn};
use protocol::{Packet, PacketType, Vector2, CONTROL_CHANNEL, SPAWN_CHANNEL};
use rand::Rng;

use crate::error::LobbyError;
use crate::lobby::{Lobby, Session, WAITING_ROOM};

/// Bytes in a `ClientSpawned` body
pub const CLIENT_SPAWNED_LEN: usize = 26;

/// Spawn flag: player appears alive on the new map
pub const SPAWN_REVIVE: u8 = 0;
/// Spawn flag: late joiner appears already dead
pub const SPAWN_FORCED_DIE: u8 = 1;

/// Picks a catalog index for "any map".
///
/// The upper bound is `len - 1`, exclusive, so the last catalog entry is never
/// drawn here; it can still be selected explicitly with `/map`. Clients in the
/// wild are used to this rotation, so it stays.
pub(crate) fn random_map_index(rng: &mut impl Rng, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    rng.gen_range(0..len - 1)
}

impl Lobby {
    /// Starts the match when every occupied slot is ready. Otherwise the
    /// first unready slot is prompted again and nothing changes.
    pub fn try_start_match(&self) -> bool {
        info!("Trying to start match...");
        let mut session = self.session.lock();

        if session.in_match {
            warn!("Can't start match when already in fight!");
            return false;
        }

        let host_id = self
            .host_slot()
            .ok()
            .and_then(|host| self.player(host))
            .map(|host| host.steam_id)
            .unwrap_or(0);

        for slot in 0..self.capacity() {
            let Some(player) = self.player(slot) else { continue };
            let Some(addr) = player.addr else { continue };
            if !player.status.ready {
                self.send_to(
                    Packet::new(PacketType::StartMatch, CONTROL_CHANNEL, host_id),
                    addr,
                );
                warn!("Can't start match until all players are ready! (slot {})", slot);
                return false;
            }
        }

        session.in_match = true;
        self.broadcast(Packet::new(PacketType::StartMatch, CONTROL_CHANNEL, 0), None);
        info!("Started match!");
        true
    }

    /// Switches to `requested`, or to a random map when it is out of range,
    /// and returns the index actually chosen.
    pub fn change_map(&self, requested: i32) -> Result<usize, LobbyError> {
        let mut session = self.session.lock();
        let maps = self.maps();
        if maps.is_empty() {
            return Err(LobbyError::NoMaps);
        }

        let index = match usize::try_from(requested) {
            Ok(index) if index < maps.len() => index,
            _ => random_map_index(&mut session.rng, maps.len()),
        };
        session.map_index = index as i32;

        for slot in 0..self.capacity() {
            self.with_player(slot, |p| {
                if p.is_occupied() {
                    p.status.ready = false;
                    p.status.dead = false;
                }
            })?;
        }
        session.in_match = false;

        let map = &maps[index];
        let mut packet = Packet::new(PacketType::MapChange, CONTROL_CHANNEL, 0);
        packet.grow(2);
        packet.write_u8(session.last_winner);
        packet.write_u8(map.type_tag());
        packet.grow(map.byte_size());
        packet.write_bytes(map.raw_bytes());

        self.broadcast(packet, None);
        info!("Changed map index to {}: {:?}", index, map);

        for slot in 0..self.capacity() {
            let pending = self
                .player(slot)
                .filter(|p| p.is_occupied() && !p.status.spawned);
            if let Some(player) = pending {
                let position = player.status.position.position;
                let rotation = player.status.position.rotation;
                self.spawn_locked(&session, slot, position, rotation)?;
            }
        }

        drop(session);
        debug!(
            "Lobby after map change: {}",
            serde_json::to_string(&self.snapshot()).unwrap_or_default()
        );
        Ok(index)
    }

    pub fn spawn_player(
        &self,
        slot: usize,
        position: Vector2,
        rotation: Vector2,
    ) -> Result<(), LobbyError> {
        let session = self.session.lock();
        self.spawn_locked(&session, slot, position, rotation)
    }

    fn spawn_locked(
        &self,
        session: &Session,
        slot: usize,
        position: Vector2,
        rotation: Vector2,
    ) -> Result<(), LobbyError> {
        let addr: SocketAddr = self
            .with_player(slot, |p| p.addr)?
            .ok_or(LobbyError::EmptySlot(slot))?;

        let past_waiting_room = session.map_index != WAITING_ROOM;
        let flag = if past_waiting_room && self.occupants_excluding(Some(slot)) > 1 {
            SPAWN_FORCED_DIE
        } else {
            SPAWN_REVIVE
        };

        let mut packet = Packet::new(PacketType::ClientSpawned, SPAWN_CHANNEL, 0);
        packet.grow(CLIENT_SPAWNED_LEN);
        packet.write_u8(slot as u8);
        packet.write_f32_le(&[position.x, position.y, 0.0, rotation.x, rotation.y, 0.0]);
        packet.write_u8(flag);

        let max_health = self.max_health();
        self.with_player(slot, |p| {
            p.status.spawned = true;
            p.status.health = max_health;
            p.update_channel = (slot * 2 + 2) as u8;
            p.event_channel = p.update_channel + 1;
        })?;

        info!(
            "Spawned player {} at position {:?} with rotation {:?} using flag {}",
            slot, position, rotation, flag
        );
        self.broadcast(packet, None);

        if past_waiting_room {
            info!("Telling player {} to start match", slot);
            self.send_to(Packet::new(PacketType::StartMatch, CONTROL_CHANNEL, 0), addr);
        }
        Ok(())
    }

    /// Crowns `slot` when no other occupied slot is still alive, then rotates
    /// to a random map. Returns whether a winner was declared.
    pub fn check_winner(&self, slot: usize) -> Result<bool, LobbyError> {
        let someone_else_survived = (0..self.capacity())
            .filter(|other| *other != slot)
            .filter_map(|other| self.player(other))
            .any(|p| p.is_occupied() && !p.status.dead);

        if someone_else_survived {
            return Ok(false);
        }

        info!("Player {} is the winner", slot);
        self.session.lock().last_winner = slot as u8;
        self.change_map(-1)?;
        Ok(true)
    }

    /// The only occupied slot still alive, if exactly one is
    pub fn sole_survivor(&self) -> Option<usize> {
        let mut alive = (0..self.capacity())
            .filter(|slot| {
                self.player(*slot)
                    .map_or(false, |p| p.is_occupied() && !p.status.dead)
            });
        let first = alive.next()?;
        alive.next().is_none().then_some(first)
    }

    /// Marks a slot ready and advances the lifecycle if that completes a gate
    pub fn ready_up(&self, slot: usize) -> Result<(), LobbyError> {
        self.with_player(slot, |p| p.status.ready = true)?;
        debug!("Player {} is ready", slot);

        if !self.is_in_lobby() {
            self.try_start_match();
            return Ok(());
        }

        let occupied: Vec<_> = (0..self.capacity())
            .filter_map(|s| self.player(s))
            .filter(|p| p.is_occupied())
            .collect();
        if occupied.len() >= 2 && occupied.iter().all(|p| p.status.ready) {
            info!("Everyone in the waiting room is ready, picking a map");
            self.change_map(WAITING_ROOM)?;
        }
        Ok(())
    }

    /// Re-evaluates the match after a slot was vacated mid-fight
    pub fn handle_departure(&self) -> Result<(), LobbyError> {
        if !self.in_match() {
            return Ok(());
        }
        if let Some(survivor) = self.sole_survivor() {
            self.check_winner(survivor)?;
        }
        Ok(())
    }
}
