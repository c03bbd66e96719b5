//! Lobby registry: slot table, settings and packet fan-out
//!
//! Locking follows two rules. The lobby lock (`session`) serializes admission,
//! eviction, map changes, spawning and match start. Each slot additionally has
//! its own lock so a handler can read, compute and commit one player's status
//! without tearing. The session lock is always taken before a slot lock, and no
//! slot lock is held while packets are being sent.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::{Mutex, MutexGuard};
use protocol::{NetworkPosition, Packet, PacketType, WeaponType, CONTROL_CHANNEL};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::LobbyError;
use crate::level::{Level, MapSource};
use crate::network::Outbound;
use crate::player::{Player, Stats};

/// Map index while the lobby sits in the waiting room
pub const WAITING_ROOM: i32 = -1;

/// Max health per health tier
pub const HEALTH_TIERS: [f32; 7] = [100.0, 200.0, 300.0, 1.0, 25.0, 50.0, 75.0];

/// Slot count the kick command and clients address (yellow, blue, red, green)
pub const MAX_SLOTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbySettings {
    pub max_players: usize,
    /// Index into [`HEALTH_TIERS`]
    pub health: u8,
    pub regen: u8,
    pub weapon_spawn_rate: u8,
    pub private: bool,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            max_players: MAX_SLOTS,
            health: 0,
            regen: 0,
            weapon_spawn_rate: 0,
            private: false,
        }
    }
}

impl LobbySettings {
    pub fn max_health(&self) -> f32 {
        HEALTH_TIERS
            .get(usize::from(self.health))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Match-wide state guarded by the lobby lock
pub(crate) struct Session {
    pub(crate) map_index: i32,
    pub(crate) in_match: bool,
    pub(crate) last_winner: u8,
    pub(crate) rng: StdRng,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// No map chosen yet
    Waiting,
    /// Map loaded, waiting for everyone to ready up
    Starting,
    InMatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotSnapshot {
    pub slot: usize,
    pub steam_id: u64,
    pub position: NetworkPosition,
    pub weapon_type: WeaponType,
    pub health: f32,
    pub ready: bool,
    pub spawned: bool,
    pub dead: bool,
    pub stats: Stats,
}

#[derive(Debug, Clone, Serialize)]
pub struct LobbySnapshot {
    pub phase: Phase,
    pub map_index: i32,
    pub last_winner: u8,
    pub players: Vec<SlotSnapshot>,
}

pub struct Lobby {
    settings: LobbySettings,
    maps: Vec<Arc<dyn MapSource>>,
    pub(crate) session: Mutex<Session>,
    players: Vec<Mutex<Player>>,
    outbound: Arc<dyn Outbound>,
    reject_self_damage: bool,
}

impl Lobby {
    pub fn new(
        settings: LobbySettings,
        maps: Vec<Arc<dyn MapSource>>,
        outbound: Arc<dyn Outbound>,
    ) -> Self {
        let players = (0..settings.max_players)
            .map(|_| Mutex::new(Player::default()))
            .collect();

        Self {
            settings,
            maps,
            session: Mutex::new(Session {
                map_index: WAITING_ROOM,
                in_match: false,
                last_winner: 0,
                rng: StdRng::from_entropy(),
            }),
            players,
            outbound,
            reject_self_damage: false,
        }
    }

    /// Makes random map selection reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.session.get_mut().rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_self_damage_rejection(mut self, reject: bool) -> Self {
        self.reject_self_damage = reject;
        self
    }

    pub fn settings(&self) -> &LobbySettings {
        &self.settings
    }

    pub fn maps(&self) -> &[Arc<dyn MapSource>] {
        &self.maps
    }

    pub fn capacity(&self) -> usize {
        self.players.len()
    }

    pub fn rejects_self_damage(&self) -> bool {
        self.reject_self_damage
    }

    pub fn max_health(&self) -> f32 {
        self.settings.max_health()
    }

    pub fn map_index(&self) -> i32 {
        self.session.lock().map_index
    }

    pub fn is_in_lobby(&self) -> bool {
        self.map_index() == WAITING_ROOM
    }

    pub fn in_match(&self) -> bool {
        self.session.lock().in_match
    }

    pub fn last_winner(&self) -> u8 {
        self.session.lock().last_winner
    }

    pub fn phase(&self) -> Phase {
        let session = self.session.lock();
        if session.map_index == WAITING_ROOM {
            Phase::Waiting
        } else if session.in_match {
            Phase::InMatch
        } else {
            Phase::Starting
        }
    }

    /// The map clients should currently have loaded
    pub fn current_map(&self) -> Arc<dyn MapSource> {
        usize::try_from(self.map_index())
            .ok()
            .and_then(|index| self.maps.get(index).cloned())
            .unwrap_or_else(|| Arc::new(Level::waiting_room()))
    }

    fn slot(&self, slot: usize) -> Result<MutexGuard<'_, Player>, LobbyError> {
        self.players
            .get(slot)
            .map(|p| p.lock())
            .ok_or(LobbyError::SlotOutOfRange(slot))
    }

    /// Runs `f` on one slot inside that slot's critical section
    pub fn with_player<R>(
        &self,
        slot: usize,
        f: impl FnOnce(&mut Player) -> R,
    ) -> Result<R, LobbyError> {
        let mut player = self.slot(slot)?;
        Ok(f(&mut player))
    }

    /// Copy of one slot's current state
    pub fn player(&self, slot: usize) -> Option<Player> {
        self.players.get(slot).map(|p| p.lock().clone())
    }

    /// Binds `addr` to the first free slot, or returns the slot it already holds
    pub fn admit(&self, addr: SocketAddr) -> Result<usize, LobbyError> {
        let _session = self.session.lock();

        if let Ok(index) = self.slot_of(addr) {
            self.touch(index);
            return Ok(index);
        }

        for (index, slot) in self.players.iter().enumerate() {
            let mut player = slot.lock();
            if !player.is_occupied() {
                *player = Player::admitted(addr);
                info!("Admitted {} into slot {}", addr, index);
                return Ok(index);
            }
        }

        Err(LobbyError::CapacityExceeded)
    }

    pub fn slot_of(&self, addr: SocketAddr) -> Result<usize, LobbyError> {
        self.players
            .iter()
            .position(|p| p.lock().is_bound_to(addr))
            .ok_or(LobbyError::UnknownAddress(addr))
    }

    /// Lowest occupied slot. Derived on every call, never stored.
    pub fn host_slot(&self) -> Result<usize, LobbyError> {
        self.players
            .iter()
            .position(|p| p.lock().is_occupied())
            .ok_or(LobbyError::NoHost)
    }

    pub fn identity_of(&self, addr: SocketAddr) -> Option<u64> {
        self.players.iter().find_map(|p| {
            let player = p.lock();
            player.is_bound_to(addr).then_some(player.steam_id)
        })
    }

    pub fn set_identity(&self, addr: SocketAddr, steam_id: u64) -> Result<usize, LobbyError> {
        let slot = self.slot_of(addr)?;
        self.with_player(slot, |p| p.steam_id = steam_id)?;
        debug!("Bound identity {} to slot {}", steam_id, slot);
        Ok(slot)
    }

    pub fn occupants_excluding(&self, exclude: Option<usize>) -> usize {
        self.players
            .iter()
            .enumerate()
            .filter(|(index, p)| Some(*index) != exclude && p.lock().is_occupied())
            .count()
    }

    pub fn touch(&self, slot: usize) {
        if let Some(player) = self.players.get(slot) {
            player.lock().touch();
        }
    }

    /// Kicks one slot: the occupant is told first, then the slot is wiped.
    /// The session lock is held across both steps.
    pub fn evict(&self, slot: usize) -> Result<(), LobbyError> {
        let _session = self.session.lock();
        let addr = self
            .with_player(slot, |p| p.addr)?
            .ok_or(LobbyError::EmptySlot(slot))?;

        self.send_to(Packet::new(PacketType::KickPlayer, CONTROL_CHANNEL, 0), addr);
        self.with_player(slot, Player::reset)?;
        info!("Kicked slot {} ({})", slot, addr);
        Ok(())
    }

    /// Kicks every slot bound to `steam_id`, then re-checks a running match
    /// the same way a leave does
    pub fn evict_by_identity(&self, steam_id: u64) -> Result<Vec<usize>, LobbyError> {
        let session = self.session.lock();
        let targets: Vec<(usize, SocketAddr)> = self
            .players
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let player = slot.lock();
                let addr = player.addr?;
                (player.steam_id == steam_id).then_some((index, addr))
            })
            .collect();

        if targets.is_empty() {
            return Err(LobbyError::UnknownIdentity(steam_id));
        }

        for &(index, addr) in &targets {
            self.send_to(Packet::new(PacketType::KickPlayer, CONTROL_CHANNEL, 0), addr);
            self.with_player(index, Player::reset)?;
            info!("Kicked identity {} from slot {}", steam_id, index);
        }
        drop(session);

        self.handle_departure()?;
        Ok(targets.into_iter().map(|(index, _)| index).collect())
    }

    /// Frees a slot without notifying anyone (client left or went silent)
    pub fn release(&self, slot: usize) -> Result<(), LobbyError> {
        let _session = self.session.lock();
        let mut player = self.slot(slot)?;
        if !player.is_occupied() {
            return Err(LobbyError::EmptySlot(slot));
        }
        player.reset();
        Ok(())
    }

    /// Frees every slot silent for longer than `timeout`
    pub fn evict_idle(&self, timeout: Duration) -> Vec<usize> {
        let _session = self.session.lock();
        let mut evicted = Vec::new();

        for (index, slot) in self.players.iter().enumerate() {
            let mut player = slot.lock();
            if player.is_timed_out(timeout) {
                warn!("Slot {} timed out ({:?})", index, player.addr);
                player.reset();
                evicted.push(index);
            }
        }
        evicted
    }

    fn occupied_addrs(&self) -> Vec<(usize, SocketAddr)> {
        self.players
            .iter()
            .enumerate()
            .filter_map(|(index, p)| p.lock().addr.map(|addr| (index, addr)))
            .collect()
    }

    pub fn send_to(&self, packet: Packet, addr: SocketAddr) {
        self.outbound.send_datagram(packet.to_bytes(), addr);
    }

    /// Sends `packet` to every occupied slot. With a caller, the caller is
    /// skipped and the packet carries the caller's bound identity rather than
    /// whatever the client wrote in the header.
    pub fn broadcast(&self, mut packet: Packet, caller: Option<SocketAddr>) {
        if let Some(caller) = caller {
            if let Some(steam_id) = self.identity_of(caller) {
                packet.steam_id = steam_id;
            }
        }

        let bytes = packet.to_bytes();
        for (_, addr) in self.occupied_addrs() {
            if Some(addr) == caller {
                continue;
            }
            self.outbound.send_datagram(bytes.clone(), addr);
        }
    }

    pub fn snapshot(&self) -> LobbySnapshot {
        let phase = self.phase();
        let session = self.session.lock();
        let players = self
            .players
            .iter()
            .enumerate()
            .filter_map(|(slot, p)| {
                let player = p.lock();
                player.is_occupied().then(|| SlotSnapshot {
                    slot,
                    steam_id: player.steam_id,
                    position: player.status.position.clone(),
                    weapon_type: player.status.weapon.weapon_type,
                    health: player.status.health,
                    ready: player.status.ready,
                    spawned: player.status.spawned,
                    dead: player.status.dead,
                    stats: player.stats,
                })
            })
            .collect();

        LobbySnapshot {
            phase,
            map_index: session.map_index,
            last_winner: session.last_winner,
            players,
        }
    }
}
