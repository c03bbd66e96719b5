//! Per-slot player state
//!
//! A lobby owns a fixed table of [`Player`] slots. A slot is free while its
//! address is `None`; admission binds an address, and eviction resets the whole
//! slot back to its default value.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use protocol::{NetworkPosition, NetworkWeapon, PlayerUpdate};
use serde::Serialize;

/// Transient sync state, overwritten by every movement update
#[derive(Debug, Clone, Default)]
pub struct Status {
    pub position: NetworkPosition,
    pub weapon: NetworkWeapon,
    /// May go negative; only a killing blow pins it to zero
    pub health: f32,
    pub moved: bool,
    pub ready: bool,
    pub spawned: bool,
    pub dead: bool,
}

/// Lifetime counters, kept across map changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub kills: u32,
    pub deaths: u32,
    pub punches_landed: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Player {
    pub addr: Option<SocketAddr>,
    /// Steam-style identity, 0 until the client introduces itself
    pub steam_id: u64,
    pub update_channel: u8,
    pub event_channel: u8,
    /// Last time we received any packet from this slot
    pub last_seen: Option<Instant>,
    pub status: Status,
    pub stats: Stats,
}

impl Player {
    pub fn admitted(addr: SocketAddr) -> Self {
        Self {
            addr: Some(addr),
            last_seen: Some(Instant::now()),
            ..Self::default()
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.addr.is_some()
    }

    pub fn is_bound_to(&self, addr: SocketAddr) -> bool {
        self.addr == Some(addr)
    }

    pub fn touch(&mut self) {
        self.last_seen = Some(Instant::now());
    }

    /// True once an occupied slot has been silent for longer than `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        match (self.addr, self.last_seen) {
            (Some(_), Some(seen)) => seen.elapsed() > timeout,
            _ => false,
        }
    }

    /// Stores a movement update. Returns true the first time the player moves.
    pub fn apply_update(&mut self, update: PlayerUpdate) -> bool {
        let first_move = !self.status.moved;
        self.status.moved = true;
        self.status.position = update.position;
        self.status.weapon = update.weapon;
        first_move
    }

    pub fn kill(&mut self) {
        self.status.health = 0.0;
        self.status.dead = true;
        self.stats.deaths += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
