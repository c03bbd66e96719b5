//! Map catalog entries
//!
//! The server never looks inside map data. A map is a type tag plus an opaque
//! blob that clients know how to load.

use std::fmt;
use std::sync::Arc;

/// A map the lobby can rotate to
pub trait MapSource: fmt::Debug + Send + Sync {
    fn type_tag(&self) -> u8;

    fn raw_bytes(&self) -> &[u8];

    fn byte_size(&self) -> usize {
        self.raw_bytes().len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MapKind {
    /// Built-in level, body is the level number as i32 LE
    Landfall = 0,
    /// Level blob shipped by the server
    CustomLocal = 1,
    /// Workshop level, body is the workshop id as u64 LE
    CustomOnline = 2,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Level {
    kind: MapKind,
    data: Vec<u8>,
}

impl Level {
    pub fn landfall(number: i32) -> Self {
        Self {
            kind: MapKind::Landfall,
            data: number.to_le_bytes().to_vec(),
        }
    }

    /// Map shown while the lobby waits for players
    pub fn waiting_room() -> Self {
        Self::landfall(0)
    }

    pub fn custom_local(data: Vec<u8>) -> Self {
        Self {
            kind: MapKind::CustomLocal,
            data,
        }
    }

    pub fn workshop(workshop_id: u64) -> Self {
        Self {
            kind: MapKind::CustomOnline,
            data: workshop_id.to_le_bytes().to_vec(),
        }
    }

    /// The stock rotation: four built-in levels and one workshop level
    pub fn default_catalog() -> Vec<Arc<dyn MapSource>> {
        vec![
            Arc::new(Level::landfall(1)),
            Arc::new(Level::landfall(2)),
            Arc::new(Level::landfall(3)),
            Arc::new(Level::landfall(4)),
            Arc::new(Level::workshop(2200042304)),
        ]
    }
}

impl MapSource for Level {
    fn type_tag(&self) -> u8 {
        self.kind as u8
    }

    fn raw_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MapKind::Landfall => {
                let mut n = [0u8; 4];
                n.copy_from_slice(&self.data[..4]);
                write!(f, "Landfall({})", i32::from_le_bytes(n))
            }
            MapKind::CustomOnline => {
                let mut id = [0u8; 8];
                id.copy_from_slice(&self.data[..8]);
                write!(f, "Workshop({})", u64::from_le_bytes(id))
            }
            MapKind::CustomLocal => write!(f, "CustomLocal({} bytes)", self.data.len()),
        }
    }
}
