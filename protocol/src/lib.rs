//! Wire protocol shared by the relay server and its tests
//!
//! One UDP datagram carries one [`Packet`]: a fixed header (type tag, logical
//! channel, sender identity) and a little-endian body. The [`sync`] module holds
//! the typed bodies the server inspects; everything else is relayed as bytes.

pub mod packet;
pub mod packet_type;
pub mod sync;

pub use packet::{CodecError, Packet};
pub use packet_type::PacketType;
pub use sync::{
    DamageReport, DamageType, FightState, MovementType, NetworkPosition, NetworkWeapon,
    PlayerUpdate, Projectile, Vector2, WeaponType,
};

/// Header bytes in front of every body
pub const HEADER_LEN: usize = 10;

/// Largest UDP payload over IPv4
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Damage value clients send to signal an instant kill
pub const KILLING_BLOW_DAMAGE: f32 = 666.666;

/// Channel used for lobby-wide control packets
pub const CONTROL_CHANNEL: u8 = 1;

/// Channel used for spawn announcements
pub const SPAWN_CHANNEL: u8 = 0;
