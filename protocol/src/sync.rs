//! Payloads clients exchange through the relay

use serde::Serialize;

use crate::packet::{CodecError, Packet};
use crate::KILLING_BLOW_DAMAGE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

macro_rules! wire_byte {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name(pub u8);

        impl From<u8> for $name {
            fn from(value: u8) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value.0
            }
        }
    };
}

wire_byte!(
    /// Client animation/locomotion state, relayed untouched
    #[derive(Serialize)]
    MovementType
);
wire_byte!(
    /// Client melee state, relayed untouched
    FightState
);
wire_byte!(
    /// Held weapon id, relayed untouched
    #[derive(Serialize)]
    WeaponType
);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DamageType {
    #[default]
    Other,
    Punch,
    Projectile,
    Hazard,
}

impl From<u8> for DamageType {
    fn from(value: u8) -> Self {
        match value {
            1 => DamageType::Punch,
            2 => DamageType::Projectile,
            3 => DamageType::Hazard,
            _ => DamageType::Other,
        }
    }
}

impl From<DamageType> for u8 {
    fn from(value: DamageType) -> u8 {
        match value {
            DamageType::Other => 0,
            DamageType::Punch => 1,
            DamageType::Projectile => 2,
            DamageType::Hazard => 3,
        }
    }
}

/// A shot in flight, reported by its owner
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Projectile {
    pub shoot_position: Vector2,
    pub shoot: Vector2,
    /// Client-side reconciliation key
    pub sync_index: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkPosition {
    pub position: Vector2,
    pub rotation: Vector2,
    pub y_value: u8,
    pub movement_type: MovementType,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkWeapon {
    pub fight_state: FightState,
    pub projectiles: Vec<Projectile>,
    pub weapon_type: WeaponType,
}

/// Body of a `PlayerUpdate` packet
///
/// ```text
/// i16 i16   position
/// u8  u8    rotation
/// u8        y value
/// u8        movement type
/// u8        fight state
/// u16       projectile count
///           per projectile: i16 i16 origin, u8 u8 direction, u16 sync index
/// u8        weapon type
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerUpdate {
    pub position: NetworkPosition,
    pub weapon: NetworkWeapon,
}

impl PlayerUpdate {
    pub fn decode(packet: &mut Packet) -> Result<Self, CodecError> {
        let position = Vector2::new(
            f32::from(packet.read_i16_le()?),
            f32::from(packet.read_i16_le()?),
        );
        let rotation = Vector2::new(
            f32::from(packet.read_u8()?),
            f32::from(packet.read_u8()?),
        );
        let y_value = packet.read_u8()?;
        let movement_type = MovementType(packet.read_u8()?);
        let fight_state = FightState(packet.read_u8()?);

        let count = usize::from(packet.read_u16_le()?);
        // 8 bytes per projectile; refuse absurd counts before allocating
        if packet.remaining() < count * 8 {
            return Err(CodecError::Truncated {
                wanted: count * 8,
                remaining: packet.remaining(),
            });
        }
        let mut projectiles = Vec::with_capacity(count);
        for _ in 0..count {
            let shoot_position = Vector2::new(
                f32::from(packet.read_i16_le()?),
                f32::from(packet.read_i16_le()?),
            );
            let shoot = Vector2::new(
                f32::from(packet.read_u8()?),
                f32::from(packet.read_u8()?),
            );
            let sync_index = packet.read_u16_le()?;
            projectiles.push(Projectile {
                shoot_position,
                shoot,
                sync_index,
            });
        }
        let weapon_type = WeaponType(packet.read_u8()?);

        Ok(Self {
            position: NetworkPosition {
                position,
                rotation,
                y_value,
                movement_type,
            },
            weapon: NetworkWeapon {
                fight_state,
                projectiles,
                weapon_type,
            },
        })
    }

    pub fn encoded_len(&self) -> usize {
        12 + self.weapon.projectiles.len() * 8
    }

    pub fn encode(&self, packet: &mut Packet) {
        packet.grow(self.encoded_len());
        let pos = &self.position;
        packet.write_i16_le(pos.position.x as i16);
        packet.write_i16_le(pos.position.y as i16);
        packet.write_u8(pos.rotation.x as u8);
        packet.write_u8(pos.rotation.y as u8);
        packet.write_u8(pos.y_value);
        packet.write_u8(pos.movement_type.into());
        packet.write_u8(self.weapon.fight_state.into());
        packet.write_u16_le(self.weapon.projectiles.len() as u16);
        for projectile in &self.weapon.projectiles {
            packet.write_i16_le(projectile.shoot_position.x as i16);
            packet.write_i16_le(projectile.shoot_position.y as i16);
            packet.write_u8(projectile.shoot.x as u8);
            packet.write_u8(projectile.shoot.y as u8);
            packet.write_u16_le(projectile.sync_index);
        }
        packet.write_u8(self.weapon.weapon_type.into());
    }
}

/// Body of a `PlayerTookDamage` packet, sent by the victim
#[derive(Debug, Clone, PartialEq)]
pub struct DamageReport {
    pub attacker: u8,
    pub damage: f32,
    pub particle_direction: Option<Vector2>,
    pub damage_type: DamageType,
}

impl DamageReport {
    pub fn decode(packet: &mut Packet) -> Result<Self, CodecError> {
        let attacker = packet.read_u8()?;
        let damage = packet.read_f32_le()?;

        let particle_direction = if packet.read_u8()? == 1 {
            Some(Vector2::new(packet.read_f32_le()?, packet.read_f32_le()?))
        } else {
            None
        };

        // Older clients stop here; the type byte is optional.
        let damage_type = if packet.remaining() > 0 {
            DamageType::from(packet.read_u8()?)
        } else {
            DamageType::Other
        };

        Ok(Self {
            attacker,
            damage,
            particle_direction,
            damage_type,
        })
    }

    pub fn is_killing_blow(&self) -> bool {
        self.damage == KILLING_BLOW_DAMAGE
    }
}
