/// Op-code carried in the first header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Ping = 0,
    PingResponse = 1,
    ClientJoined = 2,
    ClientRequestingAccepting = 3,
    ClientAccepted = 4,
    ClientInit = 5,
    ClientRequestingIndex = 6,
    ClientRequestingToSpawn = 7,
    ClientSpawned = 8,
    ClientReadyUp = 9,
    PlayerUpdate = 10,
    PlayerTookDamage = 11,
    PlayerTalked = 12,
    PlayerForceAdded = 13,
    PlayerForceAddedAndBlock = 14,
    PlayerLavaForceAdded = 15,
    PlayerFallOut = 16,
    PlayerWonWithRicochet = 17,
    MapChange = 18,
    WeaponSpawned = 19,
    WeaponThrown = 20,
    RequestingWeaponThrow = 21,
    ClientRequestWeaponDrop = 22,
    WeaponDropped = 23,
    WeaponWasPickedUp = 24,
    ClientRequestingWeaponPickUp = 25,
    ObjectUpdate = 26,
    ObjectSpawned = 27,
    ObjectSimpleDestruction = 28,
    ObjectInvisibilityToggle = 29,
    ObjectHello = 30,
    ObjectDestructionCollision = 31,
    GroundWeaponsInit = 32,
    MapInfo = 33,
    MapInfoSync = 34,
    WorkshopMapsLoaded = 35,
    StartMatch = 36,
    ObjectUpdateDestructionDamage = 37,
    RequestObjectDestructionDamage = 38,
    KickPlayer = 39,
    ClientLeft = 40,
}

impl PacketType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        use PacketType::*;
        let packet_type = match tag {
            0 => Ping,
            1 => PingResponse,
            2 => ClientJoined,
            3 => ClientRequestingAccepting,
            4 => ClientAccepted,
            5 => ClientInit,
            6 => ClientRequestingIndex,
            7 => ClientRequestingToSpawn,
            8 => ClientSpawned,
            9 => ClientReadyUp,
            10 => PlayerUpdate,
            11 => PlayerTookDamage,
            12 => PlayerTalked,
            13 => PlayerForceAdded,
            14 => PlayerForceAddedAndBlock,
            15 => PlayerLavaForceAdded,
            16 => PlayerFallOut,
            17 => PlayerWonWithRicochet,
            18 => MapChange,
            19 => WeaponSpawned,
            20 => WeaponThrown,
            21 => RequestingWeaponThrow,
            22 => ClientRequestWeaponDrop,
            23 => WeaponDropped,
            24 => WeaponWasPickedUp,
            25 => ClientRequestingWeaponPickUp,
            26 => ObjectUpdate,
            27 => ObjectSpawned,
            28 => ObjectSimpleDestruction,
            29 => ObjectInvisibilityToggle,
            30 => ObjectHello,
            31 => ObjectDestructionCollision,
            32 => GroundWeaponsInit,
            33 => MapInfo,
            34 => MapInfoSync,
            35 => WorkshopMapsLoaded,
            36 => StartMatch,
            37 => ObjectUpdateDestructionDamage,
            38 => RequestObjectDestructionDamage,
            39 => KickPlayer,
            40 => ClientLeft,
            _ => return None,
        };
        Some(packet_type)
    }

    /// Types only the server may originate; clients sending them are ignored
    pub fn is_server_only(self) -> bool {
        matches!(
            self,
            PacketType::ClientAccepted
                | PacketType::ClientSpawned
                | PacketType::MapChange
                | PacketType::StartMatch
                | PacketType::KickPlayer
        )
    }
}
