//! Server configuration
//!
//! Everything has a default, so the server starts without a config file. A JSON
//! file may override any subset of fields; command-line flags are applied on
//! top of that in `main`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use protocol::{HEADER_LEN, MAX_DATAGRAM_SIZE};
use serde::{Deserialize, Serialize};

use crate::level::{Level, MapSource};
use crate::lobby::{LobbySettings, HEALTH_TIERS, MAX_SLOTS};

/// Winner byte and type tag in front of the map blob
const MAP_CHANGE_PREFIX: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("health tier {0} is out of range 0-6")]
    InvalidHealthTier(u8),

    #[error("max players must be between 1 and 4, got {0}")]
    InvalidMaxPlayers(usize),

    #[error("map catalog is empty")]
    EmptyCatalog,

    #[error("map {index} is {size} bytes, too large for one datagram")]
    MapTooLarge { index: usize, size: usize },
}

/// One catalog entry as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapEntry {
    Landfall(i32),
    Workshop(u64),
    /// Level blob read from disk and shipped as a custom local map
    File(PathBuf),
}

impl MapEntry {
    fn load(&self) -> Result<Level, ConfigError> {
        Ok(match self {
            MapEntry::Landfall(number) => Level::landfall(*number),
            MapEntry::Workshop(id) => Level::workshop(*id),
            MapEntry::File(path) => {
                let data = fs::read(path).map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
                Level::custom_local(data)
            }
        })
    }
}

fn default_catalog() -> Vec<MapEntry> {
    vec![
        MapEntry::Landfall(1),
        MapEntry::Landfall(2),
        MapEntry::Landfall(3),
        MapEntry::Landfall(4),
        MapEntry::Workshop(2200042304),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Default `env_logger` filter, `RUST_LOG` wins when set
    pub log_level: String,
    pub lobby: LobbySettings,
    pub maps: Vec<MapEntry>,
    /// Seconds of silence before a slot is freed
    pub idle_timeout_secs: u64,
    pub reject_self_damage: bool,
    /// Fixed RNG seed for reproducible map rotation
    pub seed: Option<u64>,
    pub names: HashMap<u64, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            log_level: "info".to_string(),
            lobby: LobbySettings::default(),
            maps: default_catalog(),
            idle_timeout_secs: 5,
            reject_self_damage: false,
            seed: None,
            names: HashMap::new(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if usize::from(self.lobby.health) >= HEALTH_TIERS.len() {
            return Err(ConfigError::InvalidHealthTier(self.lobby.health));
        }
        if !(1..=MAX_SLOTS).contains(&self.lobby.max_players) {
            return Err(ConfigError::InvalidMaxPlayers(self.lobby.max_players));
        }
        if self.maps.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        Ok(())
    }

    /// Loads every catalog entry, reading map files from disk
    pub fn build_maps(&self) -> Result<Vec<Arc<dyn MapSource>>, ConfigError> {
        let mut maps: Vec<Arc<dyn MapSource>> = Vec::with_capacity(self.maps.len());
        for (index, entry) in self.maps.iter().enumerate() {
            let level = entry.load()?;
            let size = level.byte_size();
            if HEADER_LEN + MAP_CHANGE_PREFIX + size > MAX_DATAGRAM_SIZE {
                return Err(ConfigError::MapTooLarge { index, size });
            }
            maps.push(Arc::new(level));
        }
        if maps.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        Ok(maps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::MapKind;
    use std::io::Write;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("relay-config-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.lobby.max_players, 4);
        assert_eq!(config.idle_timeout_secs, 5);
        assert!(!config.reject_self_damage);
        assert!(config.validate().is_ok());

        let maps = config.build_maps().unwrap();
        assert_eq!(maps.len(), 5);
        assert_eq!(maps[4].type_tag(), MapKind::CustomOnline as u8);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ServerConfig::from_json(
            r#"{
                "bind": "0.0.0.0:9000",
                "lobby": { "health": 2 },
                "maps": [{ "landfall": 7 }, { "workshop": 12 }],
                "names": { "76561198000000000": "alice" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.lobby.health, 2);
        assert_eq!(config.lobby.max_players, 4);
        assert_eq!(config.maps, vec![MapEntry::Landfall(7), MapEntry::Workshop(12)]);
        assert_eq!(config.names.get(&76561198000000000).map(String::as_str), Some("alice"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            ServerConfig::from_json("{ \"maps\": 3 }"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validate() {
        let mut config = ServerConfig::default();
        config.lobby.health = 7;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidHealthTier(7))));

        let mut config = ServerConfig::default();
        config.lobby.max_players = 5;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidMaxPlayers(5))));
        config.lobby.max_players = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidMaxPlayers(0))));

        let mut config = ServerConfig::default();
        config.maps.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyCatalog)));
        assert!(matches!(config.build_maps(), Err(ConfigError::EmptyCatalog)));
    }

    #[test]
    fn test_file_map_entry() {
        let path = temp_path("level.bin");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&[9, 8, 7, 6, 5]).unwrap();

        let config = ServerConfig {
            maps: vec![MapEntry::File(path.clone())],
            ..ServerConfig::default()
        };
        let maps = config.build_maps().unwrap();
        assert_eq!(maps[0].type_tag(), MapKind::CustomLocal as u8);
        assert_eq!(maps[0].raw_bytes(), &[9, 8, 7, 6, 5]);

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_oversized_map_rejected() {
        let path = temp_path("huge.bin");
        fs::write(&path, vec![0u8; MAX_DATAGRAM_SIZE]).unwrap();

        let config = ServerConfig {
            maps: vec![MapEntry::Landfall(1), MapEntry::File(path.clone())],
            ..ServerConfig::default()
        };
        assert!(matches!(
            config.build_maps(),
            Err(ConfigError::MapTooLarge { index: 1, .. })
        ));

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ServerConfig::load(temp_path("does-not-exist.json")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_load_from_disk() {
        let path = temp_path("config.json");
        fs::write(&path, r#"{ "idle_timeout_secs": 30, "seed": 11 }"#).unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.idle_timeout_secs, 30);
        assert_eq!(config.seed, Some(11));

        fs::remove_file(path).unwrap();
    }
}
