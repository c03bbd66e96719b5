//! # Lobby Relay Server
//!
//! A UDP relay for one lobby of up to four players. Clients simulate the game
//! themselves; the server keeps a registry of who is in which slot, drives the
//! match lifecycle, inspects a few gameplay events and relays everything else.
//!
//! ## Core Responsibilities
//!
//! ### Registry
//! Binds client addresses to fixed player slots, tracks identities, derives the
//! host (lowest occupied slot) and frees slots on kick, leave or timeout.
//!
//! ### Match Lifecycle
//! Waiting room, map rotation, spawning, ready-up gating and winner detection.
//! A crowned winner immediately sends everyone to a random map.
//!
//! ### Event Handling
//! Movement, damage, chat (with host commands) and fall-outs update per-slot
//! status before being relayed. Unknown event types are relayed verbatim.
//!
//! ## Module Organization
//!
//! - `player`, `lobby`: slot state and the registry
//! - `lifecycle`: map changes, spawns, match start and winner checks
//! - `handlers`, `commands`: per-packet dispatch and host chat commands
//! - `level`, `identity`: map catalog entries and display-name lookup
//! - `network`, `config`: the UDP front end and its configuration
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind: "127.0.0.1:8080".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     let mut server = Server::bind(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! The server runs three kinds of tasks:
//! - **Receiver**: decodes datagrams and spawns one handler task per packet
//! - **Sender**: drains the outgoing datagram queue onto the socket
//! - **Timeout Checker**: frees slots whose clients went silent

pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod level;
pub mod lifecycle;
pub mod lobby;
pub mod network;
pub mod player;

pub use error::{HandlerError, LobbyError};
pub use lobby::{Lobby, LobbySettings};
