//! UDP front end: one receiver loop, one sender task, one timeout checker
//!
//! Every inbound datagram is decoded and dispatched on its own task. Handlers
//! never touch the socket; they push [`Datagram`]s onto an unbounded channel
//! that a single sender task drains.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use protocol::{Packet, MAX_DATAGRAM_SIZE};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::config::{ConfigError, ServerConfig};
use crate::error::HandlerError;
use crate::handlers::HandlerContext;
use crate::identity::{CachedResolver, NameBook};
use crate::lobby::Lobby;

/// How often idle slots are swept
const TIMEOUT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// One outgoing datagram queued for the sender task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub bytes: Vec<u8>,
    pub addr: SocketAddr,
}

/// Fire-and-forget datagram sink used by the lobby
pub trait Outbound: Send + Sync {
    fn send_datagram(&self, bytes: Vec<u8>, addr: SocketAddr);
}

impl Outbound for mpsc::UnboundedSender<Datagram> {
    fn send_datagram(&self, bytes: Vec<u8>, addr: SocketAddr) {
        if let Err(e) = self.send(Datagram { bytes, addr }) {
            error!("Failed to queue datagram for {}: {}", addr, e);
        }
    }
}

/// Errors that stop the server from starting
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Relay server owning the socket and the single lobby
pub struct Server {
    socket: Arc<UdpSocket>,
    context: HandlerContext,
    idle_timeout: Duration,
    outbound_rx: Option<mpsc::UnboundedReceiver<Datagram>>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let maps = config.build_maps()?;

        let socket = UdpSocket::bind(&config.bind)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind.clone(),
                source,
            })?;
        info!("Server listening on {}", socket.local_addr()?);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let mut lobby = Lobby::new(config.lobby.clone(), maps, Arc::new(outbound_tx))
            .with_self_damage_rejection(config.reject_self_damage);
        if let Some(seed) = config.seed {
            lobby = lobby.with_seed(seed);
        }

        let resolver = CachedResolver::new(NameBook::new(config.names.clone()));
        let context = HandlerContext::new(Arc::new(lobby), Arc::new(resolver));

        Ok(Self {
            socket: Arc::new(socket),
            context,
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            outbound_rx: Some(outbound_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn lobby(&self) -> Arc<Lobby> {
        Arc::clone(&self.context.lobby)
    }

    /// Spawns task that drains the outgoing datagram queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let Some(mut outbound_rx) = self.outbound_rx.take() else {
            warn!("Sender task already running");
            return;
        };

        tokio::spawn(async move {
            while let Some(Datagram { bytes, addr }) = outbound_rx.recv().await {
                if let Err(e) = socket.send_to(&bytes, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
            debug!("Outbound queue closed");
        });
    }

    /// Spawns task that frees slots whose clients went silent
    fn spawn_timeout_checker(&self) {
        let lobby = self.lobby();
        let timeout = self.idle_timeout;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TIMEOUT_CHECK_INTERVAL);

            loop {
                interval.tick().await;

                let timed_out = lobby.evict_idle(timeout);
                if timed_out.is_empty() {
                    continue;
                }
                info!("Released timed out slots {:?}", timed_out);
                if let Err(e) = lobby.handle_departure() {
                    warn!("Failed to resolve match after timeout: {}", e);
                }
            }
        });
    }

    /// Receives datagrams until the socket fails for good
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Server started successfully");

        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            match self.socket.recv_from(&mut buffer).await {
                Ok((len, addr)) => {
                    let packet = match Packet::from_datagram(&buffer[..len], addr) {
                        Ok(packet) => packet,
                        Err(e) => {
                            debug!("Dropping datagram from {}: {}", addr, e);
                            continue;
                        }
                    };
                    trace!("Received {:?}", packet);

                    let context = self.context.clone();
                    tokio::spawn(async move {
                        let packet_type = packet.packet_type;
                        match context.dispatch(packet) {
                            Ok(()) => {}
                            Err(HandlerError::Lobby(e)) => {
                                debug!("{:?} from {} ignored: {}", packet_type, addr, e)
                            }
                            Err(e) => warn!("{:?} from {} dropped: {}", packet_type, addr, e),
                        }
                    });
                }
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}
