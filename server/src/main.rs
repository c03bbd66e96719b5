use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;

/// UDP relay server for a single four-player lobby
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long)]
    host: Option<String>,
    /// Server port to listen on
    #[clap(short, long)]
    port: Option<u16>,
    /// JSON config file; flags override its values
    #[clap(short, long)]
    config: Option<std::path::PathBuf>,
    /// Player slots in the lobby (1-4)
    #[clap(short, long)]
    max_players: Option<usize>,
    /// Default log filter when RUST_LOG is unset
    #[clap(short, long)]
    log_level: Option<String>,
    /// Fixed seed for map rotation
    #[clap(long)]
    seed: Option<u64>,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        if self.host.is_some() || self.port.is_some() {
            let (default_host, default_port) = config
                .bind
                .rsplit_once(':')
                .map(|(host, port)| (host.to_string(), port.parse().unwrap_or(8080)))
                .unwrap_or_else(|| ("127.0.0.1".to_string(), 8080));
            let host = self.host.unwrap_or(default_host);
            let port = self.port.unwrap_or(default_port);
            config.bind = format!("{}:{}", host, port);
        }
        if let Some(max_players) = self.max_players {
            config.lobby.max_players = max_players;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Args::parse().into_config()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let mut server = Server::bind(config).await?;
    info!("Relay ready on {}", server.local_addr()?);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
