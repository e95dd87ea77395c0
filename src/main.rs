#[cfg(not(feature = "std"))]
fn main() {}

#[cfg(feature = "std")]
use std::path::PathBuf;

#[cfg(feature = "std")]
use battleship_server::{init_logging, DisconnectPolicy, Server, ServerConfig};
#[cfg(feature = "std")]
use clap::Parser;

/// Multi-client Battleship server speaking the `TYPE|PAYLOAD` line protocol.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[cfg(feature = "std")]
struct Cli {
    /// Address to listen on.
    #[arg(long)]
    bind: Option<String>,
    /// JSON file with server settings; flags override it.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, help = "Fix RNG seed for reproducible turn order (e.g., --seed 12345)")]
    seed: Option<u64>,
    /// Drop connections that send nothing for this many seconds.
    #[arg(long)]
    idle_timeout_secs: Option<u64>,
    /// What to do with a player whose opponent disconnects mid-game.
    #[arg(long, value_enum)]
    on_opponent_disconnect: Option<DisconnectPolicy>,
}

#[cfg(feature = "std")]
impl Cli {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_json_file(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(secs) = self.idle_timeout_secs {
            config.idle_timeout_secs = Some(secs);
        }
        if let Some(policy) = self.on_opponent_disconnect {
            config.on_opponent_disconnect = policy;
        }
        Ok(config)
    }
}

#[cfg(feature = "std")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let config = Cli::parse().into_config()?;
    if let Some(s) = config.seed {
        log::info!("using fixed seed {} (turn order is reproducible)", s);
    }
    Server::bind(config).await?.run().await
}
