use crate::ship::ShipKind;

/// Side length of the square grid.
pub const BOARD_SIZE: usize = 10;
pub const NUM_SHIPS: usize = 5;
/// Fleet every player places, largest first.
pub const FLEET: [ShipKind; NUM_SHIPS] = ShipKind::ALL;

/// Total number of ship segments in a full fleet.
pub const TOTAL_SHIP_CELLS: usize = 5 + 4 + 3 + 3 + 2;

/// Listening port when none is configured.
pub const DEFAULT_PORT: u16 = 12345;

/// Maximum accepted length of one protocol line, in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// The first fleet kind with `length` that `taken` does not yet contain.
pub fn kind_for_length(length: usize, taken: impl Fn(ShipKind) -> bool) -> Option<ShipKind> {
    FLEET
        .into_iter()
        .find(|kind| kind.length() == length && !taken(*kind))
}

#[cfg(feature = "std")]
pub use server_config::*;

#[cfg(feature = "std")]
mod server_config {
    use std::path::Path;
    use std::time::Duration;

    use anyhow::Context;
    use serde::Deserialize;

    use super::{DEFAULT_MAX_LINE_LENGTH, DEFAULT_PORT};

    /// What happens to a player whose opponent drops out of a live match.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
    #[serde(rename_all = "snake_case")]
    pub enum DisconnectPolicy {
        /// Close the survivor's connection as well.
        #[default]
        Close,
        /// Put the survivor back in the lobby.
        Lobby,
    }

    /// Runtime settings for the server.
    #[derive(Debug, Clone, Deserialize)]
    #[serde(default)]
    pub struct ServerConfig {
        pub bind: String,
        /// Fixed seed for turn-order coin flips.
        pub seed: Option<u64>,
        /// Close connections that stay silent this long.
        pub idle_timeout_secs: Option<u64>,
        pub max_line_length: usize,
        pub on_opponent_disconnect: DisconnectPolicy,
    }

    impl Default for ServerConfig {
        fn default() -> Self {
            Self {
                bind: format!("0.0.0.0:{}", DEFAULT_PORT),
                seed: None,
                idle_timeout_secs: None,
                max_line_length: DEFAULT_MAX_LINE_LENGTH,
                on_opponent_disconnect: DisconnectPolicy::default(),
            }
        }
    }

    impl ServerConfig {
        /// Load settings from a JSON file. Missing fields keep their defaults.
        pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
            let path = path.as_ref();
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Self::from_json_str(&raw).with_context(|| format!("parsing config {}", path.display()))
        }

        pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
            Ok(serde_json::from_str(raw)?)
        }

        pub fn idle_timeout(&self) -> Option<Duration> {
            self.idle_timeout_secs.map(Duration::from_secs)
        }
    }
}
