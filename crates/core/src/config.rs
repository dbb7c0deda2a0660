use std::path::PathBuf;

use shutterlink_connection::{ReconnectConfig, TransportConfig};
use shutterlink_protocol::constants::{DEFAULT_RELAY_URL, OPERATOR_ROLE};
use shutterlink_transfer::ChunkOrdering;

/// Directory downloads land in when none is configured.
pub const DEFAULT_SAVE_DIR: &str = "received_images";

/// Everything the operator core needs to run.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub relay_url: String,
    /// Role announced on every connection.
    pub role: String,
    /// Base directory for archives and extracted folders.
    pub save_dir: PathBuf,
    pub transport: TransportConfig,
    pub reconnect: ReconnectConfig,
    pub chunk_ordering: ChunkOrdering,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            role: OPERATOR_ROLE.to_string(),
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
            transport: TransportConfig::default(),
            reconnect: ReconnectConfig::default(),
            chunk_ordering: ChunkOrdering::default(),
        }
    }
}

impl CoreConfig {
    pub fn new(relay_url: impl Into<String>, save_dir: impl Into<PathBuf>) -> Self {
        Self {
            relay_url: relay_url.into(),
            save_dir: save_dir.into(),
            ..Self::default()
        }
    }
}
