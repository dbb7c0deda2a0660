//! Operator configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/shutterlink/operator.toml`
//! - Windows: `%APPDATA%/shutterlink/operator.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use shutterlink_core::{ChunkOrdering, CoreConfig, ReconnectConfig, TransportConfig};

/// Operator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// Relay endpoint for the operator role.
    pub relay_url: String,

    /// Directory receiving archives and extracted folders.
    pub save_dir: PathBuf,

    /// Role announced to the relay.
    pub role: String,

    pub connect_timeout_secs: u64,
    pub send_timeout_secs: u64,

    pub reconnect_initial_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    /// 1.0 retries at a flat delay.
    pub reconnect_backoff_factor: f64,

    /// Treat chunk id gaps as protocol errors instead of warnings.
    pub strict_chunk_order: bool,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        let core = CoreConfig::default();
        Self {
            relay_url: core.relay_url,
            save_dir: core.save_dir,
            role: core.role,
            connect_timeout_secs: core.transport.connect_timeout.as_secs(),
            send_timeout_secs: core.transport.send_timeout.as_secs(),
            reconnect_initial_delay_ms: core.reconnect.initial_delay.as_millis() as u64,
            reconnect_max_delay_ms: core.reconnect.max_delay.as_millis() as u64,
            reconnect_backoff_factor: core.reconnect.backoff_factor,
            strict_chunk_order: false,
        }
    }
}

impl OperatorConfig {
    /// Loads configuration from `path`, or writes and returns the defaults
    /// if the file does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: OperatorConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = OperatorConfig::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Builds the core configuration.
    pub fn to_core(&self) -> CoreConfig {
        CoreConfig {
            relay_url: self.relay_url.clone(),
            role: self.role.clone(),
            save_dir: self.save_dir.clone(),
            transport: TransportConfig {
                connect_timeout: Duration::from_secs(self.connect_timeout_secs.max(1)),
                send_timeout: Duration::from_secs(self.send_timeout_secs.max(1)),
                ..TransportConfig::default()
            },
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(self.reconnect_initial_delay_ms),
                max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
                backoff_factor: self.reconnect_backoff_factor,
            },
            chunk_ordering: if self.strict_chunk_order {
                ChunkOrdering::Strict
            } else {
                ChunkOrdering::Lenient
            },
        }
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata)
            .join("shutterlink")
            .join("operator.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("shutterlink")
            .join("operator.toml")
    }
}
