//! Configuration for the receiver.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mosaic_core::{DEFAULT_PORT, ServerConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RxConfig {
    pub network: NetworkConfig,
    pub timeouts: TimeoutConfig,
    pub storage: StorageConfig,
    pub feeds: FeedConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to listen on.
    pub bind_address: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// A session with no bytes for this long is dropped.
    pub idle_read_secs: u64,
    /// How often the accept loop checks for a stop request.
    pub accept_poll_ms: u64,
    /// How long shutdown waits for in-flight sessions.
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub output_dir: PathBuf,
    /// Keep every received frame as its own file.
    pub archive_raw_frames: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub slot_count: usize,
    /// Transmitter identity to preferred slot index.
    pub preferred: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Optional log file path. If empty, logs to stderr.
    pub file: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            idle_read_secs: 60,
            accept_poll_ms: 1000,
            shutdown_grace_secs: 5,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("RX_Output"),
            archive_raw_frames: true,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            slot_count: 4,
            preferred: (1..=4).map(|n| (format!("TX{n}"), n - 1)).collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl RxConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Convert into the core server parameters.
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            bind: SocketAddr::new(self.network.bind_address, self.network.port),
            idle_timeout: Duration::from_secs(self.timeouts.idle_read_secs.max(1)),
            accept_poll: Duration::from_millis(self.timeouts.accept_poll_ms.clamp(10, 60_000)),
            shutdown_grace: Duration::from_secs(self.timeouts.shutdown_grace_secs),
            output_dir: self.storage.output_dir.clone(),
            archive_raw_frames: self.storage.archive_raw_frames,
            slot_count: self.feeds.slot_count,
            preferred: self
                .feeds
                .preferred
                .iter()
                .map(|(id, slot)| (id.clone(), *slot))
                .collect(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&RxConfig::default()).unwrap();
        assert!(text.contains("idle_read_secs"));
        assert!(text.contains("[feeds.preferred]"));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&RxConfig::default()).unwrap();
        let parsed: RxConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, 49697);
        assert_eq!(parsed.feeds.preferred.get("TX3"), Some(&2));
        assert_eq!(parsed.storage.output_dir, PathBuf::from("RX_Output"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: RxConfig = toml::from_str(
            r#"
            [network]
            port = 5000

            [feeds]
            slot_count = 6
            preferred = { CAM = 5 }
            "#,
        )
        .unwrap();
        assert_eq!(parsed.network.port, 5000);
        assert_eq!(parsed.timeouts.idle_read_secs, 60);
        assert_eq!(parsed.feeds.slot_count, 6);
        assert_eq!(parsed.feeds.preferred.len(), 1);
    }

    #[test]
    fn to_server_config_maps_and_clamps() {
        let mut cfg = RxConfig::default();
        cfg.timeouts.accept_poll_ms = 0;
        cfg.timeouts.idle_read_secs = 0;
        let server = cfg.to_server_config();
        assert_eq!(server.bind.port(), 49697);
        assert_eq!(server.accept_poll, Duration::from_millis(10));
        assert_eq!(server.idle_timeout, Duration::from_secs(1));
        assert_eq!(server.preferred.get("TX1"), Some(&0));
        assert_eq!(server.slot_count, 4);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = RxConfig::load(Path::new("/definitely/not/here.toml"));
        assert_eq!(cfg.storage.output_dir, PathBuf::from("RX_Output"));
    }
}
