//! Configuration for the transmitter.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mosaic_core::{ConnectionInfo, DEFAULT_COLUMNS, DEFAULT_PORT, TransmitConfig};

use crate::prepare::{Quality, RANDOM_QUALITY};
use crate::schedule::DutyCycle;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TxConfig {
    pub network: NetworkConfig,
    pub transfer: TransferConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Receiver host name or address.
    pub host: String,
    pub port: u16,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Name the receiver files this feed under.
    pub identity: String,
    /// Bytes per frame, 10-byte header included.
    pub frame_size: usize,
    /// Grid width used to label frames.
    pub columns: u16,
    /// Re-encode every image as JPEG before sending.
    pub reencode_jpeg: bool,
    pub jpeg_quality: u8,
    /// Pick a fresh quality per image instead of `jpeg_quality`.
    pub random_quality: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between rounds; 0 sends once and exits.
    pub every_secs: u64,
    /// Length of each sending window; 0 keeps sending without a break.
    pub active_secs: u64,
    /// Silence between sending windows.
    pub sleep_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            connect_timeout_secs: 5,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            identity: "TX1".into(),
            frame_size: 1024,
            columns: DEFAULT_COLUMNS,
            reencode_jpeg: false,
            jpeg_quality: 40,
            random_quality: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl TxConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn to_transmit_config(&self) -> TransmitConfig {
        TransmitConfig {
            server: ConnectionInfo::new(self.network.host.as_str(), self.network.port),
            connect_timeout: Duration::from_secs(self.network.connect_timeout_secs.max(1)),
            identity: self.transfer.identity.clone(),
            frame_size: self.transfer.frame_size,
            columns: self.transfer.columns,
        }
    }

    pub fn quality(&self) -> Quality {
        let t = &self.transfer;
        match (t.reencode_jpeg, t.random_quality) {
            (false, _) => Quality::Original,
            (true, true) => Quality::Random {
                min: RANDOM_QUALITY.0,
                max: RANDOM_QUALITY.1,
            },
            (true, false) => Quality::Fixed(t.jpeg_quality),
        }
    }

    /// `None` means send once.
    pub fn duty_cycle(&self) -> Option<DutyCycle> {
        let s = &self.schedule;
        (s.every_secs > 0).then(|| DutyCycle {
            interval: Duration::from_secs(s.every_secs),
            active: (s.active_secs > 0).then(|| Duration::from_secs(s.active_secs)),
            sleep: Duration::from_secs(s.sleep_secs),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────
