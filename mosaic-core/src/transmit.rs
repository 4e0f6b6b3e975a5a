//! Sender side: one connection per image.
//!
//! Parameters are validated when the [`Transmitter`] is built and again
//! per image, so a bad frame size or an empty image fails before any
//! socket is opened.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWrite;
use tracing::{debug, info};

use crate::error::{ConfigError, MosaicError};
use crate::frame::HEADER_SIZE;
use crate::handshake::Handshake;
use crate::network::{ConnectionInfo, FrameStreamSender, connect};
use crate::splitter::{ChunkSplitter, DEFAULT_COLUMNS};

// ── Config ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TransmitConfig {
    pub server: ConnectionInfo,
    pub connect_timeout: Duration,
    pub identity: String,
    /// Total bytes per frame, header included.
    pub frame_size: usize,
    pub columns: u16,
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self {
            server: ConnectionInfo::new("127.0.0.1", crate::server::DEFAULT_PORT),
            connect_timeout: Duration::from_secs(5),
            identity: "TX1".into(),
            frame_size: 1024,
            columns: DEFAULT_COLUMNS,
        }
    }
}

/// What one [`Transmitter::send`] moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub frames: usize,
    pub bytes: usize,
    pub elapsed: Duration,
}

// ── Transmitter ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Transmitter {
    config: TransmitConfig,
    frame_size: u32,
}

impl Transmitter {
    pub fn new(config: TransmitConfig) -> Result<Self, MosaicError> {
        let frame_size = u32::try_from(config.frame_size)
            .map_err(|_| ConfigError::FrameSizeTooLarge(config.frame_size))?;
        if config.frame_size <= HEADER_SIZE {
            return Err(ConfigError::FrameSizeTooSmall {
                frame_size: config.frame_size,
                header: HEADER_SIZE,
            }
            .into());
        }
        if config.columns == 0 {
            return Err(ConfigError::ZeroColumns.into());
        }
        // Checks the identity fits its handshake field.
        Handshake::new(config.identity.as_str(), "", frame_size)?;

        Ok(Self { config, frame_size })
    }

    pub fn config(&self) -> &TransmitConfig {
        &self.config
    }

    /// Split `image`, connect, and stream it under `filename`.
    pub async fn send(&self, filename: &str, image: Bytes) -> Result<SendReport, MosaicError> {
        if image.is_empty() {
            return Err(ConfigError::EmptyImage.into());
        }
        let bytes = image.len();
        let splitter = ChunkSplitter::new(image, self.config.frame_size, self.config.columns)?;
        let handshake = Handshake::new(self.config.identity.as_str(), filename, self.frame_size)?;

        let started = Instant::now();
        let stream = connect(&self.config.server, self.config.connect_timeout).await?;
        debug!(server = %self.config.server, "connected");
        let frames = send_image(stream, &handshake, &splitter).await?;

        let report = SendReport {
            frames,
            bytes,
            elapsed: started.elapsed(),
        };
        info!(
            identity = %self.config.identity,
            filename,
            frames,
            bytes,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "image sent"
        );
        Ok(report)
    }

    /// Capture from `source` and send the result.
    pub async fn send_from(&self, source: &dyn ImageSource) -> Result<SendReport, MosaicError> {
        let captured = source.capture().await?;
        self.send(&captured.filename, captured.bytes).await
    }
}

/// Handshake then every frame of `splitter`, then half-close.
pub async fn send_image<W>(
    writer: W,
    handshake: &Handshake,
    splitter: &ChunkSplitter,
) -> Result<usize, MosaicError>
where
    W: AsyncWrite + Unpin,
{
    let mut sender = FrameStreamSender::open(writer, handshake).await?;
    let sent = sender.send_all(splitter.frames()).await?;
    sender.finish().await?;
    Ok(sent)
}

// ── Sources ──────────────────────────────────────────────────────

/// Encoded image bytes plus the name to send them under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub filename: String,
    pub bytes: Bytes,
}

/// `capture() -> image | CaptureError`.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn capture(&self) -> Result<CapturedImage, MosaicError>;
}

/// Reads an already encoded image from disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ImageSource for FileSource {
    async fn capture(&self) -> Result<CapturedImage, MosaicError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| MosaicError::storage(&self.path, e))?;
        let filename = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.bin".to_string());
        Ok(CapturedImage {
            filename,
            bytes: Bytes::from(bytes),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────
