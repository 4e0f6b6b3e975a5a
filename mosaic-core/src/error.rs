//! Domain-specific error types for the mosaic transfer protocol.
//!
//! All fallible operations return `Result<T, MosaicError>`. Per-session
//! failures are typed so the connection manager can report them without
//! ever tearing down the accept loop.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The canonical error type for the mosaic protocol.
#[derive(Debug, Error)]
pub enum MosaicError {
    /// Malformed handshake or frame. Fatal to the session.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Socket timeout, reset, or premature close. Fatal to the session.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid sender or receiver parameters, detected before any I/O.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The image codec rejected the reconstructed bytes.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Persisting an image or diagnostic file failed.
    #[error("storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A spawned handling unit failed.
    #[error("task error: {0}")]
    Task(#[from] TaskError),
}

impl From<std::io::Error> for MosaicError {
    fn from(e: std::io::Error) -> Self {
        MosaicError::Transport(TransportError::Io(e))
    }
}

impl MosaicError {
    /// Wrap an I/O error that happened while touching `path`.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MosaicError::Storage {
            path: path.into(),
            source,
        }
    }
}

// ── Protocol ─────────────────────────────────────────────────────

/// Which fixed-width handshake field was being read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeField {
    Identity,
    Filename,
    FrameSize,
}

impl fmt::Display for HandshakeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            Self::Filename => write!(f, "filename"),
            Self::FrameSize => write!(f, "frame size"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer closed the connection before a handshake field was complete.
    #[error("connection closed before {field} ({received} of {expected} bytes)")]
    HandshakeTruncated {
        field: HandshakeField,
        received: usize,
        expected: usize,
    },

    /// A handshake string field is not valid UTF-8.
    #[error("{field} is not valid utf-8")]
    InvalidUtf8 { field: HandshakeField },

    /// A handshake string does not fit its fixed-width slot.
    #[error("{field} is {len} bytes (max {max})")]
    FieldTooLong {
        field: HandshakeField,
        len: usize,
        max: usize,
    },

    /// The negotiated frame size cannot carry any payload.
    #[error("frame size {frame_size} must exceed the {header}-byte header")]
    FrameSizeTooSmall { frame_size: u32, header: usize },

    /// A header field does not fit in 16 bits.
    #[error("{field} value {value} does not fit in 16 bits")]
    FieldOutOfRange { field: &'static str, value: usize },

    /// Fewer bytes than a frame header.
    #[error("frame too short: {len} bytes (min {min})")]
    FrameTooShort { len: usize, min: usize },

    /// A frame does not match the negotiated frame size.
    #[error("frame length mismatch: expected {expected}, got {actual}")]
    FrameLengthMismatch { expected: usize, actual: usize },

    /// The first frame of a session declared an empty image.
    #[error("first frame declares zero total frames")]
    ZeroTotalFrames,

    /// An operation was attempted in the wrong session state.
    #[error("protocol violation: {0}")]
    Violation(&'static str),
}

// ── Transport ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransportError {
    /// No bytes arrived within the idle-read window.
    #[error("idle for {0:?}")]
    Timeout(Duration),

    /// The stream ended partway through a frame.
    #[error("connection closed mid-frame ({received} of {expected} bytes)")]
    ClosedMidFrame { received: usize, expected: usize },

    /// The stream ended cleanly on a frame boundary, but short of the
    /// declared frame count.
    #[error("connection closed before the image was complete")]
    ClosedBeforeComplete,

    /// The TCP/IO layer reported an error.
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

// ── Configuration ────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    /// `frame_size - HEADER_SIZE <= 0`.
    #[error("frame size {frame_size} leaves no room for payload after the {header}-byte header")]
    FrameSizeTooSmall { frame_size: usize, header: usize },

    /// The frame size does not fit the 32-bit handshake field.
    #[error("frame size {0} does not fit in 32 bits")]
    FrameSizeTooLarge(usize),

    /// The grid needs at least one column.
    #[error("column count must be at least 1")]
    ZeroColumns,

    /// The image would need more frames than a 16-bit count can express.
    #[error("image needs {frames} frames (max {max}); raise the frame size")]
    TooManyFrames { frames: usize, max: usize },

    /// Nothing to send.
    #[error("image is empty")]
    EmptyImage,

    /// The feed slot table needs at least one slot.
    #[error("feed slot table needs at least one slot")]
    NoSlots,

    /// A preferred slot points past the end of the table.
    #[error("preferred slot {slot} for {identity} is out of range (slots: {slot_count})")]
    PreferredSlotOutOfRange {
        identity: String,
        slot: usize,
        slot_count: usize,
    },
}

// ── Decode ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DecodeError {
    /// There were no bytes to decode.
    #[error("no image data")]
    Empty,

    /// The leading bytes match no supported image format.
    #[error("unrecognized image format")]
    UnknownFormat,

    /// The codec recognized the format but could not parse the image.
    #[error("malformed image: {0}")]
    Malformed(String),

    /// Re-encoding an image failed.
    #[error("encode failed: {0}")]
    Encode(String),
}

// ── TaskError ────────────────────────────────────────────────────

/// Typed error for spawned handling units.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The unit did not finish within the shutdown grace period.
    #[error("task still running after {0:?}")]
    Timeout(Duration),

    /// The unit was aborted.
    #[error("task was cancelled")]
    Cancelled,

    /// The unit panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl From<tokio::task::JoinError> for TaskError {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            TaskError::Cancelled
        } else {
            TaskError::Panicked(e.to_string())
        }
    }
}
