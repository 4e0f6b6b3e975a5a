//! # mosaic-core
//!
//! Core library for grid-framed image transfer over TCP.
//!
//! This crate contains:
//! - **Frames**: `FrameHeader`, `Frame`, `GridPos` and the 10-byte header format
//! - **Codec**: `FrameCodec` for fixed-size framed TCP I/O via `tokio_util`
//! - **Splitter**: `ChunkSplitter`, the lazy, restartable sender-side frame source
//! - **Handshake**: the 154-byte identity / filename / frame-size preamble
//! - **Network**: connect-with-timeout and the frame stream sender and receiver
//! - **Assembly**: `GridAssembler`, reconstruction by `(row, col)` in any arrival order
//! - **Slots**: the feed slot assignment policy
//! - **Dashboard**: slot table and transfer history behind one lock
//! - **Session / Server**: per-connection handling units and the accept loop
//! - **Task**: `SessionPool` for tracking handling units with bounded shutdown
//! - **Transmit**: `Transmitter` and image sources for the sending side
//! - **Error**: `MosaicError`, a typed `thiserror`-based error hierarchy

pub mod assembly;
pub mod codec;
pub mod dashboard;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod imaging;
pub mod network;
pub mod observer;
pub mod server;
pub mod session;
pub mod slots;
pub mod splitter;
pub mod store;
pub mod task;
pub mod transmit;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use assembly::{AssemblyState, GridAssembler, IntegrityWarning, Progress, Reconstruction};
pub use codec::FrameCodec;
pub use dashboard::{Dashboard, SlotView, TransferRecord};
pub use error::{ConfigError, DecodeError, MosaicError, ProtocolError, TaskError, TransportError};
pub use frame::{Frame, FrameHeader, GridPos, HEADER_SIZE};
pub use handshake::{HANDSHAKE_LEN, Handshake};
pub use imaging::{DecodedImage, ImageCodec, ImageKind, RasterCodec, reencode_jpeg};
pub use network::{ConnectionInfo, FrameStreamReceiver, FrameStreamSender, connect};
pub use observer::{LogObserver, NullObserver, TransferObserver};
pub use server::{Collaborators, DEFAULT_PORT, ReceiverServer, ServerConfig};
pub use session::{FailureReason, SessionContext, TransferOutcome, run_session};
pub use slots::{AssignmentRule, FeedSlot, FeedSlotTable, SlotAssignment, SlotChoice};
pub use splitter::{ChunkSplitter, DEFAULT_COLUMNS};
pub use store::{FsStore, ImageStore, MemoryStore, OutputLayout};
pub use task::{SessionPool, ShutdownReport, Straggler};
pub use transmit::{CapturedImage, FileSource, ImageSource, SendReport, TransmitConfig, Transmitter};
