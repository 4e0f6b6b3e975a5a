//! Presentation collaborator.
//!
//! Sessions report progress and outcomes through a [`TransferObserver`].
//! Every hook defaults to a no-op, so an embedding only overrides what it
//! displays.

use tracing::{debug, info, warn};

use crate::assembly::Progress;
use crate::dashboard::TransferRecord;
use crate::imaging::DecodedImage;
use crate::session::FailureReason;

pub trait TransferObserver: Send + Sync {
    /// A frame was placed. Called once per accepted frame.
    fn on_frame_progress(&self, _identity: &str, _progress: &Progress) {}

    /// The image decoded, was saved, and holds a feed slot.
    fn on_transfer_complete(&self, _identity: &str, _image: &DecodedImage, _record: &TransferRecord) {}

    /// The session ended without an image. `identity` is `None` when the
    /// handshake never completed.
    fn on_transfer_failed(&self, _identity: Option<&str>, _reason: &FailureReason) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl TransferObserver for NullObserver {}

/// Writes each event to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl TransferObserver for LogObserver {
    fn on_frame_progress(&self, identity: &str, progress: &Progress) {
        debug!(identity, "{progress}");
    }

    fn on_transfer_complete(&self, identity: &str, image: &DecodedImage, record: &TransferRecord) {
        info!(
            identity,
            width = image.width,
            height = image.height,
            path = %record.path.display(),
            blake3 = %record.blake3,
            "transfer complete"
        );
    }

    fn on_transfer_failed(&self, identity: Option<&str>, reason: &FailureReason) {
        warn!(identity = identity.unwrap_or("<unknown>"), "transfer failed: {reason}");
    }
}
