//! One handling unit: handshake, frames, reconstruction, decode, persist,
//! publish.
//!
//! A session never returns an error to its caller. Every failure becomes a
//! [`TransferOutcome::Failure`], is reported to the observer, and ends only
//! this connection.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::Local;
use thiserror::Error;
use tokio::io::AsyncRead;
use tracing::{debug, error, info, warn};

use crate::assembly::{GridAssembler, Progress};
use crate::dashboard::{Dashboard, TransferRecord};
use crate::error::{DecodeError, MosaicError, ProtocolError, TaskError, TransportError};
use crate::frame::Frame;
use crate::handshake::Handshake;
use crate::imaging::{DecodedImage, ImageCodec};
use crate::network::FrameStreamReceiver;
use crate::observer::TransferObserver;
use crate::slots::SlotChoice;
use crate::store::{ImageStore, OutputLayout};

/// Everything a handling unit shares with the rest of the receiver.
#[derive(Clone)]
pub struct SessionContext {
    pub idle_timeout: Duration,
    pub archive_raw_frames: bool,
    pub layout: OutputLayout,
    pub codec: Arc<dyn ImageCodec>,
    pub store: Arc<dyn ImageStore>,
    pub observer: Arc<dyn TransferObserver>,
    pub dashboard: Arc<Dashboard>,
    /// Cleared when the receiver is asked to stop.
    pub running: Arc<AtomicBool>,
}

#[derive(Debug, Error)]
pub enum FailureReason {
    #[error("handshake failed: {0}")]
    Handshake(MosaicError),

    #[error("incomplete transfer at {progress}: {cause}")]
    Incomplete { progress: Progress, cause: MosaicError },

    #[error("receiver stopping; abandoned at {0}")]
    Cancelled(Progress),

    #[error("reconstructed image did not decode: {0}")]
    Decode(DecodeError),

    #[error("could not save image: {0}")]
    Persist(MosaicError),

    #[error("reconstruction worker failed: {0}")]
    Worker(TaskError),
}

#[derive(Debug)]
pub enum TransferOutcome {
    Success {
        image: DecodedImage,
        record: TransferRecord,
        slot: SlotChoice,
    },
    Failure {
        identity: Option<String>,
        reason: FailureReason,
        /// Partial data kept for inspection, if any.
        diagnostics: Option<PathBuf>,
    },
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl SessionContext {
    fn fail(
        &self,
        identity: Option<&str>,
        reason: FailureReason,
        diagnostics: Option<PathBuf>,
    ) -> TransferOutcome {
        self.observer.on_transfer_failed(identity, &reason);
        TransferOutcome::Failure {
            identity: identity.map(str::to_string),
            reason,
            diagnostics,
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Drive one connection to completion.
pub async fn run_session<R>(ctx: &SessionContext, mut reader: R) -> TransferOutcome
where
    R: AsyncRead + Unpin,
{
    let handshake = match tokio::time::timeout(ctx.idle_timeout, Handshake::read_from(&mut reader)).await {
        Ok(Ok(handshake)) => handshake,
        Ok(Err(e)) => return ctx.fail(None, FailureReason::Handshake(e), None),
        Err(_) => {
            let e = TransportError::Timeout(ctx.idle_timeout).into();
            return ctx.fail(None, FailureReason::Handshake(e), None);
        }
    };

    let identity = handshake.identity();
    let filename = handshake.filename();
    info!(
        identity,
        filename,
        frame_size = handshake.frame_size(),
        "handshake accepted"
    );

    let frames_dir = ctx.layout.frames_dir(identity, filename, Local::now());
    let mut archive = ctx.archive_raw_frames;
    let diagnostics = |archive: bool| archive.then(|| frames_dir.clone());

    let mut receiver = match FrameStreamReceiver::new(reader, &handshake, ctx.idle_timeout) {
        Ok(receiver) => receiver,
        Err(e) => return ctx.fail(Some(identity), FailureReason::Handshake(e), None),
    };
    let mut assembler = GridAssembler::new();

    loop {
        if !ctx.is_running() {
            let progress = assembler.abort();
            info!(identity, "{progress}; stopping");
            return ctx.fail(Some(identity), FailureReason::Cancelled(progress), diagnostics(archive));
        }

        let frame = match receiver.next_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                let progress = assembler.abort();
                let cause = TransportError::ClosedBeforeComplete.into();
                let reason = FailureReason::Incomplete { progress, cause };
                return ctx.fail(Some(identity), reason, diagnostics(archive));
            }
            Err(cause) => {
                let progress = assembler.abort();
                let reason = FailureReason::Incomplete { progress, cause };
                return ctx.fail(Some(identity), reason, diagnostics(archive));
            }
        };

        if archive && !archive_frame(ctx, &frames_dir, &frame).await {
            archive = false;
        }

        match assembler.accept(&frame) {
            Ok(progress) => {
                ctx.observer.on_frame_progress(identity, &progress);
                if progress.is_complete() {
                    break;
                }
            }
            Err(e) => {
                let progress = assembler.abort();
                let reason = FailureReason::Incomplete {
                    progress,
                    cause: e.into(),
                };
                return ctx.fail(Some(identity), reason, diagnostics(archive));
            }
        }
    }

    // Anything already buffered past the final frame is not ours to read.
    let extra = receiver.buffered();
    if extra > 0 {
        warn!(identity, extra_bytes = extra, "data after the final frame; closing connection");
    }
    drop(receiver);

    // Reconstruction and decoding are CPU-bound; keep them off the
    // runtime workers shared with the accept loop and other sessions.
    let progress = assembler.progress();
    let codec = Arc::clone(&ctx.codec);
    let work = tokio::task::spawn_blocking(move || {
        let reconstruction = assembler.reconstruct()?;
        let decoded = codec.decode(&reconstruction.bytes);
        Ok::<_, ProtocolError>((reconstruction, decoded))
    });
    let (reconstruction, decoded) = match work.await {
        Ok(Ok(done)) => done,
        Ok(Err(e)) => {
            error!(identity, "reconstruction refused: {e}");
            let reason = FailureReason::Incomplete {
                progress,
                cause: e.into(),
            };
            return ctx.fail(Some(identity), reason, diagnostics(archive));
        }
        Err(e) => {
            let reason = FailureReason::Worker(TaskError::from(e));
            error!(identity, "{reason}");
            return ctx.fail(Some(identity), reason, diagnostics(archive));
        }
    };
    debug!(
        identity,
        bytes = reconstruction.bytes.len(),
        warnings = reconstruction.warnings.len(),
        "reconstructed"
    );

    let image = match decoded {
        Ok(image) => image,
        Err(e) => {
            let path = OutputLayout::failed_decode_path(&frames_dir, filename, Local::now());
            let kept = save_diagnostic(ctx, path, reconstruction.bytes).await;
            return ctx.fail(Some(identity), FailureReason::Decode(e), kept);
        }
    };

    let path = ctx.layout.image_path(identity, filename);
    if let Err(e) = ctx.store.save(&path, image.encoded.clone()).await {
        return ctx.fail(Some(identity), FailureReason::Persist(e), diagnostics(archive));
    }

    let record = TransferRecord::new(identity, filename, path, &reconstruction.bytes);
    let slot = ctx.dashboard.complete_transfer(record.clone(), image.clone());
    info!(
        identity,
        slot = slot.index,
        rule = ?slot.rule,
        path = %record.path.display(),
        "image published"
    );
    if let Some(displaced) = &slot.displaced {
        info!(identity, displaced, slot = slot.index, "feed slot taken over");
    }
    ctx.observer.on_transfer_complete(identity, &image, &record);

    TransferOutcome::Success { image, record, slot }
}

/// Returns `false` once archiving should stop for this session.
async fn archive_frame(ctx: &SessionContext, dir: &std::path::Path, frame: &Frame) -> bool {
    let path = OutputLayout::frame_path(dir, frame.header());
    match ctx.store.save(&path, frame.to_bytes()).await {
        Ok(()) => true,
        Err(e) => {
            warn!("raw frame archive disabled for this session: {e}");
            false
        }
    }
}

async fn save_diagnostic(ctx: &SessionContext, path: PathBuf, bytes: Bytes) -> Option<PathBuf> {
    match ctx.store.save(&path, bytes).await {
        Ok(()) => {
            warn!(path = %path.display(), "undecodable bytes preserved");
            Some(path)
        }
        Err(e) => {
            error!("could not preserve undecodable bytes: {e}");
            None
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
