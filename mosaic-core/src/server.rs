//! Receiver connection manager.
//!
//! One accept loop on one address. Each connection gets its own handling
//! unit in a [`SessionPool`]; units share only the [`Dashboard`].
//!
//! # Lifetime
//!
//! [`ReceiverServer::run`] accepts until the flag from
//! [`stop_handle`](ReceiverServer::stop_handle) is cleared, then waits up
//! to `shutdown_grace` for in-flight sessions and aborts the rest.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{Instrument, info, info_span, warn};

use crate::dashboard::Dashboard;
use crate::error::MosaicError;
use crate::imaging::{ImageCodec, RasterCodec};
use crate::observer::{LogObserver, TransferObserver};
use crate::session::{SessionContext, run_session};
use crate::store::{FsStore, ImageStore, OutputLayout};
use crate::task::{SessionPool, ShutdownReport};

pub const DEFAULT_PORT: u16 = 49697;

// ── ServerConfig ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Longest a session may wait for its next byte.
    pub idle_timeout: Duration,
    /// How often the accept loop looks at the stop flag.
    pub accept_poll: Duration,
    pub shutdown_grace: Duration,
    pub output_dir: PathBuf,
    pub archive_raw_frames: bool,
    pub slot_count: usize,
    /// Identity to preferred feed slot.
    pub preferred: HashMap<String, usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            idle_timeout: Duration::from_secs(60),
            accept_poll: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(5),
            output_dir: PathBuf::from("RX_Output"),
            archive_raw_frames: true,
            slot_count: 4,
            preferred: (1..=4).map(|n| (format!("TX{n}"), n - 1)).collect(),
        }
    }
}

// ── Collaborators ────────────────────────────────────────────────

/// Pluggable codec, storage, and presentation.
#[derive(Clone)]
pub struct Collaborators {
    pub codec: Arc<dyn ImageCodec>,
    pub store: Arc<dyn ImageStore>,
    pub observer: Arc<dyn TransferObserver>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            codec: Arc::new(RasterCodec),
            store: Arc::new(FsStore),
            observer: Arc::new(LogObserver),
        }
    }
}

// ── ReceiverServer ───────────────────────────────────────────────

pub struct ReceiverServer {
    listener: TcpListener,
    ctx: SessionContext,
    accept_poll: Duration,
    shutdown_grace: Duration,
}

impl ReceiverServer {
    /// Validate the slot configuration and bind the listener.
    pub async fn bind(config: ServerConfig, collaborators: Collaborators) -> Result<Self, MosaicError> {
        let dashboard = Dashboard::new(config.slot_count, config.preferred)?;
        let listener = TcpListener::bind(config.bind).await?;

        let ctx = SessionContext {
            idle_timeout: config.idle_timeout,
            archive_raw_frames: config.archive_raw_frames,
            layout: OutputLayout::new(config.output_dir),
            codec: collaborators.codec,
            store: collaborators.store,
            observer: collaborators.observer,
            dashboard: Arc::new(dashboard),
            running: Arc::new(AtomicBool::new(true)),
        };

        Ok(Self {
            listener,
            ctx,
            accept_poll: config.accept_poll,
            shutdown_grace: config.shutdown_grace,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, MosaicError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn dashboard(&self) -> Arc<Dashboard> {
        Arc::clone(&self.ctx.dashboard)
    }

    /// Store `false` here to stop the server from another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.ctx.running)
    }

    pub fn stop(&self) {
        self.ctx.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.ctx.running.load(Ordering::SeqCst)
    }

    /// Accept and serve connections until stopped.
    pub async fn run(self) -> Result<ShutdownReport, MosaicError> {
        let addr = self.local_addr()?;
        info!(%addr, output = %self.ctx.layout.root().display(), "receiver listening");

        let mut pool = SessionPool::new();
        while self.is_running() {
            pool.reap();

            let (stream, peer) = match tokio::time::timeout(self.accept_poll, self.listener.accept()).await {
                Err(_) => continue,
                Ok(Err(e)) => {
                    warn!("accept error: {e}");
                    continue;
                }
                Ok(Ok(pair)) => pair,
            };
            if let Err(e) = stream.set_nodelay(true) {
                warn!(%peer, "set_nodelay failed: {e}");
            }

            let ctx = self.ctx.clone();
            let id = pool.spawn(peer, move |id| {
                async move {
                    run_session(&ctx, stream).await;
                }
                .instrument(info_span!("session", %peer, id))
            });
            info!(%peer, id, active = pool.active(), "connection accepted");
        }

        drop(self.listener);
        info!(active = pool.active(), "stop requested; draining sessions");
        let report = pool.shutdown(self.shutdown_grace).await;
        info!(
            drained = report.drained,
            stragglers = report.stragglers.len(),
            completed = self.ctx.dashboard.completed_count(),
            "receiver stopped"
        );
        Ok(report)
    }
}
