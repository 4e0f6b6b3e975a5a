//! Tracking for concurrent handling units.
//!
//! Each accepted connection runs as its own tokio task. The pool keeps
//! their `JoinHandle`s by session id, forgets finished ones as they
//! report in, and on shutdown waits a bounded time before aborting
//! whatever is left.

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::TaskError;

pub type SessionId = u64;

#[derive(Debug)]
pub enum SessionEvent {
    Finished(SessionId),
}

struct SessionHandle {
    peer: SocketAddr,
    started: Instant,
    handle: JoinHandle<()>,
}

/// A session that did not wind down within the grace period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Straggler {
    pub id: SessionId,
    pub peer: SocketAddr,
    pub running_for: Duration,
}

/// Result of [`SessionPool::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Sessions that finished on their own during the grace period.
    pub drained: usize,
    /// Sessions that were aborted once the grace period ran out.
    pub stragglers: Vec<Straggler>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.stragglers.is_empty()
    }
}

pub struct SessionPool {
    next_id: SessionId,
    sessions: BTreeMap<SessionId, SessionHandle>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Default for SessionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionPool {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            next_id: 1,
            sessions: BTreeMap::new(),
            events_tx,
            events_rx,
        }
    }

    /// Spawn a handling unit. `f` receives the session id so it can tag
    /// its logs.
    pub fn spawn<F, Fut>(&mut self, peer: SocketAddr, f: F) -> SessionId
    where
        F: FnOnce(SessionId) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;

        let fut = f(id);
        let events = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            fut.await;
            let _ = events.send(SessionEvent::Finished(id));
        });

        self.sessions.insert(
            id,
            SessionHandle {
                peer,
                started: Instant::now(),
                handle,
            },
        );
        id
    }

    /// Forget sessions that have finished. Returns how many were removed.
    pub fn reap(&mut self) -> usize {
        let before = self.sessions.len();
        while let Ok(SessionEvent::Finished(id)) = self.events_rx.try_recv() {
            self.sessions.remove(&id);
        }
        // A panicking unit never reports in.
        self.sessions.retain(|id, session| {
            let finished = session.handle.is_finished();
            if finished {
                debug!(id, peer = %session.peer, "session task finished");
            }
            !finished
        });
        before - self.sessions.len()
    }

    pub fn active(&self) -> usize {
        self.sessions.len()
    }

    /// Wait up to `grace` for every session, then abort the rest.
    pub async fn shutdown(mut self, grace: Duration) -> ShutdownReport {
        let deadline = Instant::now() + grace;
        let mut report = ShutdownReport::default();

        for (id, mut session) in std::mem::take(&mut self.sessions) {
            match tokio::time::timeout_at(deadline, &mut session.handle).await {
                Ok(Ok(())) => {
                    debug!(id, "session drained");
                    report.drained += 1;
                }
                Ok(Err(e)) => {
                    warn!(id, peer = %session.peer, "{}", TaskError::from(e));
                    report.drained += 1;
                }
                Err(_) => {
                    session.handle.abort();
                    let straggler = Straggler {
                        id,
                        peer: session.peer,
                        running_for: session.started.elapsed(),
                    };
                    warn!(
                        id,
                        peer = %straggler.peer,
                        "{}; aborting",
                        TaskError::Timeout(grace)
                    );
                    report.stragglers.push(straggler);
                }
            }
        }
        report
    }
}

// ── Tests ────────────────────────────────────────────────────────
