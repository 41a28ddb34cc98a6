//! Stopping the server: cancel the shared token, then drain the listener and
//! the ticker against one deadline.
//!
//! WebSocket sessions watch the same token. They are not drained here; the
//! listener only finishes once axum has seen every upgraded connection close.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drain budget when the caller does not pass one.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// A background task spawned by [`crate::server::TandemServer::listen`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerTask {
    /// `axum::serve` accepting HTTP and WebSocket upgrades.
    Listener,
    /// The timer synchronization loop.
    Ticker,
}

/// The running listener and ticker, returned by `listen()`.
#[derive(Debug)]
pub struct ServerHandle {
    listener: JoinHandle<()>,
    ticker: JoinHandle<()>,
}

impl ServerHandle {
    pub(crate) fn new(listener: JoinHandle<()>, ticker: JoinHandle<()>) -> Self {
        Self { listener, ticker }
    }

    /// Ticker first: it stops on the next poll, while the listener may still
    /// be waiting on open sockets.
    fn into_tasks(self) -> [(ServerTask, JoinHandle<()>); 2] {
        [
            (ServerTask::Ticker, self.ticker),
            (ServerTask::Listener, self.listener),
        ]
    }
}

/// What [`ShutdownCoordinator::graceful_shutdown`] managed to stop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Tasks that returned (or panicked) before the deadline.
    pub finished: Vec<ServerTask>,
    /// Tasks still running at the deadline; they were aborted.
    pub aborted: Vec<ServerTask>,
}

impl DrainReport {
    /// Whether every task stopped on its own.
    pub fn is_clean(&self) -> bool {
        self.aborted.is_empty()
    }
}

/// Owns the token observed by the listener, the ticker, and every connection.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Coordinator with a fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the shared token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token, then wait for the listener and ticker until
    /// `timeout` (default 10s) runs out. Anything left is aborted.
    pub async fn graceful_shutdown(&self, handle: ServerHandle, timeout: Option<Duration>) -> DrainReport {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        let deadline = Instant::now() + timeout;
        self.token.cancel();
        info!(timeout_ms = timeout.as_millis() as u64, "stopping server");

        let mut report = DrainReport::default();
        for (task, mut join) in handle.into_tasks() {
            match tokio::time::timeout_at(deadline, &mut join).await {
                Ok(Ok(())) => {
                    debug!(?task, "task stopped");
                    report.finished.push(task);
                }
                Ok(Err(e)) => {
                    warn!(?task, error = %e, "task ended abnormally");
                    report.finished.push(task);
                }
                Err(_) => {
                    warn!(?task, "task still running at shutdown deadline, aborting");
                    join.abort();
                    report.aborted.push(task);
                }
            }
        }
        report
    }
}
