//! Synchronization ticker.
//!
//! A single task walks every running timer on a fixed period and pushes the
//! live remaining time, or the finish signal. Remaining time is always
//! recomputed from the wall clock, so a late or skipped tick never causes
//! drift.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics::{TICKER_TICK_DURATION_SECONDS, TIMERS_FINISHED_TOTAL};
use crate::registry::SessionRegistry;

/// Spawn [`run_ticker`] on the current runtime.
pub fn spawn_ticker(
    registry: Arc<SessionRegistry>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_ticker(registry, period, cancel))
}

/// Tick `registry` every `period` until `cancel` fires.
pub async fn run_ticker(registry: Arc<SessionRegistry>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(period_ms = period.as_millis() as u64, "ticker started");

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let started = Instant::now();
                let report = registry.tick();
                histogram!(TICKER_TICK_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
                if !report.finished.is_empty() {
                    counter!(TIMERS_FINISHED_TOTAL).increment(report.finished.len() as u64);
                    debug!(finished = report.finished.len(), updated = report.updated, "tick");
                }
            }
        }
    }
    info!("ticker stopped");
}

#[cfg(test)]
mod tests {
    use tandem_core::clock::Clock;
    use tandem_core::ids::ConnectionId;
    use tandem_core::protocol::ServerEvent;
    use tandem_core::timer::TimerCommand;

    use super::*;
    use crate::registry::testing::RecordingSink;

    /// Wall clock driven by tokio's (pausable) time.
    struct TokioClock {
        origin: tokio::time::Instant,
    }

    impl Clock for TokioClock {
        fn now_ms(&self) -> u64 {
            self.origin.elapsed().as_millis() as u64
        }
    }

    fn setup() -> (Arc<SessionRegistry>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let clock = Arc::new(TokioClock {
            origin: tokio::time::Instant::now(),
        });
        (Arc::new(SessionRegistry::new(sink.clone(), clock)), sink)
    }

    #[tokio::test(start_paused = true)]
    async fn short_countdown_finishes_exactly_once() {
        let (registry, sink) = setup();
        let host = ConnectionId::from_raw("conn_host");
        let code = registry.create_session(&host);
        let _ = registry
            .control(code.as_str(), &host, TimerCommand::Start { duration_ms: 300 })
            .unwrap();
        sink.clear();

        let cancel = CancellationToken::new();
        let handle = spawn_ticker(registry.clone(), Duration::from_millis(100), cancel.clone());

        tokio::time::sleep(Duration::from_millis(450)).await;
        let events = sink.events_for(&host);
        assert_eq!(events.last(), Some(&ServerEvent::TimerFinished));
        assert_eq!(
            events.iter().filter(|e| **e == ServerEvent::TimerFinished).count(),
            1
        );

        // nothing after the finish
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sink.events_for(&host), events);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn updates_track_the_clock() {
        let (registry, sink) = setup();
        let host = ConnectionId::from_raw("conn_host");
        let code = registry.create_session(&host);
        let _ = registry
            .control(code.as_str(), &host, TimerCommand::Start { duration_ms: 10_000 })
            .unwrap();
        sink.clear();

        let cancel = CancellationToken::new();
        let handle = spawn_ticker(registry.clone(), Duration::from_millis(100), cancel.clone());
        tokio::time::sleep(Duration::from_millis(350)).await;
        cancel.cancel();
        handle.await.unwrap();

        let remaining: Vec<u64> = sink
            .events_for(&host)
            .into_iter()
            .map(|e| match e {
                ServerEvent::TimerUpdate { remaining } => remaining,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(remaining, vec![10_000, 9_900, 9_800, 9_700]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_the_loop() {
        let (registry, _sink) = setup();
        let cancel = CancellationToken::new();
        let handle = spawn_ticker(registry, Duration::from_millis(100), cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
