//! Low-rate status polling and readiness detection.
//!
//! Printer firmware reports a job as "printing" as soon as it is accepted, long before
//! material is deposited. The watcher instead waits for both heaters to reach non-zero
//! targets and treats that as the start of the physical print.

use crate::acquisition::readiness::ReadinessState;
use crate::acquisition::stop_requested;
use crate::acquisition::types::{AuditRecord, StatusSample};
use crate::config::StatusConfig;
use crate::error::AppResult;
use crate::storage::RecordSink;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Source of printer status snapshots.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Query the current heater and progress values.
    ///
    /// Any error is treated as transient by the watcher.
    async fn query(&self) -> AppResult<StatusSample>;
}

#[async_trait]
impl<T: StatusSource + ?Sized> StatusSource for Arc<T> {
    async fn query(&self) -> AppResult<StatusSample> {
        (**self).query().await
    }
}

/// Result of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Status was read and an audit row written.
    Recorded {
        /// Whether this cycle raised the readiness flag.
        triggered: bool,
    },
    /// The status source failed; nothing was recorded.
    Failed,
}

/// Counters reported when the watcher stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatcherStats {
    /// Successful polls (one audit row each)
    pub polls: u64,
    /// Failed polls
    pub failures: u64,
    /// When readiness was raised by this watcher
    pub triggered_at: Option<DateTime<Utc>>,
}

/// Polls a [`StatusSource`], raises readiness and writes the audit trail.
pub struct StatusWatcher<S, A> {
    source: S,
    readiness: Arc<ReadinessState>,
    audit: A,
    poll_interval: Duration,
    retry_backoff: Duration,
    stats: WatcherStats,
}

impl<S, A> StatusWatcher<S, A>
where
    S: StatusSource,
    A: RecordSink<AuditRecord>,
{
    /// Create a watcher writing audit rows to `audit`.
    pub fn new(
        source: S,
        readiness: Arc<ReadinessState>,
        audit: A,
        config: &StatusConfig,
    ) -> Self {
        Self {
            source,
            readiness,
            audit,
            poll_interval: config.poll_interval,
            retry_backoff: config.retry_backoff,
            stats: WatcherStats::default(),
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> &WatcherStats {
        &self.stats
    }

    /// Run a single poll cycle.
    ///
    /// Status source failures are logged and reported as [`PollOutcome::Failed`]; only
    /// an audit sink failure is returned as an error.
    pub async fn poll_once(&mut self) -> AppResult<PollOutcome> {
        let status = match self.source.query().await {
            Ok(status) => status,
            Err(e) => {
                self.stats.failures += 1;
                tracing::warn!(
                    error = %e,
                    recoverable = e.is_recoverable(),
                    retry_in = ?self.retry_backoff,
                    "Status poll failed"
                );
                return Ok(PollOutcome::Failed);
            }
        };

        let triggered = !self.readiness.is_ready()
            && status.heaters_at_target()
            && self.readiness.try_set_ready(status.timestamp);

        if triggered {
            self.stats.triggered_at = self.readiness.triggered_at();
            tracing::info!(
                at = %status.timestamp,
                bed_temp = status.bed_temp,
                bed_target = status.bed_target,
                nozzle_temp = status.nozzle_temp,
                nozzle_target = status.nozzle_target,
                "Printing flag set (temperatures reached targets)"
            );
        } else {
            tracing::debug!(
                bed_temp = status.bed_temp,
                bed_target = status.bed_target,
                nozzle_temp = status.nozzle_temp,
                nozzle_target = status.nozzle_target,
                progress = status.progress,
                "Status polled"
            );
        }

        self.audit.append(&AuditRecord {
            status,
            printing: self.readiness.is_ready(),
        })?;
        self.audit.flush()?;
        self.stats.polls += 1;

        Ok(PollOutcome::Recorded { triggered })
    }

    /// Poll until `stop` is raised.
    ///
    /// Waits `poll_interval` after a recorded cycle and `retry_backoff` after a failed
    /// one. Returns early only on an audit sink error.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> AppResult<WatcherStats> {
        tracing::info!(
            interval = ?self.poll_interval,
            backoff = ?self.retry_backoff,
            "Starting print status logging"
        );

        loop {
            if *stop.borrow() {
                break;
            }

            let delay = match self.poll_once().await? {
                PollOutcome::Recorded { .. } => self.poll_interval,
                PollOutcome::Failed => self.retry_backoff,
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop_requested(&mut stop) => break,
            }
        }

        self.audit.flush()?;
        tracing::info!(
            polls = self.stats.polls,
            failures = self.stats.failures,
            "Status logging stopped"
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ScriptedStatusSource, StatusStep};
    use crate::storage::MemorySink;
    use tracing_test::traced_test;

    fn config() -> StatusConfig {
        StatusConfig {
            poll_interval: Duration::from_secs(2),
            retry_backoff: Duration::from_secs(5),
        }
    }

    fn watcher(
        steps: Vec<StatusStep>,
    ) -> (
        StatusWatcher<ScriptedStatusSource, MemorySink<AuditRecord>>,
        Arc<ReadinessState>,
        MemorySink<AuditRecord>,
    ) {
        let readiness = Arc::new(ReadinessState::new());
        let audit = MemorySink::new();
        let watcher = StatusWatcher::new(
            ScriptedStatusSource::new(steps),
            Arc::clone(&readiness),
            audit.clone(),
            &config(),
        );
        (watcher, readiness, audit)
    }

    #[tokio::test]
    async fn never_ready_while_predicate_false() {
        let steps = vec![
            StatusStep::temps(25.0, 60.0, 25.0, 215.0),
            StatusStep::temps(45.0, 60.0, 150.0, 215.0),
            StatusStep::temps(59.9, 60.0, 214.9, 215.0),
            StatusStep::temps(60.0, 60.0, 200.0, 215.0),
        ];
        let (mut watcher, readiness, audit) = watcher(steps);

        for _ in 0..4 {
            assert_eq!(
                watcher.poll_once().await.unwrap(),
                PollOutcome::Recorded { triggered: false }
            );
        }

        assert!(!readiness.is_ready());
        let rows = audit.records();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| !r.printing));
    }

    #[tokio::test]
    async fn zero_bed_target_never_triggers() {
        let steps = (0..5)
            .map(|_| StatusStep::temps(80.0, 0.0, 230.0, 215.0))
            .collect();
        let (mut watcher, readiness, _audit) = watcher(steps);
        for _ in 0..5 {
            watcher.poll_once().await.unwrap();
        }
        assert!(!readiness.is_ready());
    }

    #[tokio::test]
    async fn triggers_exactly_once_and_audits_every_cycle() {
        let steps = vec![
            StatusStep::temps(50.0, 60.0, 200.0, 215.0),
            StatusStep::temps(60.0, 60.0, 215.0, 215.0),
            StatusStep::temps(60.5, 60.0, 216.0, 215.0),
            StatusStep::temps(59.0, 60.0, 214.0, 215.0),
        ];
        let (mut watcher, readiness, audit) = watcher(steps);

        let outcomes: Vec<PollOutcome> = {
            let mut v = Vec::new();
            for _ in 0..4 {
                v.push(watcher.poll_once().await.unwrap());
            }
            v
        };
        assert_eq!(
            outcomes,
            vec![
                PollOutcome::Recorded { triggered: false },
                PollOutcome::Recorded { triggered: true },
                PollOutcome::Recorded { triggered: false },
                PollOutcome::Recorded { triggered: false },
            ]
        );

        let flags: Vec<bool> = audit.records().iter().map(|r| r.printing).collect();
        assert_eq!(flags, vec![false, true, true, true]);

        let rows = audit.records();
        assert_eq!(
            readiness.triggered_at().map(|t| t.timestamp_micros()),
            Some(rows[1].status.timestamp.timestamp_micros())
        );
        assert_eq!(watcher.stats().triggered_at, readiness.triggered_at());
    }

    #[tokio::test]
    #[traced_test]
    async fn failures_are_logged_not_recorded() {
        let steps = vec![
            StatusStep::fail("connection refused"),
            StatusStep::temps(60.0, 60.0, 215.0, 215.0),
        ];
        let (mut watcher, readiness, audit) = watcher(steps);

        assert_eq!(watcher.poll_once().await.unwrap(), PollOutcome::Failed);
        assert!(audit.is_empty());
        assert!(!readiness.is_ready());
        assert!(logs_contain("Status poll failed"));
        assert!(logs_contain("recoverable=true"));

        assert_eq!(
            watcher.poll_once().await.unwrap(),
            PollOutcome::Recorded { triggered: true }
        );
        assert_eq!(watcher.stats().failures, 1);
        assert_eq!(watcher.stats().polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_uses_backoff_after_failure_and_stops_on_signal() {
        let steps = vec![
            StatusStep::fail("timeout"),
            StatusStep::temps(60.0, 60.0, 215.0, 215.0),
            StatusStep::temps(61.0, 60.0, 215.0, 215.0),
        ];
        let (watcher, readiness, audit) = watcher(steps);
        let (stop_tx, stop_rx) = watch::channel(false);
        let start = tokio::time::Instant::now();
        let task = tokio::spawn(watcher.run(stop_rx));

        // t=0 fail, t=5 poll (trigger), t=7 poll
        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert!(!readiness.is_ready());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(readiness.is_ready());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(audit.len(), 2);

        stop_tx.send(true).unwrap();
        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.polls, 2);
        assert_eq!(stats.failures, 1);
        assert!(start.elapsed() < Duration::from_secs(8));
    }
}
