//! Session supervisor.
//!
//! An [`AcquisitionSession`] owns one readiness flag and runs the status watcher and
//! the stream ingestor as two tasks. The session ends when:
//!
//! - the caller raises the shutdown signal (normal termination),
//! - the sample stream is lost or rejected, or
//! - a sink fails.
//!
//! In every case both tasks are told to stop and are awaited, so every sink is flushed
//! before [`AcquisitionSession::run`] returns. The first fatal error wins.

use crate::acquisition::ingest::{IngestStats, SampleStream, StreamIngestor};
use crate::acquisition::readiness::ReadinessState;
use crate::acquisition::status::{StatusSource, StatusWatcher, WatcherStats};
use crate::acquisition::stop_requested;
use crate::acquisition::types::{AuditRecord, FeatureRecord, SensorSample};
use crate::config::{AcquisitionConfig, FeatureConfig, OutputConfig, StatusConfig};
use crate::error::{AppResult, DaqError};
use crate::storage::{BoxedSink, CsvSink};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinError;

/// The three outputs of a session.
pub struct SessionSinks {
    /// One row per successful status poll
    pub audit: BoxedSink<AuditRecord>,
    /// Every accepted sample
    pub raw: BoxedSink<SensorSample>,
    /// Rolling feature records
    pub features: BoxedSink<FeatureRecord>,
}

impl SessionSinks {
    /// Open the CSV files named by `output`, truncating previous runs.
    ///
    /// Fails if any of the three files cannot be created.
    pub fn csv(output: &OutputConfig) -> AppResult<Self> {
        Ok(Self {
            audit: Box::new(CsvSink::<AuditRecord>::create(output.status_path())?),
            raw: Box::new(CsvSink::<SensorSample>::create(output.raw_path())?),
            features: Box::new(CsvSink::<FeatureRecord>::create(output.features_path())?),
        })
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    /// When readiness was raised, if it ever was
    pub triggered_at: Option<DateTime<Utc>>,
    /// Status watcher counters
    pub watcher: WatcherStats,
    /// Ingestor counters
    pub ingest: IngestStats,
}

/// Runs the status watcher and the stream ingestor against a shared readiness flag.
pub struct AcquisitionSession {
    status: StatusConfig,
    features: FeatureConfig,
    connect_delay: Duration,
    readiness: Arc<ReadinessState>,
}

type SessionIngestor = StreamIngestor<BoxedSink<SensorSample>, BoxedSink<FeatureRecord>>;

enum FirstExit {
    Watcher(AppResult<WatcherStats>),
    Ingest(AppResult<IngestStats>),
    Shutdown,
}

impl AcquisitionSession {
    /// Create a session with a fresh, unset readiness flag.
    pub fn new(config: &AcquisitionConfig) -> Self {
        Self {
            status: config.status.clone(),
            features: config.features,
            connect_delay: config.printer.connect_delay,
            readiness: Arc::new(ReadinessState::new()),
        }
    }

    /// Shared readiness flag of this session.
    pub fn readiness(&self) -> Arc<ReadinessState> {
        Arc::clone(&self.readiness)
    }

    /// Run both loops until `shutdown` is raised or one of them fails.
    ///
    /// `connect` opens the sample stream; it is awaited after the configured connect
    /// delay inside the ingest task, so a slow or failing connection never blocks
    /// status polling.
    pub async fn run<S, T, C>(
        self,
        source: S,
        connect: C,
        sinks: SessionSinks,
        mut shutdown: watch::Receiver<bool>,
    ) -> AppResult<SessionReport>
    where
        S: StatusSource + 'static,
        T: SampleStream + 'static,
        C: Future<Output = AppResult<T>> + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);

        let watcher = StatusWatcher::new(
            source,
            Arc::clone(&self.readiness),
            sinks.audit,
            &self.status,
        );
        let ingestor = StreamIngestor::new(
            Arc::clone(&self.readiness),
            &self.features,
            sinks.raw,
            sinks.features,
        );

        let mut watcher_task = tokio::spawn(watcher.run(stop_rx.clone()));
        let mut ingest_task = tokio::spawn(ingest_loop(
            ingestor,
            connect,
            self.connect_delay,
            stop_rx,
        ));

        tracing::info!(connect_delay = ?self.connect_delay, "Acquisition session started");

        let first = tokio::select! {
            res = &mut watcher_task => FirstExit::Watcher(joined(res)),
            res = &mut ingest_task => FirstExit::Ingest(joined(res)),
            _ = stop_requested(&mut shutdown) => FirstExit::Shutdown,
        };

        // Receivers may already be gone if both tasks have exited
        let _ = stop_tx.send(true);

        let (watcher, ingest) = match first {
            FirstExit::Watcher(watcher) => {
                let ingest = joined(ingest_task.await);
                (watcher?, ingest?)
            }
            FirstExit::Ingest(ingest) => {
                let watcher = joined(watcher_task.await);
                let ingest = ingest?;
                (watcher?, ingest)
            }
            FirstExit::Shutdown => {
                tracing::info!("Shutdown requested, stopping acquisition");
                let watcher = joined(watcher_task.await);
                let ingest = joined(ingest_task.await);
                (watcher?, ingest?)
            }
        };

        let report = SessionReport {
            triggered_at: self.readiness.triggered_at(),
            watcher,
            ingest,
        };
        tracing::info!(
            triggered_at = ?report.triggered_at,
            polls = report.watcher.polls,
            accepted = report.ingest.accepted,
            features = report.ingest.feature_records,
            "Acquisition session finished"
        );
        Ok(report)
    }
}

async fn ingest_loop<T, C>(
    ingestor: SessionIngestor,
    connect: C,
    connect_delay: Duration,
    mut stop: watch::Receiver<bool>,
) -> AppResult<IngestStats>
where
    T: SampleStream,
    C: Future<Output = AppResult<T>>,
{
    tokio::select! {
        _ = tokio::time::sleep(connect_delay) => {}
        _ = stop_requested(&mut stop) => return Ok(ingestor.stats().clone()),
    }

    let stream = tokio::select! {
        stream = connect => stream?,
        _ = stop_requested(&mut stop) => return Ok(ingestor.stats().clone()),
    };

    ingestor.run(stream, stop).await
}

fn joined<T>(res: Result<AppResult<T>, JoinError>) -> AppResult<T> {
    res.map_err(DaqError::from)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::ingest::StreamMessage;
    use crate::mock::{ChannelSampleStream, ScriptedStatusSource, StatusStep};
    use crate::storage::MemorySink;
    use tempfile::TempDir;

    struct Outputs {
        audit: MemorySink<AuditRecord>,
        raw: MemorySink<SensorSample>,
        features: MemorySink<FeatureRecord>,
    }

    fn memory_sinks() -> (SessionSinks, Outputs) {
        let outputs = Outputs {
            audit: MemorySink::new(),
            raw: MemorySink::new(),
            features: MemorySink::new(),
        };
        let sinks = SessionSinks {
            audit: Box::new(outputs.audit.clone()),
            raw: Box::new(outputs.raw.clone()),
            features: Box::new(outputs.features.clone()),
        };
        (sinks, outputs)
    }

    fn config() -> AcquisitionConfig {
        let mut config = AcquisitionConfig::default();
        config.status.poll_interval = Duration::from_secs(2);
        config.status.retry_backoff = Duration::from_secs(5);
        config.printer.connect_delay = Duration::from_secs(1);
        config.features = FeatureConfig {
            window_length: 100,
            step_size: 20,
        };
        config
    }

    fn heating_then_ready() -> ScriptedStatusSource {
        let mut steps = vec![StatusStep::temps(40.0, 60.0, 150.0, 215.0)];
        steps.extend((0..50).map(|_| StatusStep::temps(60.0, 60.0, 215.0, 215.0)));
        ScriptedStatusSource::new(steps)
    }

    fn batch(start: usize, n: usize) -> StreamMessage {
        StreamMessage::Samples(
            (start..start + n)
                .map(|i| SensorSample::new(i as f64 * 0.001, 0.1, -0.2, 9.8))
                .collect(),
        )
    }

    async fn wait_ready(readiness: &ReadinessState) {
        while !readiness.is_ready() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn gates_until_ready_then_records_until_shutdown() {
        let session = AcquisitionSession::new(&config());
        let readiness = session.readiness();
        let (sinks, outputs) = memory_sinks();
        let (tx, stream) = ChannelSampleStream::new(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Read at t=1s, before the second poll at t=2s raises readiness
        tx.send(batch(0, 100)).await.unwrap();

        let handle = tokio::spawn(session.run(
            heating_then_ready(),
            async move { Ok::<_, DaqError>(stream) },
            sinks,
            shutdown_rx,
        ));

        wait_ready(&readiness).await;
        tx.send(batch(100, 60)).await.unwrap();
        tx.send(StreamMessage::Control).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        shutdown_tx.send(true).unwrap();
        let report = handle.await.unwrap().unwrap();

        assert_eq!(report.ingest.gated_discarded, 100);
        assert_eq!(report.ingest.accepted, 60);
        // window reaches 50 at sample 60, the only multiple of 20 at or past half fill
        assert_eq!(report.ingest.feature_records, 1);
        assert_eq!(outputs.raw.len(), 60);
        assert_eq!(outputs.features.len(), 1);
        assert!(report.triggered_at.is_some());
        assert_eq!(report.triggered_at, readiness.triggered_at());

        let audit = outputs.audit.records();
        assert_eq!(audit.len() as u64, report.watcher.polls);
        assert!(!audit[0].printing);
        assert!(audit[1..].iter().all(|r| r.printing));
    }

    #[tokio::test(start_paused = true)]
    async fn stream_loss_ends_session_with_error() {
        let session = AcquisitionSession::new(&config());
        let readiness = session.readiness();
        let (sinks, outputs) = memory_sinks();
        let (tx, stream) = ChannelSampleStream::new(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(session.run(
            heating_then_ready(),
            async move { Ok::<_, DaqError>(stream) },
            sinks,
            shutdown_rx,
        ));

        wait_ready(&readiness).await;
        tx.send(batch(0, 30)).await.unwrap();
        drop(tx);

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(DaqError::StreamClosed(_))));
        // Samples received before the loss are kept
        assert_eq!(outputs.raw.len(), 30);
        assert!(outputs.raw.flush_count() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_is_fatal() {
        let session = AcquisitionSession::new(&config());
        let (sinks, _outputs) = memory_sinks();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let result = session
            .run(
                heating_then_ready(),
                async {
                    Err::<ChannelSampleStream, _>(DaqError::StreamConnect {
                        url: "ws://printer/klippysocket".to_string(),
                        message: "connection refused".to_string(),
                    })
                },
                sinks,
                shutdown_rx,
            )
            .await;

        assert!(matches!(result, Err(DaqError::StreamConnect { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_before_connect_is_clean() {
        let session = AcquisitionSession::new(&config());
        let (sinks, outputs) = memory_sinks();
        let (_tx, stream) = ChannelSampleStream::new(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();

        let report = session
            .run(
                ScriptedStatusSource::new(vec![StatusStep::temps(25.0, 60.0, 25.0, 215.0)]),
                async move { Ok::<_, DaqError>(stream) },
                sinks,
                shutdown_rx,
            )
            .await
            .unwrap();

        assert_eq!(report.ingest, IngestStats::default());
        assert!(report.triggered_at.is_none());
        assert!(outputs.raw.is_empty());
    }

    #[test]
    fn csv_sinks_create_all_three_files() {
        let dir = TempDir::new().unwrap();
        let output = OutputConfig {
            dir: dir.path().join("run"),
            session_name: "benchy".to_string(),
        };
        let _sinks = SessionSinks::csv(&output).unwrap();

        assert!(output.raw_path().exists());
        assert!(output.features_path().exists());
        assert!(output.status_path().exists());
    }

    #[test]
    fn csv_sinks_fail_on_unwritable_dir() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let output = OutputConfig {
            dir: blocker,
            session_name: "run".to_string(),
        };
        assert!(matches!(
            SessionSinks::csv(&output),
            Err(DaqError::Storage(_))
        ));
    }
}
