//! High-rate sample ingestion, gating and rolling feature cadence.
//!
//! The ingestor starts **Gated**: samples are dropped without being buffered, counted
//! or written. The first sample observed after the readiness flag is raised moves it to
//! **Collecting**, which it never leaves. From then on every sample is written to the
//! raw sink and pushed into the window, and every `step_size`-th accepted sample
//! produces a feature record, provided the window is at least half full.

use crate::acquisition::features;
use crate::acquisition::readiness::ReadinessState;
use crate::acquisition::stop_requested;
use crate::acquisition::types::{FeatureRecord, SensorSample};
use crate::acquisition::window::SampleWindow;
use crate::config::FeatureConfig;
use crate::error::AppResult;
use crate::storage::RecordSink;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;

/// One decoded message from the sample stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Zero or more samples, in device order.
    Samples(Vec<SensorSample>),
    /// Handshake acknowledgements and keepalives carrying no samples.
    Control,
    /// A message without the expected payload; skipped.
    Malformed(String),
}

/// Source of decoded stream messages.
///
/// An `Err` means the channel itself is gone and ends the session.
#[async_trait]
pub trait SampleStream: Send {
    /// Wait for the next message.
    async fn next_message(&mut self) -> AppResult<StreamMessage>;
}

#[async_trait]
impl<T: SampleStream + ?Sized> SampleStream for Box<T> {
    async fn next_message(&mut self) -> AppResult<StreamMessage> {
        (**self).next_message().await
    }
}

/// Gate state of the ingestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    /// Waiting for readiness; samples are discarded.
    Gated,
    /// Recording; terminal for the session.
    Collecting,
}

/// Counters reported when ingestion stops.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestStats {
    /// Messages received, including control and malformed ones
    pub messages: u64,
    /// Messages skipped for missing or invalid payload
    pub malformed_messages: u64,
    /// Samples dropped while gated
    pub gated_discarded: u64,
    /// Samples accepted after the gate opened
    pub accepted: u64,
    /// Feature records emitted
    pub feature_records: u64,
    /// Wall-clock time of the first accepted sample
    pub collection_started_at: Option<DateTime<Utc>>,
}

/// Consumes stream messages into the raw and feature sinks.
pub struct StreamIngestor<R, F> {
    readiness: Arc<ReadinessState>,
    state: IngestState,
    window: SampleWindow,
    step_size: u64,
    min_fill: usize,
    raw: R,
    features: F,
    stats: IngestStats,
}

impl<R, F> StreamIngestor<R, F>
where
    R: RecordSink<SensorSample>,
    F: RecordSink<FeatureRecord>,
{
    /// Create a gated ingestor.
    pub fn new(readiness: Arc<ReadinessState>, config: &FeatureConfig, raw: R, features: F) -> Self {
        Self {
            readiness,
            state: IngestState::Gated,
            window: SampleWindow::new(config.window_length),
            step_size: config.step_size.max(1) as u64,
            min_fill: config.min_fill(),
            raw,
            features,
            stats: IngestStats::default(),
        }
    }

    /// Current gate state.
    pub fn state(&self) -> IngestState {
        self.state
    }

    /// Counters so far.
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Samples currently held in the window.
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Process one stream message.
    ///
    /// The raw sink is flushed once per message that contributed accepted samples.
    pub fn handle_message(&mut self, message: StreamMessage) -> AppResult<()> {
        self.stats.messages += 1;
        match message {
            StreamMessage::Samples(samples) => {
                let before = self.stats.accepted;
                for sample in samples {
                    self.handle_sample(sample)?;
                }
                if self.stats.accepted > before {
                    self.raw.flush()?;
                }
            }
            StreamMessage::Control => {
                tracing::trace!("Control message");
            }
            StreamMessage::Malformed(reason) => {
                self.stats.malformed_messages += 1;
                tracing::debug!(
                    reason = %reason,
                    skipped = self.stats.malformed_messages,
                    "Skipping malformed stream message"
                );
            }
        }
        Ok(())
    }

    /// Process one sample. Returns whether it was accepted.
    pub fn handle_sample(&mut self, sample: SensorSample) -> AppResult<bool> {
        if self.state == IngestState::Gated {
            if !self.readiness.is_ready() {
                self.stats.gated_discarded += 1;
                return Ok(false);
            }
            self.open_gate(&sample);
        }

        self.raw.append(&sample)?;
        self.stats.accepted += 1;
        self.window.push(sample);

        if self.stats.accepted % self.step_size == 0 && self.window.len() >= self.min_fill {
            let record = features::compute_series(&self.window.snapshot(), Utc::now());
            self.features.append(&record)?;
            self.features.flush()?;
            self.stats.feature_records += 1;
        }

        Ok(true)
    }

    fn open_gate(&mut self, first: &SensorSample) {
        let now = Utc::now();
        self.state = IngestState::Collecting;
        self.stats.collection_started_at = Some(now);

        let latency_ms = self
            .readiness
            .triggered_at()
            .map(|t| (now - t).num_milliseconds());
        tracing::info!(
            started_at = %now,
            device_time = first.timestamp,
            trigger_latency_ms = ?latency_ms,
            discarded = self.stats.gated_discarded,
            "Accelerometer logging started"
        );
    }

    /// Flush both sinks.
    pub fn flush(&mut self) -> AppResult<()> {
        self.raw.flush()?;
        self.features.flush()
    }

    /// Consume `stream` until `stop` is raised or the stream fails.
    ///
    /// Stream errors are fatal and returned as-is; malformed messages are skipped.
    pub async fn run<S>(mut self, mut stream: S, mut stop: watch::Receiver<bool>) -> AppResult<IngestStats>
    where
        S: SampleStream,
    {
        loop {
            tokio::select! {
                message = stream.next_message() => {
                    let message = match message {
                        Ok(message) => message,
                        Err(e) => {
                            // Keep what was received before the channel dropped
                            if let Err(flush_err) = self.flush() {
                                tracing::warn!(error = %flush_err, "Flush after stream loss failed");
                            }
                            return Err(e);
                        }
                    };
                    self.handle_message(message)?;
                }
                _ = stop_requested(&mut stop) => break,
            }
        }

        self.flush()?;
        tracing::info!(
            accepted = self.stats.accepted,
            features = self.stats.feature_records,
            malformed = self.stats.malformed_messages,
            "Accelerometer logging stopped"
        );
        Ok(self.stats)
    }
}
