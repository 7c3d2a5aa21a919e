//! Simulated printer collaborators.
//!
//! Provides stand-ins for the two printer channels so the full pipeline can run
//! without hardware:
//!
//! - [`SimulatedPrinter`]: heaters ramp from ambient towards their targets, one step per
//!   poll, then progress advances.
//! - [`SimulatedAccelerometer`]: batches of synthetic three-axis vibration at a fixed
//!   sample rate.
//! - [`ScriptedStatusSource`] and [`ChannelSampleStream`]: deterministic sources for
//!   tests, driven by a fixed script or by the test itself.

use crate::acquisition::ingest::{SampleStream, StreamMessage};
use crate::acquisition::status::StatusSource;
use crate::acquisition::types::{SensorSample, StatusSample};
use crate::error::{AppResult, DaqError};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::time::Duration;
use tokio::sync::mpsc;

// =============================================================================
// Status
// =============================================================================

/// One step of a [`ScriptedStatusSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum StatusStep {
    /// Answer with these readings.
    Reading {
        /// Bed temperature
        bed_temp: f64,
        /// Bed target
        bed_target: f64,
        /// Nozzle temperature
        nozzle_temp: f64,
        /// Nozzle target
        nozzle_target: f64,
        /// Progress fraction
        progress: f64,
    },
    /// Fail with a transport error.
    Fail(String),
}

impl StatusStep {
    /// Reading with zero progress.
    pub fn temps(bed_temp: f64, bed_target: f64, nozzle_temp: f64, nozzle_target: f64) -> Self {
        StatusStep::Reading {
            bed_temp,
            bed_target,
            nozzle_temp,
            nozzle_target,
            progress: 0.0,
        }
    }

    /// Transport failure.
    pub fn fail(message: impl Into<String>) -> Self {
        StatusStep::Fail(message.into())
    }
}

/// Status source replaying a fixed script; fails once the script is exhausted.
#[derive(Debug, Default)]
pub struct ScriptedStatusSource {
    steps: Mutex<VecDeque<StatusStep>>,
}

impl ScriptedStatusSource {
    /// Create a source answering with `steps` in order.
    pub fn new(steps: impl IntoIterator<Item = StatusStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
        }
    }

    /// Steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.steps.lock().len()
    }
}

#[async_trait]
impl StatusSource for ScriptedStatusSource {
    async fn query(&self) -> AppResult<StatusSample> {
        let step = self.steps.lock().pop_front();
        match step {
            Some(StatusStep::Reading {
                bed_temp,
                bed_target,
                nozzle_temp,
                nozzle_target,
                progress,
            }) => Ok(StatusSample {
                timestamp: Utc::now(),
                bed_temp,
                bed_target,
                nozzle_temp,
                nozzle_target,
                progress,
            }),
            Some(StatusStep::Fail(message)) => Err(DaqError::StatusQuery(message)),
            None => Err(DaqError::StatusQuery("status script exhausted".to_string())),
        }
    }
}

/// Printer whose heaters warm up linearly, one step per poll.
#[derive(Debug)]
pub struct SimulatedPrinter {
    ambient: f64,
    bed_target: f64,
    nozzle_target: f64,
    bed_step: f64,
    nozzle_step: f64,
    polls: Mutex<u64>,
}

impl Default for SimulatedPrinter {
    fn default() -> Self {
        Self::new(60.0, 215.0)
    }
}

impl SimulatedPrinter {
    /// Printer heating to the given targets from 25 °C in about ten polls.
    pub fn new(bed_target: f64, nozzle_target: f64) -> Self {
        let ambient = 25.0;
        Self {
            ambient,
            bed_target,
            nozzle_target,
            bed_step: (bed_target - ambient).max(0.0) / 8.0,
            nozzle_step: (nozzle_target - ambient).max(0.0) / 10.0,
            polls: Mutex::new(0),
        }
    }

    fn reading(&self, poll: u64) -> StatusSample {
        let k = poll as f64;
        let bed_temp = (self.ambient + self.bed_step * k).min(self.bed_target);
        let nozzle_temp = (self.ambient + self.nozzle_step * k).min(self.nozzle_target);
        let heated = bed_temp >= self.bed_target && nozzle_temp >= self.nozzle_target;
        let progress = if heated {
            ((k - 10.0).max(0.0) * 0.01).min(1.0)
        } else {
            0.0
        };
        StatusSample {
            timestamp: Utc::now(),
            bed_temp,
            bed_target: self.bed_target,
            nozzle_temp,
            nozzle_target: self.nozzle_target,
            progress,
        }
    }
}

#[async_trait]
impl StatusSource for SimulatedPrinter {
    async fn query(&self) -> AppResult<StatusSample> {
        let poll = {
            let mut polls = self.polls.lock();
            let current = *polls;
            *polls += 1;
            current
        };
        Ok(self.reading(poll))
    }
}

// =============================================================================
// Samples
// =============================================================================

/// Sample stream fed through an in-process channel.
///
/// Dropping every sender closes the stream, which the ingestor sees as a lost
/// connection.
#[derive(Debug)]
pub struct ChannelSampleStream {
    rx: mpsc::Receiver<StreamMessage>,
}

impl ChannelSampleStream {
    /// Create a stream and the sender that feeds it.
    pub fn new(capacity: usize) -> (mpsc::Sender<StreamMessage>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }
}

#[async_trait]
impl SampleStream for ChannelSampleStream {
    async fn next_message(&mut self) -> AppResult<StreamMessage> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| DaqError::StreamClosed("sample channel closed".to_string()))
    }
}

/// Synthetic accelerometer producing vibration batches at a fixed rate.
pub struct SimulatedAccelerometer {
    sample_rate_hz: f64,
    batch_size: usize,
    ticker: Option<tokio::time::Interval>,
    rng: StdRng,
    next_index: u64,
}

impl SimulatedAccelerometer {
    /// Stream `sample_rate_hz` samples per second in batches of `batch_size`.
    pub fn new(sample_rate_hz: f64, batch_size: usize) -> Self {
        Self {
            sample_rate_hz: sample_rate_hz.max(1.0),
            batch_size: batch_size.max(1),
            ticker: None,
            rng: StdRng::seed_from_u64(0x5EED),
            next_index: 0,
        }
    }

    fn batch_period(&self) -> Duration {
        Duration::from_secs_f64(self.batch_size as f64 / self.sample_rate_hz)
    }

    fn next_batch(&mut self) -> Vec<SensorSample> {
        (0..self.batch_size)
            .map(|_| {
                let t = self.next_index as f64 / self.sample_rate_hz;
                self.next_index += 1;
                let noise = |rng: &mut StdRng| rng.gen_range(-50.0..50.0);
                SensorSample::new(
                    t,
                    400.0 * (TAU * 42.0 * t).sin() + noise(&mut self.rng),
                    250.0 * (TAU * 87.0 * t).sin() + noise(&mut self.rng),
                    9806.0 + 120.0 * (TAU * 130.0 * t).sin() + noise(&mut self.rng),
                )
            })
            .collect()
    }
}

impl Default for SimulatedAccelerometer {
    fn default() -> Self {
        Self::new(3200.0, 32)
    }
}

#[async_trait]
impl SampleStream for SimulatedAccelerometer {
    async fn next_message(&mut self) -> AppResult<StreamMessage> {
        let period = self.batch_period();
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;
        Ok(StreamMessage::Samples(self.next_batch()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_source_replays_then_fails() {
        let source = ScriptedStatusSource::new(vec![
            StatusStep::temps(20.0, 60.0, 20.0, 200.0),
            StatusStep::fail("boom"),
        ]);
        assert_eq!(source.query().await.unwrap().bed_temp, 20.0);
        assert!(matches!(source.query().await, Err(DaqError::StatusQuery(m)) if m == "boom"));
        assert!(source.query().await.is_err());
        assert_eq!(source.remaining(), 0);
    }

    #[tokio::test]
    async fn simulated_printer_reaches_targets() {
        let printer = SimulatedPrinter::new(60.0, 215.0);
        let first = printer.query().await.unwrap();
        assert!(!first.heaters_at_target());

        let mut reached = None;
        for poll in 1..20 {
            if printer.query().await.unwrap().heaters_at_target() {
                reached = Some(poll);
                break;
            }
        }
        assert_eq!(reached, Some(10));
    }

    #[tokio::test]
    async fn channel_stream_closes_when_senders_drop() {
        let (tx, mut stream) = ChannelSampleStream::new(4);
        tx.send(StreamMessage::Control).await.unwrap();
        drop(tx);
        assert_eq!(stream.next_message().await.unwrap(), StreamMessage::Control);
        assert!(matches!(
            stream.next_message().await,
            Err(DaqError::StreamClosed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_accelerometer_batches_are_contiguous() {
        let mut accel = SimulatedAccelerometer::new(3200.0, 32);
        let mut timestamps = Vec::new();
        for _ in 0..3 {
            match accel.next_message().await.unwrap() {
                StreamMessage::Samples(batch) => {
                    assert_eq!(batch.len(), 32);
                    timestamps.extend(batch.iter().map(|s| s.timestamp));
                }
                other => panic!("unexpected message: {:?}", other),
            }
        }
        assert!(timestamps.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(timestamps.len(), 96);
    }
}
