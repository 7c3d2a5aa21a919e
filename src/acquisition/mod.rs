//! Temperature-gated accelerometer acquisition.
//!
//! Two loops run for the lifetime of a session:
//!
//! ```text
//!   StatusSource ──poll──▶ StatusWatcher ──audit──▶ status.csv
//!                               │
//!                        try_set_ready()
//!                               ▼
//!                        ReadinessState (one atomic word)
//!                               │ is_ready()
//!                               ▼
//!   SampleStream ──msg──▶ StreamIngestor ──raw──▶ raw.csv
//!                               │
//!                         SampleWindow ─every step_size─▶ features ──▶ features.csv
//! ```
//!
//! The watcher is the only writer of the readiness flag and the ingestor the only
//! reader, so no other state is shared. [`session::AcquisitionSession`] spawns both
//! loops and owns their shutdown.

pub mod features;
pub mod ingest;
pub mod readiness;
pub mod session;
pub mod status;
pub mod types;
pub mod window;

pub use ingest::{IngestState, IngestStats, SampleStream, StreamIngestor, StreamMessage};
pub use readiness::ReadinessState;
pub use session::{AcquisitionSession, SessionReport, SessionSinks};
pub use status::{StatusSource, StatusWatcher, WatcherStats};
pub use types::{AuditRecord, AxisFeatures, FeatureRecord, SensorSample, StatusSample};
pub use window::{AxisSeries, SampleWindow};

use tokio::sync::watch;

/// Resolve once the stop flag is raised.
///
/// A dropped sender never counts as a stop request; the future then stays pending.
pub(crate) async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
