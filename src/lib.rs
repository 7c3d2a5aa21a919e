//! # print_daq
//!
//! Temperature-gated vibration acquisition for Klipper/Moonraker 3D printers.
//!
//! A printer reports a job as printing while it is still heating. This crate waits
//! until the bed and nozzle actually reach their targets, then records the printer's
//! accelerometer stream together with rolling vibration statistics. Everything before
//! that instant is discarded.
//!
//! ## Crate Structure
//!
//! - **`acquisition`**: The engine. Readiness flag, status watcher, stream ingestor,
//!   sliding window, feature extraction and the session supervisor tying them together.
//! - **`config`**: Figment-based configuration (`config/print_daq.toml` + `PRINT_DAQ_*`).
//! - **`error`**: The `DaqError` enum and `AppResult` alias used throughout.
//! - **`logging`**: `tracing-subscriber` initialisation (pretty, compact or JSON).
//! - **`mock`**: Simulated printer and scripted sources for offline runs and tests.
//! - **`moonraker`**: REST status client and WebSocket accelerometer client.
//! - **`storage`**: Append-only CSV and in-memory record sinks.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod logging;
pub mod mock;
pub mod moonraker;
pub mod storage;

pub use config::AcquisitionConfig;
pub use error::{AppResult, DaqError};
