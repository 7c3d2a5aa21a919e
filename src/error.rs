//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for the whole acquisition
//! pipeline. Using the `thiserror` crate, it provides a centralized and consistent way to
//! handle everything that can go wrong, from configuration issues to printer
//! communication and output files.
//!
//! ## Error Hierarchy
//!
//! Errors fall into three categories, matching how the pipeline reacts to them:
//!
//! 1. **Transient** - `StatusQuery`, `StatusPayload`
//!    - Raised by the status poller when the printer's REST endpoint is unreachable
//!      or returns an unexpected payload.
//!    - Recovery: logged, retried after the configured backoff. Never ends a session.
//!
//! 2. **Skippable** - malformed streaming messages never become a `DaqError`; the
//!    ingestor counts and drops them (see `acquisition::ingest`).
//!
//! 3. **Fatal** - `StreamConnect`, `StreamClosed`, `WebSocket`, `SubscriptionRejected`,
//!    `Storage`, `Csv`, `Io`, `TaskJoin`
//!    - Loss of the sample stream or an output file that cannot be written.
//!    - Recovery: the session stops and the error is returned to the caller, who may
//!      restart the whole pipeline.
//!
//! `Config` and `Configuration` are startup errors: fix the configuration and restart.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Primary error type for the acquisition pipeline.
#[derive(Error, Debug)]
pub enum DaqError {
    /// Configuration sources could not be parsed or merged.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but holds values that make no sense.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Underlying file or socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An output sink could not be opened or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// CSV encoding failure while writing a record.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The status endpoint could not be reached or answered with an HTTP error.
    #[error("Status query failed: {0}")]
    StatusQuery(String),

    /// The status endpoint answered, but without the fields the poller needs.
    #[error("Malformed status payload: {0}")]
    StatusPayload(String),

    /// The streaming channel could not be opened.
    #[error("Failed to connect sample stream at {url}: {message}")]
    StreamConnect {
        /// Stream URL that was dialled.
        url: String,
        /// Transport error description.
        message: String,
    },

    /// The streaming channel went away while the session was running.
    #[error("Sample stream closed: {0}")]
    StreamClosed(String),

    /// Transport-level WebSocket failure on an established stream.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The printer refused the sensor subscription.
    #[error("Sensor subscription rejected: {0}")]
    SubscriptionRejected(String),

    /// One of the session tasks panicked or was cancelled.
    #[error("Acquisition task failed: {0}")]
    TaskJoin(String),
}

impl DaqError {
    /// Whether the status poller may retry after this error.
    ///
    /// Only status transport and payload errors are recoverable; everything else ends
    /// the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DaqError::StatusQuery(_) | DaqError::StatusPayload(_))
    }
}

impl From<figment::Error> for DaqError {
    fn from(value: figment::Error) -> Self {
        DaqError::Config(Box::new(value))
    }
}

impl From<reqwest::Error> for DaqError {
    fn from(value: reqwest::Error) -> Self {
        DaqError::StatusQuery(value.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DaqError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match value {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                DaqError::StreamClosed(value.to_string())
            }
            other => DaqError::WebSocket(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for DaqError {
    fn from(value: tokio::task::JoinError) -> Self {
        DaqError::TaskJoin(value.to_string())
    }
}
