//! Moonraker client adapters.
//!
//! Moonraker fronts the Klipper firmware with a REST API (status polling) and a
//! WebSocket bridge (raw accelerometer dumps). Each adapter implements one of the
//! acquisition seams: [`MoonrakerStatusClient`] is a
//! [`StatusSource`](crate::acquisition::StatusSource) and [`AdxlStreamClient`] a
//! [`SampleStream`](crate::acquisition::SampleStream).

pub mod http;
pub mod protocol;
pub mod websocket;

pub use http::MoonrakerStatusClient;
pub use websocket::AdxlStreamClient;
