//! JSON payloads exchanged with Moonraker.
//!
//! Status snapshot (REST):
//!
//! ```text
//! GET /printer/objects/query?heater_bed&extruder&print_stats&display_status
//! {"result": {"status": {
//!     "heater_bed":     {"temperature": 59.8, "target": 60.0},
//!     "extruder":       {"temperature": 214.6, "target": 215.0},
//!     "print_stats":    {"state": "printing", ...},
//!     "display_status": {"progress": 0.12}
//! }}}
//! ```
//!
//! Accelerometer stream (WebSocket, JSON-RPC):
//!
//! ```text
//! → {"id": 1, "method": "adxl345/dump_adxl345", "params": {"sensor": "adxl345"}}
//! ← {"id": 1, "result": {"header": ["time", "x_acceleration", ...]}}
//! ← {"params": {"data": [[t, x, y, z], ...], "overflows": 0}}
//! ```

use crate::acquisition::ingest::StreamMessage;
use crate::acquisition::types::{SensorSample, StatusSample};
use crate::error::{AppResult, DaqError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

/// Objects requested from the status endpoint.
pub const STATUS_QUERY_PATH: &str =
    "/printer/objects/query?heater_bed&extruder&print_stats&display_status";

/// Request id used for the stream subscription.
pub const SUBSCRIBE_REQUEST_ID: u64 = 1;

/// Full status query URL for a REST base such as `http://printer:7125`.
pub fn status_query_url(base: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), STATUS_QUERY_PATH)
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    status: PrinterObjects,
}

#[derive(Debug, Default, Deserialize)]
struct PrinterObjects {
    heater_bed: Option<Heater>,
    extruder: Option<Heater>,
    print_stats: Option<Progress>,
    display_status: Option<Progress>,
}

#[derive(Debug, Default, Deserialize)]
struct Heater {
    temperature: Option<f64>,
    target: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Progress {
    progress: Option<f64>,
}

fn heater_reading(heater: Option<&Heater>, name: &str) -> AppResult<(f64, f64)> {
    let heater =
        heater.ok_or_else(|| DaqError::StatusPayload(format!("missing '{}' object", name)))?;
    match (heater.temperature, heater.target) {
        (Some(temperature), Some(target)) => Ok((temperature, target)),
        _ => Err(DaqError::StatusPayload(format!(
            "'{}' lacks temperature or target",
            name
        ))),
    }
}

/// Parse a status query response body taken at `at`.
///
/// Progress comes from `display_status`, then `print_stats`, and defaults to 0.
pub fn parse_status_response(body: &str, at: DateTime<Utc>) -> AppResult<StatusSample> {
    let response: QueryResponse = serde_json::from_str(body)
        .map_err(|e| DaqError::StatusPayload(format!("unexpected response: {}", e)))?;
    let objects = response.result.status;

    let (bed_temp, bed_target) = heater_reading(objects.heater_bed.as_ref(), "heater_bed")?;
    let (nozzle_temp, nozzle_target) = heater_reading(objects.extruder.as_ref(), "extruder")?;
    let progress = objects
        .display_status
        .and_then(|p| p.progress)
        .or_else(|| objects.print_stats.and_then(|p| p.progress))
        .unwrap_or(0.0);

    Ok(StatusSample {
        timestamp: at,
        bed_temp,
        bed_target,
        nozzle_temp,
        nozzle_target,
        progress,
    })
}

/// Chip name used in the dump endpoint: the first word of the sensor name.
///
/// `"adxl345"` and `"adxl345 bed"` both address `adxl345/dump_adxl345`.
pub fn sensor_chip(sensor: &str) -> &str {
    sensor.split_whitespace().next().unwrap_or(sensor)
}

/// JSON-RPC request subscribing to the raw dump of `sensor`.
pub fn subscribe_request(sensor: &str) -> String {
    let chip = sensor_chip(sensor);
    json!({
        "id": SUBSCRIBE_REQUEST_ID,
        "method": format!("{chip}/dump_{chip}"),
        "params": { "sensor": sensor },
    })
    .to_string()
}

fn decode_row(row: &Value) -> Option<SensorSample> {
    let fields = row.as_array()?;
    if fields.len() < 4 {
        return None;
    }
    Some(SensorSample::new(
        fields[0].as_f64()?,
        fields[1].as_f64()?,
        fields[2].as_f64()?,
        fields[3].as_f64()?,
    ))
}

/// Decode one text frame from the stream.
///
/// A rejected subscription is the only error; everything that is neither a sample
/// batch nor a handshake reply decodes as [`StreamMessage::Malformed`]. One bad row
/// makes the whole message malformed.
pub fn decode_stream_message(text: &str) -> AppResult<StreamMessage> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => return Ok(StreamMessage::Malformed(format!("invalid JSON: {}", e))),
    };

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(DaqError::SubscriptionRejected(message));
    }

    if let Some(data) = value.get("params").and_then(|p| p.get("data")) {
        let Some(rows) = data.as_array() else {
            return Ok(StreamMessage::Malformed("'data' is not an array".to_string()));
        };
        let mut samples = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            match decode_row(row) {
                Some(sample) => samples.push(sample),
                None => {
                    return Ok(StreamMessage::Malformed(format!(
                        "row {} is not [t, x, y, z]: {}",
                        i, row
                    )))
                }
            }
        }
        return Ok(StreamMessage::Samples(samples));
    }

    if value.get("result").is_some() {
        return Ok(StreamMessage::Control);
    }

    Ok(StreamMessage::Malformed("no sample payload".to_string()))
}
