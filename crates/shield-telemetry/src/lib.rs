//! Live telemetry to the viewer.
//!
//! Per tick the engine sends one JSON text message describing the detections
//! followed by one binary message carrying the JPEG frame. Delivery is
//! best-effort: nothing is queued while the connection is down.

pub mod channel;
pub mod error;

pub use channel::{ConnectionStatus, TelemetryChannel, TelemetryConfig, TelemetrySink};
pub use error::{TelemetryError, TelemetryResult};
