//! Telemetry message types.
//!
//! Text frames sent to the live viewer. Each tick produces one
//! `detections` message followed by one binary JPEG frame.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Detection, DetectorKind, DetectorResult, Event, EventType};

/// Telemetry message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryMessage {
    /// Detector output for one tick.
    ///
    /// Every detector key is always present; `event_type` is `null` when no
    /// event was raised.
    Detections {
        fight: Vec<Detection>,
        fire: Vec<Detection>,
        crowd: Vec<Detection>,
        weapon: Vec<Detection>,
        event_type: Option<EventType>,
    },
}

impl TelemetryMessage {
    /// Create a detections message from a tick's results.
    pub fn detections(result: &DetectorResult, event: Option<&Event>) -> Self {
        TelemetryMessage::Detections {
            fight: result.get(DetectorKind::Fight).to_vec(),
            fire: result.get(DetectorKind::Fire).to_vec(),
            crowd: result.get(DetectorKind::Crowd).to_vec(),
            weapon: result.get(DetectorKind::Weapon).to_vec(),
            event_type: event.map(|e| e.event_type),
        }
    }

    /// Event type carried by the message, if any.
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            TelemetryMessage::Detections { event_type, .. } => *event_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detections_message_shape() {
        let result = DetectorResult::new().with(
            DetectorKind::Fire,
            vec![Detection::new([1.0, 2.0, 3.0, 4.0], 0.6, 0, "fire")],
        );
        let event = Event::new(EventType::Fire, 0.6);
        let msg = TelemetryMessage::detections(&result, Some(&event));

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "detections");
        assert_eq!(json["event_type"], "Fire");
        assert_eq!(json["fire"].as_array().unwrap().len(), 1);
        assert_eq!(json["fight"], serde_json::json!([]));
        assert_eq!(json["weapon"], serde_json::json!([]));
    }

    #[test]
    fn test_no_event_serializes_null() {
        let msg = TelemetryMessage::detections(&DetectorResult::new(), None);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"event_type\":null"));
    }
}
