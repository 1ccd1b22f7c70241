//! Event classification.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of incident raised for a tick.
///
/// The absence of an event is expressed as `Option<Event>::None` rather than a
/// variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum EventType {
    Fire,
    Violence,
    Stampede,
}

impl EventType {
    /// Name used on the wire, in clip file names and upload fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Fire => "Fire",
            EventType::Violence => "Violence",
            EventType::Stampede => "Stampede",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = EventTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fire" => Ok(EventType::Fire),
            "violence" => Ok(EventType::Violence),
            "stampede" => Ok(EventType::Stampede),
            _ => Err(EventTypeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown event type: {0}")]
pub struct EventTypeParseError(String);

/// The single event chosen for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    pub event_type: EventType,
    /// Confidence in `[0, 1]`; 0.0 when the deciding detector reported none
    pub confidence: f32,
}

impl Event {
    pub fn new(event_type: EventType, confidence: f32) -> Self {
        Self {
            event_type,
            confidence,
        }
    }
}
