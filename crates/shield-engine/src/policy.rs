//! Event classification.
//!
//! Priority is fixed policy, highest first: Fire, Violence, Stampede. A
//! higher-priority event wins even when a lower one has a larger confidence.
//! Weapon detections are reported but never raise an event.

use shield_models::{DetectorKind, DetectorResult, Event, EventType};

/// Classify one tick's detector output. `None` means no event.
pub fn classify(result: &DetectorResult, stampede_threshold: usize) -> Option<Event> {
    if let Some(confidence) = result.max_confidence(DetectorKind::Fire) {
        return Some(Event::new(EventType::Fire, confidence));
    }

    if let Some(confidence) = result.max_confidence(DetectorKind::Fight) {
        return Some(Event::new(EventType::Violence, confidence));
    }

    let crowd = result.count(DetectorKind::Crowd);
    if crowd > 0 && crowd >= stampede_threshold {
        let confidence = result.max_confidence(DetectorKind::Crowd).unwrap_or(0.0);
        return Some(Event::new(EventType::Stampede, confidence));
    }

    None
}
