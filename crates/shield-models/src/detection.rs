//! Detector outputs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single detection produced by a detector for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    /// Bounding box as `[x1, y1, x2, y2]` in pixel coordinates
    pub bbox: [f32; 4],
    /// Confidence in `[0, 1]`
    pub confidence: f32,
    /// Model class id
    pub class_id: i32,
    /// Human readable class label
    pub label: String,
}

impl Detection {
    pub fn new(bbox: [f32; 4], confidence: f32, class_id: i32, label: impl Into<String>) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
            label: label.into(),
        }
    }
}

/// The detector slots the engine knows about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Fight / violence detector
    Fight,
    /// Fire detector
    Fire,
    /// Person detector used for crowd counting
    Crowd,
    /// Weapon detector (reported only, never raises an event)
    Weapon,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Fight => "fight",
            DetectorKind::Fire => "fire",
            DetectorKind::Crowd => "crowd",
            DetectorKind::Weapon => "weapon",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorKind {
    type Err = DetectorKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fight" | "violence" => Ok(DetectorKind::Fight),
            "fire" => Ok(DetectorKind::Fire),
            "crowd" => Ok(DetectorKind::Crowd),
            "weapon" => Ok(DetectorKind::Weapon),
            _ => Err(DetectorKindParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown detector kind: {0}")]
pub struct DetectorKindParseError(String);

/// Per-detector detections for one frame.
///
/// Lives only for the duration of a single pipeline tick. A detector that was
/// configured but failed is present with an empty list; a detector that is not
/// configured is absent, and [`DetectorResult::get`] reports it as empty too.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectorResult {
    detections: BTreeMap<DetectorKind, Vec<Detection>>,
}

impl DetectorResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the output of one detector, replacing any previous entry.
    pub fn insert(&mut self, kind: DetectorKind, detections: Vec<Detection>) {
        self.detections.insert(kind, detections);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, kind: DetectorKind, detections: Vec<Detection>) -> Self {
        self.insert(kind, detections);
        self
    }

    /// Detections for a detector, in the order the detector returned them.
    pub fn get(&self, kind: DetectorKind) -> &[Detection] {
        self.detections
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the detector reported for this tick (possibly with nothing).
    pub fn contains(&self, kind: DetectorKind) -> bool {
        self.detections.contains_key(&kind)
    }

    pub fn count(&self, kind: DetectorKind) -> usize {
        self.get(kind).len()
    }

    /// Highest confidence reported by a detector, if it reported anything.
    pub fn max_confidence(&self, kind: DetectorKind) -> Option<f32> {
        self.get(kind)
            .iter()
            .map(|d| d.confidence)
            .fold(None, |acc, c| Some(acc.map_or(c, |m: f32| m.max(c))))
    }

    /// Detectors present in this result.
    pub fn kinds(&self) -> impl Iterator<Item = DetectorKind> + '_ {
        self.detections.keys().copied()
    }

    pub fn total(&self) -> usize {
        self.detections.values().map(Vec::len).sum()
    }
}
