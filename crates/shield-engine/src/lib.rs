//! Real-time vision orchestration engine.
//!
//! This crate provides:
//! - Engine configuration
//! - The capture loop feeding the latest-frame mailbox and ring buffer
//! - Event classification and the clip cooldown gate
//! - Clip recording and the orchestrator main loop
//! - Graceful shutdown

pub mod capture;
pub mod config;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mailbox;
pub mod metrics;
pub mod orchestrator;
pub mod policy;
pub mod recorder;
pub mod ring_buffer;

pub use capture::{CaptureLoop, CaptureStats};
pub use config::EngineConfig;
pub use cooldown::{CooldownGate, GateState};
pub use engine::{build_pipeline, Engine};
pub use error::{EngineError, EngineResult};
pub use logging::{init_tracing, CameraLogger};
pub use mailbox::{latest_frame, FramePublisher, LatestFrame};
pub use orchestrator::{ClipDecision, Orchestrator, Pipeline, TickOutcome};
pub use policy::classify;
pub use recorder::{ClipRecorder, FfmpegClipRecorder};
pub use ring_buffer::RingBuffer;
