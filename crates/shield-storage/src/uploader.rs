//! Fire-and-forget clip uploads.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use shield_models::ClipArtifact;

use crate::collector::ClipTransport;

/// Counter of finished upload attempts, labelled by `status`.
pub const UPLOADS_TOTAL: &str = "shield_uploads_total";
const UPLOAD_DURATION_SECONDS: &str = "shield_upload_duration_seconds";

/// Hands clips to a transport on background tasks.
///
/// A failed upload is logged and dropped; the clip stays on disk.
#[derive(Clone)]
pub struct Uploader {
    transport: Arc<dyn ClipTransport>,
}

impl Uploader {
    pub fn new(transport: Arc<dyn ClipTransport>) -> Self {
        Self { transport }
    }

    /// Start delivering `artifact` and return immediately.
    ///
    /// The returned handle may be dropped; the upload keeps running.
    pub fn submit(&self, artifact: ClipArtifact) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            let started = Instant::now();
            info!(
                event_type = %artifact.metadata.event_type,
                "Uploading {}",
                artifact.path().display()
            );

            match transport.deliver(&artifact).await {
                Ok(()) => {
                    counter!(UPLOADS_TOTAL, "status" => "success").increment(1);
                    info!(
                        event_type = %artifact.metadata.event_type,
                        "Uploaded {} in {:?}",
                        artifact.file_name(),
                        started.elapsed()
                    );
                }
                Err(e) => {
                    counter!(UPLOADS_TOTAL, "status" => "failed", "reason" => e.kind()).increment(1);
                    warn!(
                        event_type = %artifact.metadata.event_type,
                        error = %e,
                        "Failed to upload {}",
                        artifact.path().display()
                    );
                }
            }
            histogram!(UPLOAD_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        })
    }
}
