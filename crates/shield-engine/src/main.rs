//! Vision engine binary.

use anyhow::Context;
use tracing::{error, info, warn};

use shield_detect::HttpDetector;
use shield_engine::{build_pipeline, init_tracing, Engine, EngineConfig, EngineError};
use shield_media::{FfmpegSource, FrameSource};
use shield_models::DetectorKind;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for wss:// and https://)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting shield-engine");

    let config = EngineConfig::from_env();
    config.validate().context("invalid configuration")?;
    info!("Engine config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        shield_engine::metrics::init_metrics(addr)?;
        info!("Serving metrics on {}", addr);
    }

    // An unusable camera at startup is the only fatal runtime error.
    let mut source = FfmpegSource::new(config.source.clone());
    if let Err(e) = source.open().await.map_err(EngineError::from) {
        error!("Camera unavailable: {}", e);
        if e.is_fatal() {
            std::process::exit(1);
        }
        warn!("Continuing; capture will keep retrying {}", source.describe());
    } else {
        info!("Opened {}", source.describe());
    }

    let pipeline = build_pipeline(&config).context("failed to build pipeline")?;
    for kind in pipeline.pool.kinds() {
        info!(detector = %kind, "Detector slot bound to {}", config.detector.base_url);
    }

    // Detectors that cannot be reached only produce empty results, so an
    // unhealthy service is reported but does not stop startup.
    let service = HttpDetector::new(DetectorKind::Fight, config.detector.clone())?;
    match service.health_check().await {
        Ok(true) => info!("Inference service at {} is healthy", config.detector.base_url),
        Ok(false) => warn!(
            "Inference service at {} is not healthy; detections stay empty until it recovers",
            config.detector.base_url
        ),
        Err(e) => warn!("Inference service health check failed: {}", e),
    }

    let engine = Engine::new(config, source, pipeline);

    // Setup signal handler
    let shutdown = engine.shutdown_handle();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal");
        let _ = shutdown.send(true);
    });

    let stats = engine.run().await;

    info!(
        frames = stats.frames,
        read_errors = stats.read_errors,
        "Engine shutdown complete"
    );
    Ok(())
}
