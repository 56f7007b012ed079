use anyhow::{Context, Result};
use pqsecure_certgen::{config::load_config, pipeline::ArtifactPipeline, telemetry, FsArtifactStore};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Pick up a local .env before reading configuration
    dotenvy::dotenv().ok();

    // 2. Load configuration
    let config = load_config().context("Failed to load configuration")?;

    // 3. Initialize telemetry
    telemetry::init_logging(&config.telemetry)?;
    info!("Starting PQSecure CertGen...");

    // 4. Artifact store for the configured output directory
    let store = Arc::new(FsArtifactStore::new(&config.output.dir, config.output.format));

    // 5. Generate and emit every artifact
    let pipeline = ArtifactPipeline::new(config.algorithms.clone(), store);
    let summary = pipeline.run().await.context("Artifact generation failed")?;

    info!(
        run_id = %summary.run_id,
        artifacts = summary.artifacts.len(),
        "Wrote artifacts to {}",
        config.output.dir.display()
    );

    Ok(())
}
