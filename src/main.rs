// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use biolum_detector::{
    api::{create_app, start_server, AppState},
    config::ServiceConfig,
    storage::ArtifactStore,
    version,
    vision::{DetectionModelConfig, DetectionService},
};
use clap::Parser;
use std::{env, sync::Arc};
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting {}...\n", version::get_version_string());
    println!("📦 BUILD VERSION: {}", version::VERSION);
    println!();

    let config = ServiceConfig::parse();
    config.validate()?;
    let addr = config.listen_addr()?;

    let store = ArtifactStore::new(&config.uploads_dir, &config.results_dir).await?;
    let state = AppState::new(store);

    println!("🧠 Loading detection model...");
    println!("   Weights:     {}", config.model_path.display());
    println!("   Annotations: {}", config.annotations_path.display());

    match DetectionService::new(DetectionModelConfig::from(&config)).await {
        Ok(service) => {
            let info = service.info().clone();
            state.set_detection_service(Arc::new(service)).await;
            println!("✅ Detection model loaded");
            println!("   Classes:   {}", info.num_classes);
            println!("   Device:    {}", info.device);
            println!("   Threshold: {}", info.confidence_threshold);
        }
        Err(e) => {
            // Health check stays up; uploads answer 500 with the reason
            error!("Failed to load detection model: {:#}", e);
            eprintln!("❌ Detection model not loaded: {:#}", e);
            eprintln!("   Only /health will succeed until the service is restarted.");
            state.set_startup_error(format!("{:#}", e)).await;
        }
    }

    let app = create_app(state, config.max_upload_bytes);

    let separator = "=".repeat(60);
    println!("\n{}", separator);
    println!("API Endpoints:");
    println!("  Health:       http://{}/health", addr);
    println!("  Upload:       POST http://{}/upload", addr);
    println!("\nTest with curl:");
    println!("  curl -X POST -F 'file=@sample.jpg' http://{}/upload", addr);
    println!("\nPress Ctrl+C to shutdown...");
    println!("{}\n", separator);

    start_server(addr, app).await?;

    println!("👋 Goodbye!");
    Ok(())
}
