// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration
//!
//! Every option can be given on the command line or through the environment
//! (a `.env` file is honoured by the binary). Defaults reproduce the
//! development setup: `127.0.0.1:5000`, `./mixmodel.onnx`, `./mix_coco.json`,
//! `./uploads` and `./results`.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Minimum score a prediction must exceed to be kept
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.8;

/// Side length of the square frame the detector sees and the annotated image is drawn in
pub const DEFAULT_IMAGE_SIZE: u32 = 512;

/// Maximum accepted request body (16MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// BioLuminescence detection service
#[derive(Parser, Debug, Clone)]
#[command(name = "biolum-detector")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Species detection service for uploaded images", long_about = None)]
pub struct ServiceConfig {
    /// Interface to bind the HTTP server to
    #[arg(long, env = "BIND_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// HTTP port
    #[arg(long, env = "API_PORT", default_value_t = 5000)]
    pub port: u16,

    /// ONNX export of the trained detector
    #[arg(long, env = "MODEL_WEIGHTS_PATH", default_value = "./mixmodel.onnx")]
    pub model_path: PathBuf,

    /// COCO annotations file whose `categories` define the class map
    #[arg(long, env = "ANNOTATIONS_FILE_PATH", default_value = "./mix_coco.json")]
    pub annotations_path: PathBuf,

    /// Directory for temporary uploads
    #[arg(long, env = "UPLOAD_FOLDER", default_value = "./uploads")]
    pub uploads_dir: PathBuf,

    /// Directory annotated results are persisted to
    #[arg(long, env = "RESULTS_FOLDER", default_value = "./results")]
    pub results_dir: PathBuf,

    /// Minimum score (exclusive) for a prediction to become a detection
    #[arg(long, env = "CONFIDENCE_THRESHOLD", default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    pub confidence_threshold: f32,

    /// Detector input size (square)
    #[arg(long, env = "IMAGE_SIZE", default_value_t = DEFAULT_IMAGE_SIZE)]
    pub image_size: u32,

    /// TrueType/OpenType font for box labels, replacing the bundled DejaVu Sans
    #[arg(long, env = "LABEL_FONT_PATH")]
    pub font_path: Option<PathBuf>,

    /// Skip the CUDA execution provider
    #[arg(long, env = "FORCE_CPU")]
    pub force_cpu: bool,

    /// Maximum request body size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            model_path: PathBuf::from("./mixmodel.onnx"),
            annotations_path: PathBuf::from("./mix_coco.json"),
            uploads_dir: PathBuf::from("./uploads"),
            results_dir: PathBuf::from("./results"),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            image_size: DEFAULT_IMAGE_SIZE,
            font_path: None,
            force_cpu: false,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServiceConfig {
    /// Socket address the server listens on
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    /// Confidence threshold clamped to [0, 1]
    pub fn threshold(&self) -> f32 {
        self.confidence_threshold.clamp(0.0, 1.0)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.confidence_threshold.is_finite() {
            return Err(anyhow!(
                "confidence_threshold must be a finite number, got {}",
                self.confidence_threshold
            ));
        }
        if self.image_size == 0 {
            return Err(anyhow!("image_size must be greater than zero"));
        }
        if self.max_upload_bytes == 0 {
            return Err(anyhow!("max_upload_bytes must be greater than zero"));
        }
        self.listen_addr()?;
        Ok(())
    }
}
