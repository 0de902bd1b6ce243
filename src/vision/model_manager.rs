// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection service context: class map, detector and annotator loaded once at
//! startup and shared by every request

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ServiceConfig, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IMAGE_SIZE};
use crate::vision::detection::{
    load_font, Annotator, ClassMap, ComputeDevice, DetectionOutcome, DetectionPipeline, Detector,
    OnnxDetector, Preprocessor,
};

/// Configuration for loading the detection model
#[derive(Debug, Clone)]
pub struct DetectionModelConfig {
    /// ONNX export of the detector
    pub model_path: PathBuf,
    /// COCO annotations file defining the class map
    pub annotations_path: PathBuf,
    /// Label font overriding the bundled one
    pub font_path: Option<PathBuf>,
    pub confidence_threshold: f32,
    pub image_size: u32,
    pub force_cpu: bool,
}

impl Default for DetectionModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./mixmodel.onnx"),
            annotations_path: PathBuf::from("./mix_coco.json"),
            font_path: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            image_size: DEFAULT_IMAGE_SIZE,
            force_cpu: false,
        }
    }
}

impl From<&ServiceConfig> for DetectionModelConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            model_path: config.model_path.clone(),
            annotations_path: config.annotations_path.clone(),
            font_path: config.font_path.clone(),
            confidence_threshold: config.threshold(),
            image_size: config.image_size,
            force_cpu: config.force_cpu,
        }
    }
}

/// Information about the loaded detector
#[derive(Debug, Clone, Serialize)]
pub struct DetectionModelInfo {
    /// Model file the detector was loaded from
    pub name: String,
    pub num_classes: usize,
    pub device: ComputeDevice,
    pub image_size: u32,
    pub confidence_threshold: f32,
    /// Whether label text is rendered
    pub has_font: bool,
}

/// Explicitly constructed detection context
///
/// Built once during startup and injected into the HTTP state. Nothing in it
/// changes after construction.
#[derive(Debug, Clone)]
pub struct DetectionService {
    pipeline: Arc<DetectionPipeline>,
    info: DetectionModelInfo,
}

impl DetectionService {
    /// Load the class map, the detector and the label font
    ///
    /// Model loading is CPU heavy, so it runs on the blocking pool.
    ///
    /// # Errors
    /// Returns error if the annotations file or the model file is missing or
    /// malformed. An unusable font override falls back to the bundled font.
    pub async fn new(config: DetectionModelConfig) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::load(config))
            .await
            .context("Detection model loader task failed")?
    }

    fn load(config: DetectionModelConfig) -> Result<Self> {
        let class_map =
            ClassMap::from_coco_file(&config.annotations_path).context("Failed to load class map")?;

        let detector = OnnxDetector::new(&config.model_path, class_map.num_classes(), config.force_cpu)?;

        let mut annotator = Annotator::new(config.confidence_threshold);
        if let Some(path) = &config.font_path {
            match load_font(path) {
                Ok(font) => {
                    info!("✅ Label font loaded from {}", path.display());
                    annotator = annotator.with_font(font);
                }
                Err(e) => warn!("⚠️ {}; using the bundled label font", e),
            }
        }

        let name = config
            .model_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| config.model_path.display().to_string());

        Ok(Self::from_parts(
            name,
            Arc::new(detector),
            class_map,
            annotator,
            config.image_size,
        ))
    }

    /// Assemble a service from already constructed parts
    pub fn from_parts(
        name: impl Into<String>,
        detector: Arc<dyn Detector>,
        class_map: ClassMap,
        annotator: Annotator,
        image_size: u32,
    ) -> Self {
        let preprocessor = Preprocessor::new(image_size);
        let info = DetectionModelInfo {
            name: name.into(),
            num_classes: class_map.num_classes(),
            device: detector.device(),
            image_size: preprocessor.size(),
            confidence_threshold: annotator.threshold(),
            has_font: annotator.has_font(),
        };

        let pipeline = DetectionPipeline::new(detector, Arc::new(class_map), annotator, preprocessor);

        Self {
            pipeline: Arc::new(pipeline),
            info,
        }
    }

    pub fn info(&self) -> &DetectionModelInfo {
        &self.info
    }

    pub fn pipeline(&self) -> &DetectionPipeline {
        &self.pipeline
    }

    /// Run detection on raw image bytes without blocking the async runtime
    pub async fn detect(&self, bytes: Vec<u8>) -> Result<DetectionOutcome> {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || pipeline.process_bytes(&bytes))
            .await
            .context("Detection task failed")?
    }
}
