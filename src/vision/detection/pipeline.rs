// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Decode -> preprocess -> detect -> annotate -> summarize

use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::annotate::{Annotator, Detection};
use super::class_map::ClassMap;
use super::model::{ComputeDevice, Detector};
use super::preprocessing::Preprocessor;
use super::summary::SpeciesSummary;
use crate::vision::image_utils::decode_image_bytes;

/// Everything one upload produces
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    /// Resized frame with boxes and labels drawn on it
    pub annotated: RgbImage,
    pub detections: Vec<Detection>,
    pub summary: SpeciesSummary,
}

/// Read-only after construction; shared across requests
#[derive(Clone)]
pub struct DetectionPipeline {
    preprocessor: Preprocessor,
    detector: Arc<dyn Detector>,
    annotator: Annotator,
    class_map: Arc<ClassMap>,
}

impl std::fmt::Debug for DetectionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionPipeline")
            .field("preprocessor", &self.preprocessor)
            .field("device", &self.detector.device())
            .field("annotator", &self.annotator)
            .field("num_classes", &self.class_map.num_classes())
            .finish()
    }
}

impl DetectionPipeline {
    pub fn new(
        detector: Arc<dyn Detector>,
        class_map: Arc<ClassMap>,
        annotator: Annotator,
        preprocessor: Preprocessor,
    ) -> Self {
        Self {
            preprocessor,
            detector,
            annotator,
            class_map,
        }
    }

    pub fn class_map(&self) -> &ClassMap {
        &self.class_map
    }

    pub fn device(&self) -> ComputeDevice {
        self.detector.device()
    }

    pub fn image_size(&self) -> u32 {
        self.preprocessor.size()
    }

    pub fn threshold(&self) -> f32 {
        self.annotator.threshold()
    }

    /// Run the full pipeline on an already decoded image
    pub fn process(&self, image: &DynamicImage) -> Result<DetectionOutcome> {
        let start = Instant::now();

        let prepared = self.preprocessor.preprocess(image);
        let predictions = self
            .detector
            .predict(&prepared.tensor)
            .context("Model forward pass failed")?;
        debug!(
            "Forward pass produced {} candidates in {:?}",
            predictions.len(),
            start.elapsed()
        );

        let annotation = self
            .annotator
            .annotate(&prepared.resized, &predictions, &self.class_map);
        let summary = SpeciesSummary::from_detections(&annotation.detections);

        info!(
            "Detected {} organisms across {} species in {:?}",
            summary.total_count,
            summary.unique_species,
            start.elapsed()
        );

        Ok(DetectionOutcome {
            annotated: annotation.image,
            detections: annotation.detections,
            summary,
        })
    }

    /// Decode raw upload bytes and run the pipeline on them
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<DetectionOutcome> {
        let (image, info) = decode_image_bytes(bytes).context("Failed to load uploaded image")?;
        debug!(
            "Decoded {:?} upload: {}x{} ({} bytes)",
            info.format, info.width, info.height, info.size_bytes
        );
        self.process(&image)
    }
}
