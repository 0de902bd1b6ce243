// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing for the detection service
//!
//! This module provides:
//! - Species detection (Faster R-CNN exported to ONNX) and box annotation
//! - Image decode/encode helpers
//! - The detection service context shared by request handlers

pub mod detection;
pub mod image_utils;
pub mod model_manager;

pub use detection::{
    Annotator, ClassMap, ComputeDevice, Detection, DetectionOutcome, DetectionPipeline, Detector,
    SpeciesCount, SpeciesSummary,
};
pub use image_utils::{decode_image_bytes, detect_format, encode_jpeg, jpeg_data_url, ImageError, ImageInfo};
pub use model_manager::{DetectionModelConfig, DetectionModelInfo, DetectionService};
