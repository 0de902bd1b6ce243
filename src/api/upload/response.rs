// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload response types

use serde::{Deserialize, Serialize};

use crate::vision::image_utils::jpeg_data_url;
use crate::vision::{Detection, DetectionOutcome, SpeciesCount};

/// Response for POST /upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    pub success: bool,
    /// `data:image/jpeg;base64,...` of the annotated frame
    pub image: String,
    pub detections: Vec<Detection>,
    pub total_count: usize,
    pub unique_species: usize,
    pub species_summary: Vec<SpeciesCount>,
    /// Identifier the upload and result files were stored under
    pub file_id: String,
}

impl UploadResponse {
    pub fn new(file_id: &str, annotated_jpeg: &[u8], outcome: DetectionOutcome) -> Self {
        Self {
            success: true,
            image: jpeg_data_url(annotated_jpeg),
            detections: outcome.detections,
            total_count: outcome.summary.total_count,
            unique_species: outcome.summary.unique_species,
            species_summary: outcome.summary.species,
            file_id: file_id.to_string(),
        }
    }
}
