// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod storage;
pub mod version;
pub mod vision;

// Re-export main types
pub use api::{create_app, start_server, ApiError, AppState, UploadResponse};
pub use config::ServiceConfig;
pub use storage::ArtifactStore;
pub use vision::{
    ClassMap, Detection, DetectionModelConfig, DetectionOutcome, DetectionService, Detector,
    SpeciesCount, SpeciesSummary,
};
