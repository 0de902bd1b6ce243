// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod artifacts;

// Re-export main types for convenience
pub use artifacts::{ArtifactStore, RESULT_PREFIX, UPLOAD_EXTENSION};
