// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the BioLuminescence detection service

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-species-detection-2026-10-19";

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.1.0";

/// Build date
pub const BUILD_DATE: &str = "2026-10-19";

/// Get formatted version string for the startup banner
pub fn get_version_string() -> String {
    format!("BioLuminescence Detector {} ({})", VERSION_NUMBER, BUILD_DATE)
}
