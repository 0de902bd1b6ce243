// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload endpoint handler

use anyhow::Context;
use axum::{body::Bytes, extract::State, Json};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::response::UploadResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::image_utils::encode_jpeg;
use crate::vision::DetectionService;

/// Multipart field carrying the image
pub const FILE_FIELD: &str = "file";

/// POST /upload - Detect and count species in an uploaded image
///
/// # Request
/// multipart/form-data with the image in the `file` field.
///
/// # Response
/// - `image`: annotated 512x512 frame as a JPEG data URL
/// - `detections`: accepted detections (`class_name`, `confidence`, `bbox`)
/// - `total_count`, `unique_species`, `species_summary`
/// - `file_id`: identifier the artifacts were stored under
///
/// # Errors
/// - 400 Bad Request: no `file` part, or an empty filename
/// - 500 Internal Server Error: model not loaded, or any processing failure
pub async fn upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let start = Instant::now();
    debug!("Upload request received");

    // 1. Validate request
    let mut multipart = multipart.map_err(|e| {
        warn!("Upload rejected, not a multipart body: {}", e);
        ApiError::NoFileProvided
    })?;
    let (file_name, bytes) = read_file_field(&mut multipart).await.map_err(|e| {
        warn!("Upload validation failed: {}", e);
        e
    })?;

    // 2. Detection service
    let service = state.detection_service().await?;

    // 3. Persist, process, clean up
    let file_id = Uuid::new_v4().to_string();
    debug!(
        "Upload {} accepted: {} ({} bytes)",
        file_id,
        file_name,
        bytes.len()
    );
    state.store.save_upload(&file_id, &bytes).await?;

    let result = process_upload(&state, &service, &file_id).await;

    if let Err(e) = state.store.remove_upload(&file_id).await {
        warn!("Failed to remove upload {}: {:#}", file_id, e);
    }

    let response = result.map_err(|e| {
        error!("Upload {} failed: {:#}", file_id, e);
        ApiError::from(e)
    })?;

    info!(
        "Upload {} complete: {} detections, {} species, {}ms",
        file_id,
        response.total_count,
        response.unique_species,
        start.elapsed().as_millis()
    );

    Ok(Json(response))
}

/// Find the `file` part; parts without a filename are form fields, not files
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = match field.file_name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        if file_name.is_empty() {
            return Err(ApiError::NoFileSelected);
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to read file: {}", e)))?;
        return Ok((file_name, data));
    }

    Err(ApiError::NoFileProvided)
}

async fn process_upload(
    state: &AppState,
    service: &DetectionService,
    file_id: &str,
) -> anyhow::Result<UploadResponse> {
    let bytes = state.store.read_upload(file_id).await?;
    let outcome = service.detect(bytes).await?;

    let jpeg = encode_jpeg(&outcome.annotated).context("Failed to encode annotated image")?;
    state.store.save_result(file_id, &jpeg).await?;

    Ok(UploadResponse::new(file_id, &jpeg, outcome))
}
