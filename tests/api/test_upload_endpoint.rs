// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Upload endpoint tests
//!
//! Drives POST /upload through the router with a stub detector so the full
//! request path runs without model weights:
//! - multipart validation (400s)
//! - successful detection response shape and counts
//! - artifact lifecycle (upload removed, result kept)
//! - 500s for a missing model and for undecodable images

use anyhow::Result;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use biolum_detector::api::{create_app, AppState, ErrorResponse, UploadResponse};
use biolum_detector::config::DEFAULT_MAX_UPLOAD_BYTES;
use biolum_detector::storage::ArtifactStore;
use biolum_detector::vision::detection::{Annotator, ClassMap, RawPredictions};
use biolum_detector::vision::{DetectionService, Detector};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::Array4;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`

const BOUNDARY: &str = "----biolumtestboundary7MA4YWxk";

/// Two Mycena, one Panellus, one low-confidence prediction
struct StubDetector;

impl Detector for StubDetector {
    fn predict(&self, input: &Array4<f32>) -> Result<RawPredictions> {
        assert_eq!(input.shape(), &[1, 3, 512, 512]);
        RawPredictions::new(
            vec![
                [10.0, 20.0, 110.0, 140.0],
                [200.5, 210.2, 300.9, 330.0],
                [400.0, 50.0, 520.0, 180.0],
                [60.0, 300.0, 90.0, 350.0],
            ],
            vec![1, 1, 2, 2],
            vec![0.97, 0.91, 0.88, 0.42],
        )
    }
}

fn stub_service() -> DetectionService {
    DetectionService::from_parts(
        "stub",
        Arc::new(StubDetector),
        ClassMap::from_pairs([(1, "Mycena chlorophos"), (2, "Panellus stipticus")]),
        Annotator::new(0.8),
        512,
    )
}

async fn setup(dir: &TempDir, with_model: bool) -> (AppState, Router) {
    let store = ArtifactStore::new(dir.path().join("uploads"), dir.path().join("results"))
        .await
        .unwrap();
    let state = AppState::new(store);
    if with_model {
        state.set_detection_service(Arc::new(stub_service())).await;
    } else {
        state
            .set_startup_error("Detection model not found: ./mixmodel.onnx")
            .await;
    }
    let app = create_app(state.clone(), DEFAULT_MAX_UPLOAD_BYTES);
    (state, app)
}

fn sample_png() -> Vec<u8> {
    let img = RgbImage::from_fn(300, 200, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut buffer = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

fn multipart_body(field: &str, file_name: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    match file_name {
        Some(name) => body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                field, name
            )
            .as_bytes(),
        ),
        None => body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", field).as_bytes(),
        ),
    }
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn read_body(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

fn dir_entries(path: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(path)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect()
}

#[tokio::test]
async fn test_upload_success_response() {
    let dir = TempDir::new().unwrap();
    let (_state, app) = setup(&dir, true).await;

    let body = multipart_body("file", Some("glow.png"), &sample_png());
    let response = app.oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = read_body(response).await;
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    for key in [
        "success",
        "image",
        "detections",
        "total_count",
        "unique_species",
        "species_summary",
        "file_id",
    ] {
        assert!(json.get(key).is_some(), "missing key {}", key);
    }

    let upload: UploadResponse = serde_json::from_slice(&bytes).unwrap();
    assert!(upload.success);
    assert!(upload.image.starts_with("data:image/jpeg;base64,"));
    assert!(uuid::Uuid::parse_str(&upload.file_id).is_ok());

    assert_eq!(upload.total_count, 3);
    assert_eq!(upload.unique_species, 2);
    assert_eq!(upload.detections.len(), 3);

    assert_eq!(upload.species_summary[0].species, "Mycena chlorophos");
    assert_eq!(upload.species_summary[0].count, 2);
    assert_eq!(upload.species_summary[0].percentage, 66.7);
    assert_eq!(upload.species_summary[1].species, "Panellus stipticus");
    assert_eq!(upload.species_summary[1].percentage, 33.3);
}

#[tokio::test]
async fn test_upload_detections_within_frame_and_threshold() {
    let dir = TempDir::new().unwrap();
    let (_state, app) = setup(&dir, true).await;

    let body = multipart_body("file", Some("glow.png"), &sample_png());
    let response = app.oneshot(upload_request(body)).await.unwrap();
    let upload: UploadResponse = serde_json::from_slice(&read_body(response).await).unwrap();

    for detection in &upload.detections {
        assert!(detection.confidence > 0.8);
        for coordinate in detection.bbox {
            assert!((0..=512).contains(&coordinate), "bbox {:?}", detection.bbox);
        }
    }
    // Truncated, and x2 clamped to the frame
    assert_eq!(upload.detections[1].bbox, [200, 210, 300, 330]);
    assert_eq!(upload.detections[2].bbox, [400, 50, 512, 180]);
}

#[tokio::test]
async fn test_upload_artifacts() {
    let dir = TempDir::new().unwrap();
    let (state, app) = setup(&dir, true).await;

    let body = multipart_body("file", Some("glow.png"), &sample_png());
    let response = app.oneshot(upload_request(body)).await.unwrap();
    let upload: UploadResponse = serde_json::from_slice(&read_body(response).await).unwrap();

    // Temporary upload removed
    assert!(dir_entries(state.store.uploads_dir()).is_empty());

    // Result persisted as a 512x512 JPEG
    let result_path = state.store.result_path(&upload.file_id);
    assert!(result_path.ends_with(format!("result_{}.jpg", upload.file_id)));
    let result = image::open(&result_path).unwrap();
    assert_eq!((result.width(), result.height()), (512, 512));
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let dir = TempDir::new().unwrap();
    let (_state, app) = setup(&dir, true).await;

    let body = multipart_body("image", Some("glow.png"), &sample_png());
    let response = app.oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_slice(&read_body(response).await).unwrap();
    assert_eq!(error.error, "No file provided");
}

#[tokio::test]
async fn test_upload_file_field_without_filename() {
    let dir = TempDir::new().unwrap();
    let (_state, app) = setup(&dir, true).await;

    let body = multipart_body("file", None, b"just text");
    let response = app.oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_slice(&read_body(response).await).unwrap();
    assert_eq!(error.error, "No file provided");
}

#[tokio::test]
async fn test_upload_empty_filename() {
    let dir = TempDir::new().unwrap();
    let (_state, app) = setup(&dir, true).await;

    let body = multipart_body("file", Some(""), b"");
    let response = app.oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_slice(&read_body(response).await).unwrap();
    assert_eq!(error.error, "No file selected");
}

#[tokio::test]
async fn test_upload_non_multipart_body() {
    let dir = TempDir::new().unwrap();
    let (_state, app) = setup(&dir, true).await;

    let request = Request::builder()
        .method("POST")
        .uri("/upload")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"file": "glow.png"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_slice(&read_body(response).await).unwrap();
    assert_eq!(error.error, "No file provided");
}

#[tokio::test]
async fn test_upload_without_model() {
    let dir = TempDir::new().unwrap();
    let (state, app) = setup(&dir, false).await;

    let body = multipart_body("file", Some("glow.png"), &sample_png());
    let response = app.oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let error: ErrorResponse = serde_json::from_slice(&read_body(response).await).unwrap();
    assert_eq!(
        error.error,
        "Detection model not loaded: Detection model not found: ./mixmodel.onnx"
    );
    assert!(dir_entries(state.store.uploads_dir()).is_empty());
}

#[tokio::test]
async fn test_upload_corrupt_image() {
    let dir = TempDir::new().unwrap();
    let (state, app) = setup(&dir, true).await;

    let body = multipart_body("file", Some("broken.jpg"), b"\xFF\xD8\xFFnot really a jpeg");
    let response = app.oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let error: ErrorResponse = serde_json::from_slice(&read_body(response).await).unwrap();
    assert!(
        error.error.contains("Failed to load uploaded image"),
        "unexpected error: {}",
        error.error
    );

    // Removed on the failure path too; nothing persisted
    assert!(dir_entries(state.store.uploads_dir()).is_empty());
    assert!(dir_entries(state.store.results_dir()).is_empty());
}

#[tokio::test]
async fn test_concurrent_uploads_use_distinct_ids() {
    let dir = TempDir::new().unwrap();
    let (state, app) = setup(&dir, true).await;

    let first = app
        .clone()
        .oneshot(upload_request(multipart_body("file", Some("a.png"), &sample_png())));
    let second = app.oneshot(upload_request(multipart_body("file", Some("b.png"), &sample_png())));
    let (first, second) = tokio::join!(first, second);

    let first: UploadResponse =
        serde_json::from_slice(&read_body(first.unwrap()).await).unwrap();
    let second: UploadResponse =
        serde_json::from_slice(&read_body(second.unwrap()).await).unwrap();

    assert_ne!(first.file_id, second.file_id);
    assert_eq!(dir_entries(state.store.results_dir()).len(), 2);
}
