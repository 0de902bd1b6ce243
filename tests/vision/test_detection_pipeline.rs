// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Detection pipeline tests
//!
//! Run the decode -> preprocess -> detect -> annotate -> summarize chain with
//! scripted detectors and check the output invariants:
//! - every detection is strictly above the threshold
//! - every bbox lies inside the 512x512 frame
//! - same label, same color
//! - empty prediction sets produce an empty summary

use anyhow::Result;
use biolum_detector::vision::detection::{
    color_for_label, Annotator, ClassMap, ComputeDevice, DetectionPipeline, Detector,
    Preprocessor, RawPredictions,
};
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::Array4;
use std::sync::Arc;

/// Returns the same predictions for every input
struct ScriptedDetector {
    predictions: RawPredictions,
}

impl Detector for ScriptedDetector {
    fn predict(&self, _input: &Array4<f32>) -> Result<RawPredictions> {
        Ok(self.predictions.clone())
    }

    fn device(&self) -> ComputeDevice {
        ComputeDevice::Cpu
    }
}

fn pipeline(predictions: RawPredictions, threshold: f32) -> DetectionPipeline {
    DetectionPipeline::new(
        Arc::new(ScriptedDetector { predictions }),
        Arc::new(ClassMap::from_pairs([
            (1, "Mycena chlorophos"),
            (2, "Panellus stipticus"),
            (3, "Omphalotus nidiformis"),
        ])),
        Annotator::new(threshold),
        Preprocessor::default(),
    )
}

/// Deterministic spread of boxes, labels and scores, some outside the frame
fn scattered_predictions(count: usize) -> RawPredictions {
    let mut boxes = Vec::with_capacity(count);
    let mut labels = Vec::with_capacity(count);
    let mut scores = Vec::with_capacity(count);
    for i in 0..count {
        let x = (i as f32 * 37.3) % 600.0 - 40.0;
        let y = (i as f32 * 53.9) % 600.0 - 40.0;
        boxes.push([x, y, x + 80.5, y + 64.25]);
        labels.push((i % 5) as i64);
        scores.push((i as f32 * 0.137) % 1.0);
    }
    RawPredictions::new(boxes, labels, scores).unwrap()
}

fn sample_image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb([120, 90, 60])))
}

#[test]
fn test_detections_respect_threshold_and_frame() {
    let outcome = pipeline(scattered_predictions(60), 0.8)
        .process(&sample_image())
        .unwrap();

    assert!(!outcome.detections.is_empty());
    for detection in &outcome.detections {
        assert!(detection.confidence > 0.8, "{:?}", detection);
        for coordinate in detection.bbox {
            assert!((0..=512).contains(&coordinate), "{:?}", detection);
        }
    }
    assert_eq!(outcome.summary.total_count, outcome.detections.len());
}

#[test]
fn test_annotated_frame_is_resized() {
    let outcome = pipeline(scattered_predictions(10), 0.8)
        .process(&sample_image())
        .unwrap();
    assert_eq!(outcome.annotated.dimensions(), (512, 512));
}

#[test]
fn test_unmapped_labels_use_fallback_name() {
    let predictions = RawPredictions::new(
        vec![[10.0, 40.0, 60.0, 90.0], [100.0, 140.0, 160.0, 190.0]],
        vec![0, 7],
        vec![0.95, 0.9],
    )
    .unwrap();
    let outcome = pipeline(predictions, 0.8).process(&sample_image()).unwrap();

    let names: Vec<&str> = outcome
        .detections
        .iter()
        .map(|d| d.class_name.as_str())
        .collect();
    assert_eq!(names, vec!["ID:0", "ID:7"]);
}

#[test]
fn test_same_label_same_color() {
    let predictions = RawPredictions::new(
        vec![[20.0, 200.0, 120.0, 300.0], [300.0, 200.0, 420.0, 330.0]],
        vec![2, 2],
        vec![0.99, 0.85],
    )
    .unwrap();
    let outcome = pipeline(predictions, 0.8).process(&sample_image()).unwrap();
    let expected = color_for_label(2).rgb();

    // Bottom edge midpoints of both boxes
    assert_eq!(outcome.annotated.get_pixel(70, 300), &expected);
    assert_eq!(outcome.annotated.get_pixel(360, 330), &expected);
}

#[test]
fn test_no_predictions() {
    let outcome = pipeline(RawPredictions::default(), 0.8)
        .process(&sample_image())
        .unwrap();
    assert!(outcome.detections.is_empty());
    assert_eq!(outcome.summary.total_count, 0);
    assert_eq!(outcome.summary.unique_species, 0);
    assert!(outcome.summary.species.is_empty());
}

#[test]
fn test_all_below_threshold() {
    let predictions = RawPredictions::new(
        vec![[10.0, 10.0, 50.0, 50.0]; 3],
        vec![1, 2, 3],
        vec![0.8, 0.5, 0.1],
    )
    .unwrap();
    let outcome = pipeline(predictions, 0.8).process(&sample_image()).unwrap();
    assert!(outcome.detections.is_empty());
    assert_eq!(outcome.summary.total_count, 0);
}

#[test]
fn test_lower_threshold_keeps_more() {
    let strict = pipeline(scattered_predictions(60), 0.8)
        .process(&sample_image())
        .unwrap();
    let relaxed = pipeline(scattered_predictions(60), 0.5)
        .process(&sample_image())
        .unwrap();
    assert!(relaxed.detections.len() > strict.detections.len());
}
