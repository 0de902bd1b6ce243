// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Species detection model (ONNX export of a Faster R-CNN detector)
//!
//! The exported graph takes a normalized `[1, 3, H, W]` tensor and returns
//! three parallel outputs: `boxes [N, 4]` (x1, y1, x2, y2 in input pixels),
//! `labels [N]` (int64, 0 = background) and `scores [N]`.

use anyhow::{anyhow, Context, Result};
use ndarray::Array4;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Parallel arrays produced by one forward pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPredictions {
    /// [x1, y1, x2, y2] in preprocessed image space
    pub boxes: Vec<[f32; 4]>,
    pub labels: Vec<i64>,
    pub scores: Vec<f32>,
}

impl RawPredictions {
    /// Build a prediction set, rejecting arrays of different lengths
    pub fn new(boxes: Vec<[f32; 4]>, labels: Vec<i64>, scores: Vec<f32>) -> Result<Self> {
        if boxes.len() != labels.len() || labels.len() != scores.len() {
            anyhow::bail!(
                "Prediction arrays differ in length: {} boxes, {} labels, {} scores",
                boxes.len(),
                labels.len(),
                scores.len()
            );
        }
        Ok(Self {
            boxes,
            labels,
            scores,
        })
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Iterate (box, label, score) triples
    pub fn iter(&self) -> impl Iterator<Item = ([f32; 4], i64, f32)> + '_ {
        self.boxes
            .iter()
            .zip(self.labels.iter())
            .zip(self.scores.iter())
            .map(|((bbox, label), score)| (*bbox, *label, *score))
    }
}

/// Where the forward pass executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    Cuda,
    Cpu,
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Cuda => write!(f, "cuda"),
            ComputeDevice::Cpu => write!(f, "cpu"),
        }
    }
}

/// A forward pass over one preprocessed image
///
/// Implementations run synchronously; callers on the async runtime move the
/// call onto the blocking pool.
pub trait Detector: Send + Sync {
    /// Run the network on a `[1, 3, H, W]` tensor
    fn predict(&self, input: &Array4<f32>) -> Result<RawPredictions>;

    /// Device the detector executes on
    fn device(&self) -> ComputeDevice {
        ComputeDevice::Cpu
    }
}

/// ONNX Runtime backed detector
#[derive(Clone)]
pub struct OnnxDetector {
    /// ONNX Runtime session (one forward pass at a time)
    session: Arc<Mutex<Session>>,
    input_name: String,
    boxes_output: String,
    labels_output: String,
    scores_output: String,
    /// Classification head width (classes + background)
    num_labels: usize,
    device: ComputeDevice,
}

impl fmt::Debug for OnnxDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxDetector")
            .field("input_name", &self.input_name)
            .field("boxes_output", &self.boxes_output)
            .field("labels_output", &self.labels_output)
            .field("scores_output", &self.scores_output)
            .field("num_labels", &self.num_labels)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl OnnxDetector {
    /// Load the detector from an ONNX file
    ///
    /// # Arguments
    /// - `model_path`: exported detector weights
    /// - `num_classes`: foreground classes in the class map; the head is
    ///   expected to have `num_classes + 1` outputs (background reserved)
    /// - `force_cpu`: skip the CUDA execution provider
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime initialization fails
    /// - The graph exposes fewer than three outputs
    pub fn new<P: AsRef<Path>>(model_path: P, num_classes: usize, force_cpu: bool) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Detection model not found: {}", model_path.display());
        }

        info!("Loading detection model from {}", model_path.display());

        let (session, device) = if force_cpu {
            (Self::cpu_session(model_path)?, ComputeDevice::Cpu)
        } else {
            match Self::cuda_session(model_path) {
                Ok(session) => {
                    info!("✅ CUDA execution provider initialized");
                    (session, ComputeDevice::Cuda)
                }
                Err(e) => {
                    warn!("⚠️  CUDA execution provider failed: {}", e);
                    warn!("   Falling back to CPU execution provider");
                    (Self::cpu_session(model_path)?, ComputeDevice::Cpu)
                }
            }
        };

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();
        if output_names.len() < 3 {
            anyhow::bail!(
                "Detection model must expose boxes, labels and scores outputs, found {:?}",
                output_names
            );
        }

        // Prefer the torchvision export names, fall back to output order
        let pick = |wanted: &str, index: usize| {
            output_names
                .iter()
                .find(|name| name.as_str() == wanted)
                .cloned()
                .unwrap_or_else(|| output_names[index].clone())
        };
        let boxes_output = pick("boxes", 0);
        let labels_output = pick("labels", 1);
        let scores_output = pick("scores", 2);

        debug!(
            "Detection model loaded - input: {}, outputs: {} / {} / {}",
            input_name, boxes_output, labels_output, scores_output
        );

        info!(
            "✅ Detection model loaded ({} classes + background, device: {})",
            num_classes, device
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            boxes_output,
            labels_output,
            scores_output,
            num_labels: num_classes + 1,
            device,
        })
    }

    fn cuda_session(model_path: &Path) -> Result<Session> {
        Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CUDAExecutionProvider::default().build().error_on_failure()])
            .context("Failed to set CUDA execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load detection model from {}",
                model_path.display()
            ))
    }

    fn cpu_session(model_path: &Path) -> Result<Session> {
        Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load detection model from {}",
                model_path.display()
            ))
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }
}

impl Detector for OnnxDetector {
    fn predict(&self, input: &Array4<f32>) -> Result<RawPredictions> {
        let shape = input.shape();
        if shape[0] != 1 || shape[1] != 3 {
            anyhow::bail!("Invalid input shape: {:?}, expected [1, 3, H, W]", shape);
        }

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("Detection session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .context("Detection inference failed")?;

        let boxes_tensor = outputs[self.boxes_output.as_str()]
            .try_extract_array::<f32>()
            .context("Failed to extract boxes tensor")?;
        let labels_tensor = outputs[self.labels_output.as_str()]
            .try_extract_array::<i64>()
            .context("Failed to extract labels tensor")?;
        let scores_tensor = outputs[self.scores_output.as_str()]
            .try_extract_array::<f32>()
            .context("Failed to extract scores tensor")?;

        let box_shape = boxes_tensor.shape();
        if box_shape.last().copied() != Some(4) && !boxes_tensor.is_empty() {
            anyhow::bail!("Unexpected boxes shape: {:?}", box_shape);
        }

        let flat: Vec<f32> = boxes_tensor.iter().copied().collect();
        let boxes: Vec<[f32; 4]> = flat
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();
        let labels: Vec<i64> = labels_tensor.iter().copied().collect();
        let scores: Vec<f32> = scores_tensor.iter().copied().collect();

        let out_of_head = labels
            .iter()
            .filter(|&&label| label < 0 || label as usize >= self.num_labels)
            .count();
        if out_of_head > 0 {
            warn!(
                "{} predictions carry labels outside the {}-wide classification head",
                out_of_head, self.num_labels
            );
        }

        debug!("Detector returned {} raw predictions", scores.len());

        RawPredictions::new(boxes, labels, scores)
    }

    fn device(&self) -> ComputeDevice {
        self.device
    }
}
