// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Species detection: class map, detector, annotation and per-species counts

pub mod annotate;
pub mod class_map;
pub mod model;
pub mod palette;
pub mod pipeline;
pub mod preprocessing;
pub mod summary;

pub use annotate::{bundled_font, load_font, AnnotateError, Annotation, Annotator, Detection};
pub use class_map::{ClassMap, ClassMapError};
pub use model::{ComputeDevice, Detector, OnnxDetector, RawPredictions};
pub use palette::{color_for_label, PaletteColor, PALETTE};
pub use pipeline::{DetectionOutcome, DetectionPipeline};
pub use preprocessing::{PreprocessedImage, Preprocessor};
pub use summary::{SpeciesCount, SpeciesSummary};
