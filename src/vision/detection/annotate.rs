// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Drawing accepted detections onto the resized frame
//!
//! Each accepted prediction gets a 3px box in its palette color, four 4px
//! corner accents with 10px legs, and a `<name>: <score>` label on a 70%
//! black backing.

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use super::class_map::ClassMap;
use super::model::RawPredictions;
use super::palette::color_for_label;

pub const BOX_THICKNESS: i32 = 3;
pub const CORNER_LENGTH: i32 = 10;
pub const CORNER_THICKNESS: i32 = 4;
pub const LABEL_PADDING: i32 = 5;
/// Label sits this far above the box top...
pub const LABEL_OFFSET: i32 = 10;
/// ...but never closer than this to the top edge
pub const LABEL_MIN_Y: i32 = 20;
pub const LABEL_BACKGROUND_ALPHA: f32 = 0.7;
pub const LABEL_FONT_SIZE: f32 = 20.0;

const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// DejaVu Sans, used for labels unless another font is configured
pub const BUNDLED_FONT: &[u8] = include_bytes!("../../../fonts/DejaVuSans.ttf");

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("Font file not found: {0}")]
    FontNotFound(String),

    #[error("Failed to read font file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid font data in {0}")]
    InvalidFont(String),
}

/// One accepted prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    /// Score in [0, 1], strictly above the configured threshold
    pub confidence: f32,
    /// [x1, y1, x2, y2] in resized-frame pixels
    pub bbox: [i32; 4],
}

/// Annotated frame plus the detections drawn on it
#[derive(Debug, Clone)]
pub struct Annotation {
    pub image: RgbImage,
    pub detections: Vec<Detection>,
}

/// Load a TrueType/OpenType font for box labels
pub fn load_font<P: AsRef<Path>>(path: P) -> Result<FontVec, AnnotateError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AnnotateError::FontNotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path).map_err(|source| AnnotateError::Io {
        path: path.display().to_string(),
        source,
    })?;
    FontVec::try_from_vec(bytes).map_err(|_| AnnotateError::InvalidFont(path.display().to_string()))
}

/// Parse the font compiled into the binary
pub fn bundled_font() -> Result<FontVec, AnnotateError> {
    FontVec::try_from_vec(BUNDLED_FONT.to_vec())
        .map_err(|_| AnnotateError::InvalidFont("bundled DejaVuSans.ttf".to_string()))
}

#[derive(Clone)]
pub struct Annotator {
    threshold: f32,
    /// Only absent if the bundled font fails to parse; backings are still drawn
    font: Option<Arc<FontVec>>,
}

impl fmt::Debug for Annotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Annotator")
            .field("threshold", &self.threshold)
            .field("has_font", &self.font.is_some())
            .finish()
    }
}

impl Annotator {
    /// Annotator labelling with the bundled font
    pub fn new(threshold: f32) -> Self {
        let font = match bundled_font() {
            Ok(font) => Some(Arc::new(font)),
            Err(e) => {
                warn!("⚠️ {}; labels will be drawn without text", e);
                None
            }
        };
        Self { threshold, font }
    }

    /// Replace the bundled font
    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(Arc::new(font));
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw every prediction scoring above the threshold onto a copy of `frame`
    ///
    /// Predictions at or below the threshold are dropped without a trace.
    pub fn annotate(
        &self,
        frame: &RgbImage,
        predictions: &RawPredictions,
        class_map: &ClassMap,
    ) -> Annotation {
        let mut canvas = frame.clone();
        let (width, height) = canvas.dimensions();
        let mut detections = Vec::new();

        for (raw_box, label, score) in predictions.iter() {
            // NaN scores fail this comparison too
            if !(score > self.threshold) {
                continue;
            }

            let class_name = class_map.resolve(label);
            let color = color_for_label(label).rgb();
            let bbox = pixel_box(raw_box, width, height);

            draw_box(&mut canvas, bbox, color);
            draw_corner_markers(&mut canvas, bbox, color);

            let text = format!("{}: {:.2}", class_name, score);
            let anchor = (bbox[0], (bbox[1] - LABEL_OFFSET).max(LABEL_MIN_Y));
            self.draw_label(&mut canvas, &text, anchor);

            detections.push(Detection {
                class_name,
                confidence: score,
                bbox,
            });
        }

        Annotation {
            image: canvas,
            detections,
        }
    }

    /// Text extent in pixels at the label font size
    fn measure(&self, text: &str) -> (u32, u32) {
        match &self.font {
            Some(font) => text_size(PxScale::from(LABEL_FONT_SIZE), &**font, text),
            None => {
                let chars = text.chars().count() as f32;
                (
                    (chars * LABEL_FONT_SIZE * 0.5).round() as u32,
                    (LABEL_FONT_SIZE * 0.75).round() as u32,
                )
            }
        }
    }

    /// `anchor` is the bottom-left of the text, like a baseline origin
    fn draw_label(&self, canvas: &mut RgbImage, text: &str, anchor: (i32, i32)) {
        let (text_w, text_h) = self.measure(text);
        let (x, y) = anchor;

        darken_region(
            canvas,
            (x - LABEL_PADDING, y - text_h as i32 - LABEL_PADDING),
            (x + text_w as i32 + LABEL_PADDING, y + LABEL_PADDING),
            LABEL_BACKGROUND_ALPHA,
        );

        if let Some(font) = &self.font {
            // draw_text_mut takes the top of the line box; put the baseline on `y`
            let scale = PxScale::from(LABEL_FONT_SIZE);
            let ascent = font.as_scaled(scale).ascent().round() as i32;
            draw_text_mut(canvas, LABEL_TEXT_COLOR, x, y - ascent, scale, &**font, text);
        }
    }
}

/// Truncate to integer pixels and clamp into the frame
fn pixel_box(raw: [f32; 4], width: u32, height: u32) -> [i32; 4] {
    let w = width as i32;
    let h = height as i32;
    [
        (raw[0] as i32).clamp(0, w),
        (raw[1] as i32).clamp(0, h),
        (raw[2] as i32).clamp(0, w),
        (raw[3] as i32).clamp(0, h),
    ]
}

/// Hollow rectangle, `BOX_THICKNESS` wide, centred on the box outline
fn draw_box(canvas: &mut RgbImage, bbox: [i32; 4], color: Rgb<u8>) {
    let [x1, y1, x2, y2] = bbox;
    let half = BOX_THICKNESS / 2;
    for offset in -half..=half {
        let (left, top, right, bottom) = (x1 - offset, y1 - offset, x2 + offset, y2 + offset);
        if right < left || bottom < top {
            continue;
        }
        let rect = Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

fn draw_corner_markers(canvas: &mut RgbImage, bbox: [i32; 4], color: Rgb<u8>) {
    let [x1, y1, x2, y2] = bbox;
    let legs = [
        // Top-left
        ((x1, y1), (x1 + CORNER_LENGTH, y1)),
        ((x1, y1), (x1, y1 + CORNER_LENGTH)),
        // Top-right
        ((x2, y1), (x2 - CORNER_LENGTH, y1)),
        ((x2, y1), (x2, y1 + CORNER_LENGTH)),
        // Bottom-left
        ((x1, y2), (x1 + CORNER_LENGTH, y2)),
        ((x1, y2), (x1, y2 - CORNER_LENGTH)),
        // Bottom-right
        ((x2, y2), (x2 - CORNER_LENGTH, y2)),
        ((x2, y2), (x2, y2 - CORNER_LENGTH)),
    ];
    for (from, to) in legs {
        draw_leg(canvas, from, to, color);
    }
}

/// Axis-aligned segment `CORNER_THICKNESS` wide
fn draw_leg(canvas: &mut RgbImage, from: (i32, i32), to: (i32, i32), color: Rgb<u8>) {
    let half = CORNER_THICKNESS / 2;
    let left = from.0.min(to.0) - half;
    let top = from.1.min(to.1) - half;
    let width = (from.0 - to.0).unsigned_abs() + CORNER_THICKNESS as u32;
    let height = (from.1 - to.1).unsigned_abs() + CORNER_THICKNESS as u32;
    draw_filled_rect_mut(canvas, Rect::at(left, top).of_size(width, height), color);
}

/// Blend black over the inclusive region: pixel = alpha * 0 + (1 - alpha) * pixel
fn darken_region(canvas: &mut RgbImage, top_left: (i32, i32), bottom_right: (i32, i32), alpha: f32) {
    let (width, height) = canvas.dimensions();
    let x0 = top_left.0.max(0);
    let y0 = top_left.1.max(0);
    let x1 = bottom_right.0.min(width as i32 - 1);
    let y1 = bottom_right.1.min(height as i32 - 1);
    if x0 > x1 || y0 > y1 {
        return;
    }

    let keep = 1.0 - alpha;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let pixel = canvas.get_pixel_mut(x as u32, y as u32);
            for channel in pixel.0.iter_mut() {
                *channel = (*channel as f32 * keep).round() as u8;
            }
        }
    }
}
