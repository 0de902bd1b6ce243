// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the species detector

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use ndarray::Array4;

use crate::config::DEFAULT_IMAGE_SIZE;

/// Mean values for normalization (ImageNet)
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Std values for normalization (ImageNet)
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Output of preprocessing: the network input and the frame boxes refer to
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    /// Normalized NCHW tensor [1, 3, size, size]
    pub tensor: Array4<f32>,
    /// The resized RGB frame (annotation target)
    pub resized: RgbImage,
}

/// Resizes arbitrary RGB input to the square detector frame and normalizes it
///
/// The resize is a plain stretch: aspect ratio is not preserved and no padding
/// is added, so every returned box lives in `size x size` space.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    size: u32,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_SIZE)
    }
}

impl Preprocessor {
    pub fn new(size: u32) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Stretch the image to `size x size` RGB
    pub fn resize(&self, image: &DynamicImage) -> RgbImage {
        image
            .resize_exact(self.size, self.size, FilterType::Triangle)
            .to_rgb8()
    }

    /// Normalize: (pixel / 255.0 - mean) / std, laid out as [1, 3, H, W]
    pub fn to_tensor(&self, rgb: &RgbImage) -> Array4<f32> {
        let (width, height) = rgb.dimensions();
        let mut tensor = Array4::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
            }
        }

        tensor
    }

    pub fn preprocess(&self, image: &DynamicImage) -> PreprocessedImage {
        let resized = self.resize(image);
        let tensor = self.to_tensor(&resized);
        PreprocessedImage { tensor, resized }
    }
}
