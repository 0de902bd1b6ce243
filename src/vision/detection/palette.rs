// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! High-contrast box colors, chosen to stay visible on light brown substrate

use image::Rgb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaletteColor {
    Cyan,
    Magenta,
    BrightGreen,
    BrightRed,
    BrightBlue,
    BrightYellow,
    SpringGreen,
    Orange,
    Purple,
    HotPink,
    DodgerBlue,
    LimeGreen,
    White,
    Black,
}

/// Palette in label order: label `n` uses `PALETTE[n mod 14]`
pub const PALETTE: [PaletteColor; 14] = [
    PaletteColor::Cyan,
    PaletteColor::Magenta,
    PaletteColor::BrightGreen,
    PaletteColor::BrightRed,
    PaletteColor::BrightBlue,
    PaletteColor::BrightYellow,
    PaletteColor::SpringGreen,
    PaletteColor::Orange,
    PaletteColor::Purple,
    PaletteColor::HotPink,
    PaletteColor::DodgerBlue,
    PaletteColor::LimeGreen,
    PaletteColor::White,
    PaletteColor::Black,
];

impl PaletteColor {
    pub const fn rgb(self) -> Rgb<u8> {
        match self {
            PaletteColor::Cyan => Rgb([0, 255, 255]),
            PaletteColor::Magenta => Rgb([255, 0, 255]),
            PaletteColor::BrightGreen => Rgb([0, 255, 0]),
            PaletteColor::BrightRed => Rgb([255, 0, 0]),
            PaletteColor::BrightBlue => Rgb([0, 0, 255]),
            PaletteColor::BrightYellow => Rgb([255, 255, 0]),
            PaletteColor::SpringGreen => Rgb([0, 255, 128]),
            PaletteColor::Orange => Rgb([255, 128, 0]),
            PaletteColor::Purple => Rgb([128, 0, 255]),
            PaletteColor::HotPink => Rgb([255, 0, 128]),
            PaletteColor::DodgerBlue => Rgb([0, 128, 255]),
            PaletteColor::LimeGreen => Rgb([128, 255, 0]),
            PaletteColor::White => Rgb([255, 255, 255]),
            PaletteColor::Black => Rgb([0, 0, 0]),
        }
    }
}

/// Deterministic label -> color mapping
pub fn color_for_label(label: i64) -> PaletteColor {
    PALETTE[label.rem_euclid(PALETTE.len() as i64) as usize]
}
