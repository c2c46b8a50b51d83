/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Invertible pixel transforms
//!
//! The encoder applies transforms in the order it writes them,
//! the decoder undoes them in reverse. All arithmetic is per channel
//! modulo 256 so every forward/inverse pair round trips exactly.
use alloc::vec::Vec;

use crate::constants::subsample_size;
use crate::errors::WebpErrors;
use crate::transforms::dsp::LosslessDsp;

pub mod color;
pub mod dsp;
pub mod palette;
pub mod predictor;

/// The kind of a transform, values match the two bit code in the stream
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransformType {
    Predictor = 0,
    CrossColor = 1,
    SubtractGreen = 2,
    ColorIndexing = 3
}

impl TransformType {
    pub const fn from_code(code: u32) -> TransformType {
        match code & 3 {
            0 => TransformType::Predictor,
            1 => TransformType::CrossColor,
            2 => TransformType::SubtractGreen,
            _ => TransformType::ColorIndexing
        }
    }

    pub const fn to_code(self) -> u32 {
        self as u32
    }
}

/// A transform together with its parameters
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Transform {
    /// Per tile prediction, `modes` has one pixel per `1 << bits` tile
    Predictor { bits: u8, modes: Vec<u32> },
    /// Per tile color decorrelation, `multipliers` has one pixel per tile
    CrossColor { bits: u8, multipliers: Vec<u32> },
    SubtractGreen,
    /// Palette lookup, `1 << bits` indices are packed into each pixel
    ///
    /// The palette is kept in plain (not delta coded) form.
    ColorIndexing { bits: u8, palette: Vec<u32> }
}

impl Transform {
    pub const fn kind(&self) -> TransformType {
        match self {
            Transform::Predictor { .. } => TransformType::Predictor,
            Transform::CrossColor { .. } => TransformType::CrossColor,
            Transform::SubtractGreen => TransformType::SubtractGreen,
            Transform::ColorIndexing { .. } => TransformType::ColorIndexing
        }
    }

    /// Width of the image this transform produces from an input
    /// `width` pixels wide
    ///
    /// Only color indexing changes it.
    pub const fn transformed_width(&self, width: usize) -> usize {
        match self {
            Transform::ColorIndexing { bits, .. } => subsample_size(width, *bits),
            _ => width
        }
    }

    /// Apply the transform to a `width` x `height` image
    ///
    /// For color indexing every pixel must be in the palette, the
    /// output is the packed index image.
    pub fn forward(
        &self, width: usize, height: usize, pixels: &mut Vec<u32>
    ) -> Result<(), WebpErrors> {
        check_length(width, height, pixels.len())?;

        match self {
            Transform::Predictor { bits, modes } => {
                predictor::forward_predictor(*bits, modes, width, height, pixels)?;
            }
            Transform::CrossColor { bits, multipliers } => {
                color::forward_cross_color(*bits, multipliers, width, pixels)?;
            }
            Transform::SubtractGreen => color::forward_subtract_green(pixels),
            Transform::ColorIndexing { bits, palette } => {
                let indices = palette::index_pixels(pixels, palette)?;
                *pixels = palette::pack_indices(&indices, width, height, *bits);
            }
        }
        Ok(())
    }

    /// Undo the transform, `width` and `height` describe the image
    /// the transform was applied to
    pub fn inverse(
        &self, dsp: &dyn LosslessDsp, width: usize, height: usize, pixels: &mut Vec<u32>
    ) -> Result<(), WebpErrors> {
        check_length(self.transformed_width(width), height, pixels.len())?;

        match self {
            Transform::Predictor { bits, modes } => {
                predictor::inverse_predictor(dsp, *bits, modes, width, height, pixels)?;
            }
            Transform::CrossColor { bits, multipliers } => {
                color::inverse_cross_color(dsp, *bits, multipliers, width, pixels)?;
            }
            Transform::SubtractGreen => color::inverse_subtract_green(dsp, pixels),
            Transform::ColorIndexing { bits, palette } => {
                *pixels = palette::unpack_indices(pixels, palette, width, height, *bits)?;
            }
        }
        Ok(())
    }
}

/// Check that a per tile sub-image and the image it describes are
/// large enough for a `width` x `height` image split in `1 << bits` tiles
pub(crate) fn check_tiles(
    bits: u8, width: usize, height: usize, tiles: usize, pixels: usize
) -> Result<(), WebpErrors> {
    if pixels < width * height {
        return Err(WebpErrors::LengthMismatch(width * height, pixels));
    }
    if tiles < subsample_size(width, bits) * subsample_size(height, bits) {
        return Err(WebpErrors::CorruptData("Transform sub-image too small"));
    }
    Ok(())
}

fn check_length(width: usize, height: usize, found: usize) -> Result<(), WebpErrors> {
    let expected = width * height;

    if expected != found {
        return Err(WebpErrors::LengthMismatch(expected, found));
    }
    Ok(())
}
