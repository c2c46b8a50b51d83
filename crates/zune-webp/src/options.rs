/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Lossless encoder settings
use alloc::vec;
use alloc::vec::Vec;

use crate::constants::MAX_COLOR_CACHE_BITS;
use crate::transforms::predictor::PredictorMode;
use crate::transforms::TransformType;

/// How the predictor transform picks a mode per tile
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PredictorChoice {
    /// Try every mode and keep the one with the smallest residuals
    Auto,
    /// Use one mode everywhere
    Fixed(PredictorMode)
}

/// Options controlling how pixels are transformed and coded
///
/// Transforms are applied in the order given. Color indexing is
/// skipped when the image has more than 256 colors, the rest
/// are always applied. Each transform may appear at most once.
///
/// # Example
/// ```
/// use zune_webp::{LosslessOptions, PredictorChoice};
/// use zune_webp::transforms::predictor::PredictorMode;
/// use zune_webp::transforms::TransformType;
///
/// let options = LosslessOptions::default()
///     .set_transforms(&[TransformType::Predictor, TransformType::SubtractGreen])
///     .set_predictor(PredictorChoice::Fixed(PredictorMode::TopLeft))
///     .set_color_cache_bits(0);
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LosslessOptions {
    transforms:          Vec<TransformType>,
    predictor:           PredictorChoice,
    predictor_bits:      u8,
    cross_color_bits:    u8,
    color_cache_bits:    u8,
    backward_references: bool,
    entropy_bits:        Option<u8>
}

impl Default for LosslessOptions {
    fn default() -> Self {
        LosslessOptions::from_effort(4)
    }
}

impl LosslessOptions {
    /// Settings for an effort level between 0 (fastest) and 9
    pub fn from_effort(effort: u8) -> LosslessOptions {
        let effort = effort.min(9);

        let transforms = match effort {
            0 => vec![TransformType::SubtractGreen],
            1..=2 => vec![
                TransformType::ColorIndexing,
                TransformType::SubtractGreen,
                TransformType::Predictor
            ],
            _ => vec![
                TransformType::ColorIndexing,
                TransformType::SubtractGreen,
                TransformType::Predictor,
                TransformType::CrossColor
            ]
        };
        LosslessOptions {
            transforms,
            predictor: PredictorChoice::Auto,
            predictor_bits: if effort > 6 { 3 } else { 4 },
            cross_color_bits: 5,
            color_cache_bits: if effort == 0 { 0 } else { 8 },
            backward_references: effort > 0,
            entropy_bits: if effort > 4 { Some(6) } else { None }
        }
    }

    /// Set the transforms to apply, in order
    ///
    /// Duplicates are dropped, keeping the first occurrence
    pub fn set_transforms(mut self, transforms: &[TransformType]) -> Self {
        self.transforms.clear();

        for &transform in transforms {
            if !self.transforms.contains(&transform) {
                self.transforms.push(transform);
            }
        }
        self
    }

    pub fn set_predictor(mut self, predictor: PredictorChoice) -> Self {
        self.predictor = predictor;
        self
    }

    /// Log2 of the predictor tile size, clamped to `2..=9`
    pub fn set_predictor_bits(mut self, bits: u8) -> Self {
        self.predictor_bits = bits.clamp(2, 9);
        self
    }

    /// Log2 of the cross color tile size, clamped to `2..=9`
    pub fn set_cross_color_bits(mut self, bits: u8) -> Self {
        self.cross_color_bits = bits.clamp(2, 9);
        self
    }

    /// Color cache size, zero disables the cache, values above 11 are clamped
    pub fn set_color_cache_bits(mut self, bits: u8) -> Self {
        self.color_cache_bits = bits.min(MAX_COLOR_CACHE_BITS);
        self
    }

    /// Whether runs of repeated pixels are coded as copies
    pub fn set_backward_references(mut self, yes: bool) -> Self {
        self.backward_references = yes;
        self
    }

    /// Use several prefix code groups chosen per `1 << bits` tile,
    /// `None` codes the whole image with one group
    pub fn set_entropy_bits(mut self, bits: Option<u8>) -> Self {
        self.entropy_bits = bits.map(|b| b.clamp(2, 9));
        self
    }

    pub fn get_transforms(&self) -> &[TransformType] {
        &self.transforms
    }

    pub const fn get_predictor(&self) -> PredictorChoice {
        self.predictor
    }

    pub const fn get_predictor_bits(&self) -> u8 {
        self.predictor_bits
    }

    pub const fn get_cross_color_bits(&self) -> u8 {
        self.cross_color_bits
    }

    pub const fn get_color_cache_bits(&self) -> u8 {
        self.color_cache_bits
    }

    pub const fn get_backward_references(&self) -> bool {
        self.backward_references
    }

    pub const fn get_entropy_bits(&self) -> Option<u8> {
        self.entropy_bits
    }
}
