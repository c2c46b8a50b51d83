/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Color decorrelation transforms

use alloc::vec::Vec;

use crate::constants::{subsample_size, ARGB_BLACK};
use crate::errors::WebpErrors;
use crate::transforms::check_tiles;
use crate::transforms::dsp::LosslessDsp;

/// Per tile coefficients of the cross color transform
///
/// Each is a signed 3.5 fixed point value stored as a byte.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Multipliers {
    pub green_to_red:  u8,
    pub green_to_blue: u8,
    pub red_to_blue:   u8
}

impl Multipliers {
    /// Read the multipliers from a pixel of the transform sub-image
    #[inline]
    pub const fn from_code(code: u32) -> Multipliers {
        Multipliers {
            green_to_red:  code as u8,
            green_to_blue: (code >> 8) as u8,
            red_to_blue:   (code >> 16) as u8
        }
    }

    /// Pixel of the transform sub-image storing these multipliers
    pub const fn to_code(self) -> u32 {
        ARGB_BLACK
            | ((self.red_to_blue as u32) << 16)
            | ((self.green_to_blue as u32) << 8)
            | (self.green_to_red as u32)
    }

    /// Undo the transform on one pixel
    #[inline(always)]
    pub const fn inverse(self, argb: u32) -> u32 {
        let green = (argb >> 8) as u8;
        let red = (argb >> 16) as u8;
        let blue = argb as u8;

        let new_red = red.wrapping_add(color_transform_delta(self.green_to_red, green) as u8);
        let new_blue = blue
            .wrapping_add(color_transform_delta(self.green_to_blue, green) as u8)
            .wrapping_add(color_transform_delta(self.red_to_blue, new_red) as u8);

        (argb & 0xff00_ff00) | ((new_red as u32) << 16) | (new_blue as u32)
    }

    /// Apply the transform to one pixel
    #[inline(always)]
    pub const fn forward(self, argb: u32) -> u32 {
        let green = (argb >> 8) as u8;
        let red = (argb >> 16) as u8;
        let blue = argb as u8;

        let new_red = red.wrapping_sub(color_transform_delta(self.green_to_red, green) as u8);
        let new_blue = blue
            .wrapping_sub(color_transform_delta(self.green_to_blue, green) as u8)
            .wrapping_sub(color_transform_delta(self.red_to_blue, red) as u8);

        (argb & 0xff00_ff00) | ((new_red as u32) << 16) | (new_blue as u32)
    }
}

/// `(t * c) >> 5` with both treated as signed bytes
#[inline(always)]
pub const fn color_transform_delta(color_pred: u8, color: u8) -> i32 {
    ((color_pred as i8 as i32) * (color as i8 as i32)) >> 5
}

/// Subtract green from red and blue
#[inline(always)]
pub const fn subtract_green(argb: u32) -> u32 {
    let green = (argb >> 8) as u8;
    let red = ((argb >> 16) as u8).wrapping_sub(green);
    let blue = (argb as u8).wrapping_sub(green);

    (argb & 0xff00_ff00) | ((red as u32) << 16) | (blue as u32)
}

/// Add green back to red and blue
#[inline(always)]
pub const fn add_green(argb: u32) -> u32 {
    let green = (argb >> 8) & 0xff;
    let red_blue = ((argb & 0x00ff_00ff) + ((green << 16) | green)) & 0x00ff_00ff;

    (argb & 0xff00_ff00) | red_blue
}

pub fn forward_subtract_green(pixels: &mut [u32]) {
    pixels.iter_mut().for_each(|p| *p = subtract_green(*p));
}

pub fn inverse_subtract_green(dsp: &dyn LosslessDsp, pixels: &mut [u32]) {
    dsp.add_green(pixels);
}

/// Undo cross color decorrelation over the whole image
pub fn inverse_cross_color(
    dsp: &dyn LosslessDsp, bits: u8, multipliers: &[u32], width: usize, pixels: &mut [u32]
) -> Result<(), WebpErrors> {
    if width == 0 {
        return Ok(());
    }
    check_tiles(bits, width, pixels.len() / width, multipliers.len(), pixels.len())?;

    let tiles_per_row = subsample_size(width, bits);

    for (y, row) in pixels.chunks_exact_mut(width).enumerate() {
        let tile_row = &multipliers[(y >> bits) * tiles_per_row..];

        for (tile, span) in row.chunks_mut(1 << bits).enumerate() {
            dsp.color_inverse(Multipliers::from_code(tile_row[tile]), span);
        }
    }
    Ok(())
}

pub fn forward_cross_color(
    bits: u8, multipliers: &[u32], width: usize, pixels: &mut [u32]
) -> Result<(), WebpErrors> {
    if width == 0 {
        return Ok(());
    }
    check_tiles(bits, width, pixels.len() / width, multipliers.len(), pixels.len())?;

    let tiles_per_row = subsample_size(width, bits);

    for (y, row) in pixels.chunks_exact_mut(width).enumerate() {
        let tile_row = &multipliers[(y >> bits) * tiles_per_row..];

        for (tile, span) in row.chunks_mut(1 << bits).enumerate() {
            let m = Multipliers::from_code(tile_row[tile]);
            span.iter_mut().for_each(|p| *p = m.forward(*p));
        }
    }
    Ok(())
}

/// Sum of absolute signed values of the channel selected by `shift`
/// after transforming `pixels` with `m`
fn residual_cost(pixels: &[u32], m: Multipliers, shift: u32) -> u64 {
    pixels
        .iter()
        .map(|&p| u64::from(((m.forward(p) >> shift) as u8 as i8).unsigned_abs()))
        .sum()
}

/// Coefficient values tried for each multiplier
const CANDIDATES: [u8; 15] = [
    0, 1, 2, 4, 8, 16, 32, 64, 0xff, 0xfe, 0xfc, 0xf8, 0xf0, 0xe0, 0xc0
];

/// Search per tile multipliers that minimise red and blue residuals
pub fn choose_multipliers(bits: u8, width: usize, height: usize, pixels: &[u32]) -> Vec<u32> {
    let tile = 1_usize << bits;
    let tiles_x = subsample_size(width, bits);
    let tiles_y = subsample_size(height, bits);

    let mut codes = Vec::with_capacity(tiles_x * tiles_y);
    let mut tile_pixels = Vec::with_capacity(tile * tile);

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            tile_pixels.clear();

            for y in ty * tile..((ty + 1) * tile).min(height) {
                let start = y * width + tx * tile;
                let end = y * width + ((tx + 1) * tile).min(width);
                tile_pixels.extend_from_slice(&pixels[start..end]);
            }

            // red only depends on green_to_red
            let green_to_red = CANDIDATES
                .iter()
                .copied()
                .min_by_key(|&g2r| {
                    let m = Multipliers {
                        green_to_red: g2r,
                        ..Multipliers::default()
                    };
                    residual_cost(&tile_pixels, m, 16)
                })
                .unwrap_or(0);

            let mut best = Multipliers {
                green_to_red,
                ..Multipliers::default()
            };

            let mut best_cost = residual_cost(&tile_pixels, best, 0);

            for &g2b in &CANDIDATES {
                for &r2b in &CANDIDATES {
                    let m = Multipliers {
                        green_to_blue: g2b,
                        red_to_blue: r2b,
                        ..best
                    };
                    let cost = residual_cost(&tile_pixels, m, 0);

                    if cost < best_cost {
                        best_cost = cost;
                        best = m;
                    }
                }
            }
            codes.push(best.to_code());
        }
    }
    codes
}
