/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Spatial prediction
//!
//! Every tile of `1 << bits` pixels carries a mode in the green channel
//! of a sub-resolution image, pixels store the difference between
//! their value and the mode's prediction.

use alloc::vec::Vec;

use crate::constants::{subsample_size, ARGB_BLACK};
use crate::errors::WebpErrors;
use crate::transforms::check_tiles;
use crate::transforms::dsp::LosslessDsp;

/// The fourteen prediction modes
///
/// `L`, `T`, `TL` and `TR` are the left, top, top-left and top-right
/// neighbours of the pixel being predicted.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PredictorMode {
    /// Opaque black, `0xff000000`
    Black = 0,
    Left = 1,
    Top = 2,
    TopRight = 3,
    TopLeft = 4,
    /// `avg(avg(L, TR), T)`
    AverageLeftTopRightTop = 5,
    /// `avg(L, TL)`
    AverageLeftTopLeft = 6,
    /// `avg(L, T)`
    AverageLeftTop = 7,
    /// `avg(TL, T)`
    AverageTopLeftTop = 8,
    /// `avg(T, TR)`
    AverageTopTopRight = 9,
    /// `avg(avg(L, TL), avg(T, TR))`
    AverageFour = 10,
    /// Whichever of `L` or `T` is closer to the gradient `L + T - TL`
    Select = 11,
    /// `clamp(L + T - TL)` per channel
    ClampAddSubtractFull = 12,
    /// `clamp(a + (a - TL) / 2)` per channel with `a = avg(L, T)`
    ClampAddSubtractHalf = 13
}

impl PredictorMode {
    pub const ALL: [PredictorMode; 14] = [
        PredictorMode::Black,
        PredictorMode::Left,
        PredictorMode::Top,
        PredictorMode::TopRight,
        PredictorMode::TopLeft,
        PredictorMode::AverageLeftTopRightTop,
        PredictorMode::AverageLeftTopLeft,
        PredictorMode::AverageLeftTop,
        PredictorMode::AverageTopLeftTop,
        PredictorMode::AverageTopTopRight,
        PredictorMode::AverageFour,
        PredictorMode::Select,
        PredictorMode::ClampAddSubtractFull,
        PredictorMode::ClampAddSubtractHalf
    ];

    /// Mode for a 4 bit code, 14 and 15 behave like black
    pub const fn from_code(code: u8) -> PredictorMode {
        match code & 0xf {
            1 => PredictorMode::Left,
            2 => PredictorMode::Top,
            3 => PredictorMode::TopRight,
            4 => PredictorMode::TopLeft,
            5 => PredictorMode::AverageLeftTopRightTop,
            6 => PredictorMode::AverageLeftTopLeft,
            7 => PredictorMode::AverageLeftTop,
            8 => PredictorMode::AverageTopLeftTop,
            9 => PredictorMode::AverageTopTopRight,
            10 => PredictorMode::AverageFour,
            11 => PredictorMode::Select,
            12 => PredictorMode::ClampAddSubtractFull,
            13 => PredictorMode::ClampAddSubtractHalf,
            _ => PredictorMode::Black
        }
    }

    /// Mode stored in a pixel of the predictor sub-image
    #[inline]
    pub const fn from_pixel(pixel: u32) -> PredictorMode {
        PredictorMode::from_code((pixel >> 8) as u8)
    }

    /// The sub-image pixel encoding this mode
    pub const fn to_pixel(self) -> u32 {
        ARGB_BLACK | ((self as u32) << 8)
    }

    /// True if the prediction does not depend on the left pixel
    pub const fn uses_upper_row_only(self) -> bool {
        matches!(
            self,
            PredictorMode::Black
                | PredictorMode::Top
                | PredictorMode::TopRight
                | PredictorMode::TopLeft
                | PredictorMode::AverageTopLeftTop
                | PredictorMode::AverageTopTopRight
        )
    }
}

/// Per channel `(a + b) / 2` rounding down
#[inline(always)]
pub const fn average2(a: u32, b: u32) -> u32 {
    (((a ^ b) & 0xfefe_fefe) >> 1) + (a & b)
}

/// Per channel sum modulo 256
#[inline(always)]
pub const fn add_pixels(a: u32, b: u32) -> u32 {
    let alpha_green = (a & 0xff00_ff00).wrapping_add(b & 0xff00_ff00);
    let red_blue = (a & 0x00ff_00ff).wrapping_add(b & 0x00ff_00ff);

    (alpha_green & 0xff00_ff00) | (red_blue & 0x00ff_00ff)
}

/// Per channel difference modulo 256
#[inline(always)]
pub const fn sub_pixels(a: u32, b: u32) -> u32 {
    let alpha_green = 0x00ff_00ff_u32
        .wrapping_add(a & 0xff00_ff00)
        .wrapping_sub(b & 0xff00_ff00);
    let red_blue = 0xff00_ff00_u32
        .wrapping_add(a & 0x00ff_00ff)
        .wrapping_sub(b & 0x00ff_00ff);

    (alpha_green & 0xff00_ff00) | (red_blue & 0x00ff_00ff)
}

#[inline(always)]
const fn channel(pixel: u32, shift: u32) -> i32 {
    ((pixel >> shift) & 0xff) as i32
}

#[inline(always)]
const fn clip255(value: i32) -> u32 {
    if value < 0 {
        0
    } else if value > 255 {
        255
    } else {
        value as u32
    }
}

#[inline]
fn select(top: u32, left: u32, top_left: u32) -> u32 {
    let mut pa_minus_pb = 0;

    for shift in [24, 16, 8, 0] {
        let t = channel(top, shift);
        let l = channel(left, shift);
        let tl = channel(top_left, shift);

        pa_minus_pb += (l - tl).abs() - (t - tl).abs();
    }
    if pa_minus_pb <= 0 {
        top
    } else {
        left
    }
}

#[inline]
fn clamp_add_subtract_full(c0: u32, c1: u32, c2: u32) -> u32 {
    [24, 16, 8, 0].iter().fold(0, |acc, &shift| {
        let value = channel(c0, shift) + channel(c1, shift) - channel(c2, shift);
        acc | (clip255(value) << shift)
    })
}

#[inline]
fn clamp_add_subtract_half(c0: u32, c1: u32, c2: u32) -> u32 {
    let avg = average2(c0, c1);

    [24, 16, 8, 0].iter().fold(0, |acc, &shift| {
        let a = channel(avg, shift);
        let b = channel(c2, shift);
        acc | (clip255(a + (a - b) / 2) << shift)
    })
}

/// Predict a pixel from its neighbours
#[inline]
pub fn predict(mode: PredictorMode, left: u32, top: u32, top_left: u32, top_right: u32) -> u32 {
    match mode {
        PredictorMode::Black => ARGB_BLACK,
        PredictorMode::Left => left,
        PredictorMode::Top => top,
        PredictorMode::TopRight => top_right,
        PredictorMode::TopLeft => top_left,
        PredictorMode::AverageLeftTopRightTop => average2(average2(left, top_right), top),
        PredictorMode::AverageLeftTopLeft => average2(left, top_left),
        PredictorMode::AverageLeftTop => average2(left, top),
        PredictorMode::AverageTopLeftTop => average2(top_left, top),
        PredictorMode::AverageTopTopRight => average2(top, top_right),
        PredictorMode::AverageFour => average2(average2(left, top_left), average2(top, top_right)),
        PredictorMode::Select => select(top, left, top_left),
        PredictorMode::ClampAddSubtractFull => clamp_add_subtract_full(left, top, top_left),
        PredictorMode::ClampAddSubtractHalf => clamp_add_subtract_half(left, top, top_left)
    }
}

/// Prediction for the pixel at `(x, y)` when `x >= 1` and `y >= 1`
///
/// The top right neighbour of the last column is the first
/// pixel of the current row, which falls out of flat indexing.
#[inline(always)]
pub fn predict_at(mode: PredictorMode, pixels: &[u32], width: usize, x: usize, y: usize) -> u32 {
    let index = y * width + x;

    predict(
        mode,
        pixels[index - 1],
        pixels[index - width],
        pixels[index - width - 1],
        pixels[index - width + 1]
    )
}

/// Mode used for `(x, y)` including the fixed first row and column
#[inline]
fn mode_at(modes: &[u32], tiles_per_row: usize, bits: u8, x: usize, y: usize) -> PredictorMode {
    match (x, y) {
        (0, 0) => PredictorMode::Black,
        (_, 0) => PredictorMode::Left,
        (0, _) => PredictorMode::Top,
        _ => PredictorMode::from_pixel(modes[(y >> bits) * tiles_per_row + (x >> bits)])
    }
}

fn prediction(pixels: &[u32], width: usize, x: usize, y: usize, mode: PredictorMode) -> u32 {
    match (x, y) {
        (0, 0) => ARGB_BLACK,
        (_, 0) => pixels[x - 1],
        (0, _) => pixels[(y - 1) * width],
        _ => predict_at(mode, pixels, width, x, y)
    }
}

/// Replace residuals in `pixels` with reconstructed values
pub fn inverse_predictor(
    dsp: &dyn LosslessDsp, bits: u8, modes: &[u32], width: usize, height: usize,
    pixels: &mut [u32]
) -> Result<(), WebpErrors> {
    check_tiles(bits, width, height, modes.len(), pixels.len())?;

    if width == 0 || height == 0 {
        return Ok(());
    }
    let tiles_per_row = subsample_size(width, bits);

    pixels[0] = add_pixels(pixels[0], ARGB_BLACK);

    for x in 1..width {
        pixels[x] = add_pixels(pixels[x], pixels[x - 1]);
    }

    for y in 1..height {
        let row = y * width;
        pixels[row] = add_pixels(pixels[row], pixels[row - width]);

        let tile_row = (y >> bits) * tiles_per_row;
        let mut x = 1;

        while x < width {
            let mode = PredictorMode::from_pixel(modes[tile_row + (x >> bits)]);
            let end = (((x >> bits) + 1) << bits).min(width);

            dsp.predictor_add(mode, pixels, width, y, x, end);
            x = end;
        }
    }
    Ok(())
}

/// Replace pixels with residuals, working backwards so every
/// prediction still sees original neighbours
pub fn forward_predictor(
    bits: u8, modes: &[u32], width: usize, height: usize, pixels: &mut [u32]
) -> Result<(), WebpErrors> {
    check_tiles(bits, width, height, modes.len(), pixels.len())?;

    let tiles_per_row = subsample_size(width, bits);

    for y in (0..height).rev() {
        for x in (0..width).rev() {
            let mode = mode_at(modes, tiles_per_row, bits, x, y);
            let pred = prediction(pixels, width, x, y, mode);
            let index = y * width + x;

            pixels[index] = sub_pixels(pixels[index], pred);
        }
    }
    Ok(())
}

/// Sum of absolute signed residuals a mode would leave in a tile
fn tile_cost(
    mode: PredictorMode, pixels: &[u32], width: usize, x_range: (usize, usize),
    y_range: (usize, usize)
) -> u64 {
    let mut cost = 0_u64;

    for y in y_range.0..y_range.1 {
        for x in x_range.0..x_range.1 {
            let pred = prediction(pixels, width, x, y, mode);
            let residual = sub_pixels(pixels[y * width + x], pred);

            cost += residual
                .to_le_bytes()
                .iter()
                .map(|&b| u64::from((b as i8).unsigned_abs()))
                .sum::<u64>();
        }
    }
    cost
}

/// Pick the mode leaving the smallest residuals for every tile
///
/// Returns the sub-image describing the choice.
pub fn choose_modes(
    bits: u8, width: usize, height: usize, pixels: &[u32]
) -> Vec<u32> {
    let tile = 1_usize << bits;
    let tiles_x = subsample_size(width, bits);
    let tiles_y = subsample_size(height, bits);

    let mut modes = Vec::with_capacity(tiles_x * tiles_y);

    for ty in 0..tiles_y {
        let y_range = (ty * tile, ((ty + 1) * tile).min(height));

        for tx in 0..tiles_x {
            let x_range = (tx * tile, ((tx + 1) * tile).min(width));

            let best = PredictorMode::ALL
                .iter()
                .map(|&mode| (tile_cost(mode, pixels, width, x_range, y_range), mode))
                .min_by_key(|(cost, mode)| (*cost, *mode as u8))
                .map_or(PredictorMode::Black, |(_, mode)| mode);

            modes.push(best.to_pixel());
        }
    }
    modes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::dsp::{BatchedDsp, ScalarDsp};

    #[test]
    fn add_and_sub_are_inverse() {
        let a = 0x80ff_0110;
        let b = 0x9101_ff20;

        assert_eq!(add_pixels(sub_pixels(a, b), b), a);
        assert_eq!(sub_pixels(add_pixels(a, b), b), a);
        assert_eq!(add_pixels(0xffff_ffff, 0x0101_0101), 0);
        assert_eq!(sub_pixels(0, 0x0101_0101), 0xffff_ffff);
    }

    #[test]
    fn average_is_per_channel() {
        assert_eq!(average2(0xff00_0000, 0x0100_00ff), 0x8000_007f);
        assert_eq!(average2(0x0203_0405, 0x0203_0405), 0x0203_0405);
    }

    #[test]
    fn select_prefers_closer_neighbour() {
        // left equals top-left, so the gradient matches top exactly
        assert_eq!(select(0x10, 0x20, 0x20), 0x10);
        // top equals top-left, gradient is left
        assert_eq!(select(0x10, 0x40, 0x10), 0x40);
    }

    #[test]
    fn clamped_half_truncates_towards_zero() {
        // a = avg(0, 0) = 0, b = 3, 0 + (0 - 3) / 2 = -1 -> clamped to 0
        assert_eq!(clamp_add_subtract_half(0, 0, 3), 0);
        // a = 10, b = 7, 10 + 3 / 2 = 11
        assert_eq!(clamp_add_subtract_half(10, 10, 7), 11);
        // a = 250, b = 0 -> 375 clamps at 255
        assert_eq!(clamp_add_subtract_half(250, 250, 0), 255);
    }

    #[test]
    fn codes_above_thirteen_are_black() {
        assert_eq!(PredictorMode::from_code(14), PredictorMode::Black);
        assert_eq!(PredictorMode::from_code(15), PredictorMode::Black);
        for mode in PredictorMode::ALL {
            assert_eq!(PredictorMode::from_pixel(mode.to_pixel()), mode);
        }
    }

    #[test]
    fn every_mode_round_trips() {
        let width = 13;
        let height = 9;
        let original: Vec<u32> = (0..width * height)
            .map(|i| (i as u32).wrapping_mul(0x9e37_79b9))
            .collect();

        for dsp in [&ScalarDsp as &dyn LosslessDsp, &BatchedDsp] {
            for mode in PredictorMode::ALL {
                let bits = 2;
                let tiles = subsample_size(width, bits) * subsample_size(height, bits);
                let modes = vec![mode.to_pixel(); tiles];

                let mut pixels = original.clone();
                forward_predictor(bits, &modes, width, height, &mut pixels).unwrap();
                inverse_predictor(dsp, bits, &modes, width, height, &mut pixels).unwrap();

                assert_eq!(pixels, original, "mode {mode:?} with {}", dsp.name());
            }
        }
    }

    #[test]
    fn chosen_modes_round_trip() {
        let width = 17;
        let height = 11;
        let original: Vec<u32> = (0..width * height)
            .map(|i| 0xff00_0000 | ((i % width) as u32 * 0x0001_0203))
            .collect();
        let modes = choose_modes(2, width, height, &original);

        let mut pixels = original.clone();
        forward_predictor(2, &modes, width, height, &mut pixels).unwrap();
        inverse_predictor(&ScalarDsp, 2, &modes, width, height, &mut pixels).unwrap();

        assert_eq!(pixels, original);
    }
}
