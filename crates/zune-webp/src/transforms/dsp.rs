/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Pixel kernels used when undoing transforms
//!
//! The decoder picks an implementation once, from its options,
//! and passes it down to every transform.
use zune_core::options::DecoderOptions;

use crate::transforms::color::{add_green, Multipliers};
use crate::transforms::predictor::{add_pixels, predict, predict_at, PredictorMode};

/// Kernels for the hot loops of inverse transforms
///
/// Implementations must produce bit identical output.
pub trait LosslessDsp: Sync {
    /// Human readable name, used in logs
    fn name(&self) -> &'static str;

    /// Add predictions to the residuals in row `y`, columns `start..end`
    ///
    /// `pixels` is the whole image, rows above `y` and columns
    /// before `start` are already reconstructed. `y` and `start`
    /// are at least one.
    fn predictor_add(
        &self, mode: PredictorMode, pixels: &mut [u32], width: usize, y: usize, start: usize,
        end: usize
    );

    /// Add green to red and blue for every pixel
    fn add_green(&self, pixels: &mut [u32]);

    /// Undo cross color decorrelation for a run of pixels
    fn color_inverse(&self, multipliers: Multipliers, pixels: &mut [u32]);
}

/// Pixel at a time kernels
#[derive(Copy, Clone, Debug, Default)]
pub struct ScalarDsp;

impl LosslessDsp for ScalarDsp {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn predictor_add(
        &self, mode: PredictorMode, pixels: &mut [u32], width: usize, y: usize, start: usize,
        end: usize
    ) {
        for x in start..end {
            let pred = predict_at(mode, pixels, width, x, y);
            let index = y * width + x;

            pixels[index] = add_pixels(pixels[index], pred);
        }
    }

    fn add_green(&self, pixels: &mut [u32]) {
        pixels.iter_mut().for_each(|p| *p = add_green(*p));
    }

    fn color_inverse(&self, multipliers: Multipliers, pixels: &mut [u32]) {
        pixels
            .iter_mut()
            .for_each(|p| *p = multipliers.inverse(*p));
    }
}

const BATCH: usize = 8;

/// Kernels working on fixed blocks of eight pixels
///
/// Modes that only look at the row above have no dependency between
/// neighbouring pixels, so whole blocks are computed at once, the
/// fixed size lets the compiler vectorize them.
/// Everything else falls back to [`ScalarDsp`].
#[derive(Copy, Clone, Debug, Default)]
pub struct BatchedDsp;

impl LosslessDsp for BatchedDsp {
    fn name(&self) -> &'static str {
        "batched"
    }

    fn predictor_add(
        &self, mode: PredictorMode, pixels: &mut [u32], width: usize, y: usize, start: usize,
        mut end: usize
    ) {
        if !mode.uses_upper_row_only() {
            return ScalarDsp.predictor_add(mode, pixels, width, y, start, end);
        }
        // the top-right neighbour of the last column is in the current row
        let scalar_tail = end == width;

        if scalar_tail {
            end -= 1;
        }
        if start < end {
            let (above, current) = pixels.split_at_mut(y * width);
            let upper = &above[(y - 1) * width..];
            let row = &mut current[start..end];

            // upper[x - 1], upper[x], upper[x + 1] for every x in the block
            let mut x = start;

            for block in row.chunks_mut(BATCH) {
                let top_left = &upper[x - 1..x - 1 + block.len()];
                let top = &upper[x..x + block.len()];
                let top_right = &upper[x + 1..x + 1 + block.len()];

                for i in 0..block.len() {
                    // left is never read by these modes
                    let pred = predict(mode, 0, top[i], top_left[i], top_right[i]);
                    block[i] = add_pixels(block[i], pred);
                }
                x += block.len();
            }
        }
        if scalar_tail && end >= start {
            ScalarDsp.predictor_add(mode, pixels, width, y, end, end + 1);
        }
    }

    fn add_green(&self, pixels: &mut [u32]) {
        let mut chunks = pixels.chunks_exact_mut(BATCH);

        for chunk in &mut chunks {
            let mut block = [0_u32; BATCH];
            block.copy_from_slice(chunk);

            for p in block.iter_mut() {
                *p = add_green(*p);
            }
            chunk.copy_from_slice(&block);
        }
        ScalarDsp.add_green(chunks.into_remainder());
    }

    fn color_inverse(&self, multipliers: Multipliers, pixels: &mut [u32]) {
        let mut chunks = pixels.chunks_exact_mut(BATCH);

        for chunk in &mut chunks {
            let mut block = [0_u32; BATCH];
            block.copy_from_slice(chunk);

            for p in block.iter_mut() {
                *p = multipliers.inverse(*p);
            }
            chunk.copy_from_slice(&block);
        }
        ScalarDsp.color_inverse(multipliers, chunks.into_remainder());
    }
}

/// Pick the kernels for a decoder
///
/// `use_unsafe` is the knob the zune decoders use to opt into
/// faster code paths, here it selects [`BatchedDsp`].
pub fn select_dsp(options: &DecoderOptions) -> &'static dyn LosslessDsp {
    if options.get_use_unsafe() {
        &BatchedDsp
    } else {
        &ScalarDsp
    }
}

#[cfg(test)]
mod tests {
    use nanorand::{Rng, WyRand};

    use super::{BatchedDsp, LosslessDsp, ScalarDsp};
    use crate::transforms::color::Multipliers;
    use crate::transforms::predictor::PredictorMode;

    #[test]
    fn batched_matches_scalar() {
        let mut rng = WyRand::new_seed(7);
        let width = 37;
        let height = 4;
        let mut residuals = vec![0_u32; width * height];
        residuals.iter_mut().for_each(|p| *p = rng.generate());

        for mode in PredictorMode::ALL {
            for (start, end) in [(1, width), (1, 9), (5, 32), (32, width)] {
                let mut a = residuals.clone();
                let mut b = residuals.clone();

                ScalarDsp.predictor_add(mode, &mut a, width, 2, start, end);
                BatchedDsp.predictor_add(mode, &mut b, width, 2, start, end);
                assert_eq!(a, b, "{mode:?} {start}..{end}");
            }
        }

        let m = Multipliers::from_code(rng.generate());
        let mut a = residuals.clone();
        let mut b = residuals.clone();

        ScalarDsp.color_inverse(m, &mut a);
        BatchedDsp.color_inverse(m, &mut b);
        ScalarDsp.add_green(&mut a);
        BatchedDsp.add_green(&mut b);
        assert_eq!(a, b);
    }
}
