/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! VP8L bitstream encoding
use alloc::vec;
use alloc::vec::Vec;

use log::trace;

use crate::bitstream::BitWriter;
use crate::constants::{
    subsample_size, ALPHABET_SIZE, ALPHA, BLUE, DIST, GREEN, MAX_COPY_LENGTH, MIN_HUFFMAN_BITS,
    MIN_TRANSFORM_BITS, NUM_LENGTH_CODES, NUM_LITERAL_CODES, RED, VP8L_IMAGE_SIZE_BITS,
    VP8L_MAGIC, VP8L_MAX_DIMENSION, VP8L_VERSION_BITS
};
use crate::errors::WebpErrors;
use crate::huffman::PrefixCode;
use crate::lossless::color_cache::ColorCache;
use crate::options::{LosslessOptions, PredictorChoice};
use crate::transforms::color::choose_multipliers;
use crate::transforms::palette::{bits_for_palette_size, collect_palette, delta_encode_palette};
use crate::transforms::predictor::choose_modes;
use crate::transforms::{Transform, TransformType};

/// Shortest run worth coding as a copy
const MIN_COPY_LENGTH: usize = 3;
/// Distance code of the pixel directly above
const PLANE_CODE_ABOVE: usize = 1;
/// Distance code of the pixel to the left
const PLANE_CODE_LEFT: usize = 2;
/// Upper bound on prefix code groups for the entropy image
const NUM_ENTROPY_BINS: usize = 8;

/// One coded element of the pixel stream
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Symbol {
    Literal(u32),
    CacheIndex(usize),
    Copy { length: usize, plane_code: usize }
}

impl Symbol {
    /// Number of pixels the symbol produces
    const fn pixels(self) -> usize {
        match self {
            Symbol::Copy { length, .. } => length,
            _ => 1
        }
    }

    /// Symbol in the green alphabet
    const fn green_symbol(self) -> usize {
        match self {
            Symbol::Literal(argb) => ((argb >> 8) & 0xff) as usize,
            Symbol::CacheIndex(key) => NUM_LITERAL_CODES + NUM_LENGTH_CODES + key,
            Symbol::Copy { length, .. } => NUM_LITERAL_CODES + prefix_encode(length).0
        }
    }
}

/// Split a length or distance code into `(symbol, extra bit count, extra bits)`
const fn prefix_encode(value: usize) -> (usize, u8, u32) {
    let v = value - 1;

    if v < 4 {
        return (v, 0, 0);
    }
    let highest_bit = (usize::BITS - 1 - v.leading_zeros()) as usize;
    let second_bit = (v >> (highest_bit - 1)) & 1;
    let extra_bits = highest_bit - 1;

    (
        2 * highest_bit + second_bit,
        extra_bits as u8,
        (v & ((1 << extra_bits) - 1)) as u32
    )
}

/// Length of the run starting at `pos` that repeats the pixels `dist` back
fn match_length(pixels: &[u32], pos: usize, dist: usize) -> usize {
    if dist > pos {
        return 0;
    }
    let limit = (pixels.len() - pos).min(MAX_COPY_LENGTH);

    (0..limit)
        .take_while(|&i| pixels[pos + i] == pixels[pos + i - dist])
        .count()
}

/// Turn pixels into literals, cache hits and copies
fn backward_references(
    pixels: &[u32], width: usize, use_copies: bool, cache_bits: u8
) -> Result<Vec<Symbol>, WebpErrors> {
    let mut cache = if cache_bits > 0 {
        Some(ColorCache::new(cache_bits)?)
    } else {
        None
    };
    let mut symbols = Vec::with_capacity(pixels.len());
    let mut pos = 0;

    while pos < pixels.len() {
        if use_copies {
            let left = match_length(pixels, pos, 1);
            let above = match_length(pixels, pos, width);

            let (length, plane_code) = if above > left {
                (above, PLANE_CODE_ABOVE)
            } else {
                (left, PLANE_CODE_LEFT)
            };

            if length >= MIN_COPY_LENGTH {
                if let Some(cache) = cache.as_mut() {
                    pixels[pos..pos + length]
                        .iter()
                        .for_each(|&p| cache.insert(p));
                }
                symbols.push(Symbol::Copy { length, plane_code });
                pos += length;
                continue;
            }
        }
        let argb = pixels[pos];

        let symbol = match cache.as_mut() {
            Some(cache) => match cache.find(argb) {
                Some(key) => Symbol::CacheIndex(key),
                None => {
                    cache.insert(argb);
                    Symbol::Literal(argb)
                }
            },
            None => Symbol::Literal(argb)
        };
        symbols.push(symbol);
        pos += 1;
    }
    Ok(symbols)
}

/// Histograms of one prefix code group
struct Histograms {
    counts: [Vec<u32>; 5]
}

impl Histograms {
    fn new(cache_bits: u8) -> Histograms {
        let cache_size = if cache_bits > 0 { 1 << cache_bits } else { 0 };

        Histograms {
            counts: [
                vec![0; ALPHABET_SIZE[GREEN] + cache_size],
                vec![0; ALPHABET_SIZE[RED]],
                vec![0; ALPHABET_SIZE[BLUE]],
                vec![0; ALPHABET_SIZE[ALPHA]],
                vec![0; ALPHABET_SIZE[DIST]]
            ]
        }
    }

    fn add(&mut self, symbol: Symbol) {
        self.counts[GREEN][symbol.green_symbol()] += 1;

        match symbol {
            Symbol::Literal(argb) => {
                self.counts[RED][((argb >> 16) & 0xff) as usize] += 1;
                self.counts[BLUE][(argb & 0xff) as usize] += 1;
                self.counts[ALPHA][(argb >> 24) as usize] += 1;
            }
            Symbol::Copy { plane_code, .. } => {
                self.counts[DIST][prefix_encode(plane_code).0] += 1;
            }
            Symbol::CacheIndex(_) => ()
        }
    }

    fn codes(&self) -> [PrefixCode; 5] {
        [
            PrefixCode::from_histogram(&self.counts[GREEN]),
            PrefixCode::from_histogram(&self.counts[RED]),
            PrefixCode::from_histogram(&self.counts[BLUE]),
            PrefixCode::from_histogram(&self.counts[ALPHA]),
            PrefixCode::from_histogram(&self.counts[DIST])
        ]
    }
}

/// Group tiles with a similar number of distinct green symbols
///
/// Returns the group of every tile, groups are numbered densely.
fn assign_groups(
    symbols: &[Symbol], width: usize, height: usize, bits: u8
) -> Vec<u32> {
    let tiles_x = subsample_size(width, bits);
    let tiles_y = subsample_size(height, bits);
    let mut seen: Vec<Vec<u16>> = vec![Vec::new(); tiles_x * tiles_y];
    let mut pos = 0;

    for &symbol in symbols {
        let (x, y) = (pos % width, pos / width);
        seen[(y >> bits) * tiles_x + (x >> bits)].push(symbol.green_symbol() as u16);
        pos += symbol.pixels();
    }

    let distinct: Vec<usize> = seen
        .iter_mut()
        .map(|codes| {
            codes.sort_unstable();
            codes.dedup();
            codes.len()
        })
        .collect();

    let min = distinct.iter().copied().min().unwrap_or(0);
    let max = distinct.iter().copied().max().unwrap_or(0);
    let spread = max - min + 1;

    let bins: Vec<usize> = distinct
        .iter()
        .map(|&d| (d - min) * NUM_ENTROPY_BINS / spread)
        .collect();

    let mut dense = [u32::MAX; NUM_ENTROPY_BINS];
    let mut next = 0;

    bins.iter()
        .map(|&bin| {
            if dense[bin] == u32::MAX {
                dense[bin] = next;
                next += 1;
            }
            dense[bin]
        })
        .collect()
}

/// Write the prefix codes and coded pixels of one image level
///
/// Sub-images never carry a color cache or an entropy image.
fn write_image_data(
    writer: &mut BitWriter, pixels: &[u32], width: usize, height: usize, is_level0: bool,
    options: &LosslessOptions
) -> Result<(), WebpErrors> {
    let cache_bits = if is_level0 {
        options.get_color_cache_bits()
    } else {
        0
    };
    let symbols = backward_references(
        pixels,
        width,
        options.get_backward_references(),
        cache_bits
    )?;

    if cache_bits > 0 {
        writer.put_bit(true)?;
        writer.put_bits(4, u32::from(cache_bits))?;
    } else {
        writer.put_bit(false)?;
    }

    let mut tile_groups = Vec::new();
    let mut entropy_bits = 0;

    if is_level0 {
        match options.get_entropy_bits() {
            Some(bits) => {
                tile_groups = assign_groups(&symbols, width, height, bits);
                entropy_bits = bits;

                writer.put_bit(true)?;
                writer.put_bits(3, u32::from(bits - MIN_HUFFMAN_BITS))?;

                let entropy_image: Vec<u32> = tile_groups.iter().map(|g| g << 8).collect();

                write_image_data(
                    writer,
                    &entropy_image,
                    subsample_size(width, bits),
                    subsample_size(height, bits),
                    false,
                    options
                )?;
            }
            None => writer.put_bit(false)?
        }
    }

    let num_groups = tile_groups.iter().max().map_or(1, |&g| g as usize + 1);
    let tiles_x = subsample_size(width, entropy_bits);

    let group_of = |pos: usize| -> usize {
        if tile_groups.is_empty() {
            0
        } else {
            let (x, y) = (pos % width, pos / width);
            tile_groups[(y >> entropy_bits) * tiles_x + (x >> entropy_bits)] as usize
        }
    };

    let mut histograms: Vec<Histograms> =
        (0..num_groups).map(|_| Histograms::new(cache_bits)).collect();
    let mut pos = 0;

    for &symbol in &symbols {
        histograms[group_of(pos)].add(symbol);
        pos += symbol.pixels();
    }

    let codes: Vec<[PrefixCode; 5]> = histograms.iter().map(Histograms::codes).collect();

    for group in &codes {
        for code in group {
            code.write_description(writer)?;
        }
    }
    trace!(
        "Level {}: {} symbols, {} prefix code groups",
        if is_level0 { 0 } else { 1 },
        symbols.len(),
        num_groups
    );

    pos = 0;

    for &symbol in &symbols {
        let group = &codes[group_of(pos)];

        group[GREEN].write_symbol(writer, symbol.green_symbol())?;

        match symbol {
            Symbol::Literal(argb) => {
                group[RED].write_symbol(writer, ((argb >> 16) & 0xff) as usize)?;
                group[BLUE].write_symbol(writer, (argb & 0xff) as usize)?;
                group[ALPHA].write_symbol(writer, (argb >> 24) as usize)?;
            }
            Symbol::Copy { length, plane_code } => {
                let (_, length_bits, length_extra) = prefix_encode(length);
                writer.put_bits(length_bits, length_extra)?;

                let (dist_symbol, dist_bits, dist_extra) = prefix_encode(plane_code);
                group[DIST].write_symbol(writer, dist_symbol)?;
                writer.put_bits(dist_bits, dist_extra)?;
            }
            Symbol::CacheIndex(_) => ()
        }
        pos += symbol.pixels();
    }
    Ok(())
}

/// A VP8L encoder
///
/// Pixels are packed `0xAARRGGBB` values in raster order.
///
/// # Example
/// ```
/// use zune_webp::lossless::LosslessEncoder;
/// use zune_webp::LosslessOptions;
///
/// let pixels = [0xff00_00ff_u32; 16];
/// let encoder = LosslessEncoder::new(&pixels, 4, 4, LosslessOptions::default());
/// let bitstream = encoder.encode().unwrap();
/// assert_eq!(bitstream[0], 0x2f);
/// ```
pub struct LosslessEncoder<'a> {
    pixels:  &'a [u32],
    width:   usize,
    height:  usize,
    options: LosslessOptions
}

impl<'a> LosslessEncoder<'a> {
    pub fn new(
        pixels: &'a [u32], width: usize, height: usize, options: LosslessOptions
    ) -> LosslessEncoder<'a> {
        LosslessEncoder {
            pixels,
            width,
            height,
            options
        }
    }

    /// Whether any pixel is not fully opaque
    pub fn has_alpha(&self) -> bool {
        self.pixels.iter().any(|p| p >> 24 != 0xff)
    }

    fn write_header(&self, writer: &mut BitWriter) -> Result<(), WebpErrors> {
        writer.put_bits(8, u32::from(VP8L_MAGIC))?;
        writer.put_bits(VP8L_IMAGE_SIZE_BITS, (self.width - 1) as u32)?;
        writer.put_bits(VP8L_IMAGE_SIZE_BITS, (self.height - 1) as u32)?;
        writer.put_bit(self.has_alpha())?;
        writer.put_bits(VP8L_VERSION_BITS, 0)
    }

    /// Choose parameters for `kind` given the pixels it will see
    ///
    /// Returns `None` if the transform does not apply.
    fn plan_transform(
        &self, kind: TransformType, width: usize, pixels: &[u32]
    ) -> Option<Transform> {
        let height = self.height;

        match kind {
            TransformType::Predictor => {
                let bits = self.options.get_predictor_bits();
                let modes = match self.options.get_predictor() {
                    PredictorChoice::Auto => choose_modes(bits, width, height, pixels),
                    PredictorChoice::Fixed(mode) => {
                        let tiles = subsample_size(width, bits) * subsample_size(height, bits);
                        vec![mode.to_pixel(); tiles]
                    }
                };
                Some(Transform::Predictor { bits, modes })
            }
            TransformType::CrossColor => {
                let bits = self.options.get_cross_color_bits();

                Some(Transform::CrossColor {
                    bits,
                    multipliers: choose_multipliers(bits, width, height, pixels)
                })
            }
            TransformType::SubtractGreen => Some(Transform::SubtractGreen),
            TransformType::ColorIndexing => collect_palette(pixels).map(|palette| {
                Transform::ColorIndexing {
                    bits: bits_for_palette_size(palette.len()),
                    palette
                }
            })
        }
    }

    fn write_transform(
        &self, writer: &mut BitWriter, transform: &Transform, width: usize
    ) -> Result<(), WebpErrors> {
        writer.put_bit(true)?;
        writer.put_bits(2, transform.kind().to_code())?;

        match transform {
            Transform::Predictor { bits, modes: image }
            | Transform::CrossColor {
                bits,
                multipliers: image
            } => {
                writer.put_bits(3, u32::from(bits - MIN_TRANSFORM_BITS))?;
                write_image_data(
                    writer,
                    image,
                    subsample_size(width, *bits),
                    subsample_size(self.height, *bits),
                    false,
                    &self.options
                )
            }
            Transform::SubtractGreen => Ok(()),
            Transform::ColorIndexing { palette, .. } => {
                writer.put_bits(8, (palette.len() - 1) as u32)?;
                write_image_data(
                    writer,
                    &delta_encode_palette(palette),
                    palette.len(),
                    1,
                    false,
                    &self.options
                )
            }
        }
    }

    /// Encode into a VP8L bitstream, header included
    pub fn encode(&self) -> Result<Vec<u8>, WebpErrors> {
        if self.width == 0 || self.width > VP8L_MAX_DIMENSION {
            return Err(WebpErrors::TooLargeDimensions(self.width, VP8L_MAX_DIMENSION));
        }
        if self.height == 0 || self.height > VP8L_MAX_DIMENSION {
            return Err(WebpErrors::TooLargeDimensions(self.height, VP8L_MAX_DIMENSION));
        }
        let expected = self.width * self.height;

        if self.pixels.len() != expected {
            return Err(WebpErrors::LengthMismatch(expected, self.pixels.len()));
        }

        let mut writer = BitWriter::new();
        self.write_header(&mut writer)?;

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(expected)
            .map_err(|_| WebpErrors::AllocationFailure(expected * 4))?;
        pixels.extend_from_slice(self.pixels);

        let mut width = self.width;

        for &kind in self.options.get_transforms() {
            let Some(transform) = self.plan_transform(kind, width, &pixels) else {
                trace!("Skipping transform {:?}", kind);
                continue;
            };
            trace!("Transform {:?} on {}x{} pixels", kind, width, self.height);

            self.write_transform(&mut writer, &transform, width)?;
            transform.forward(width, self.height, &mut pixels)?;
            width = transform.transformed_width(width);
        }
        writer.put_bit(false)?;

        write_image_data(&mut writer, &pixels, width, self.height, true, &self.options)?;

        writer.finish()
    }
}

/// Encode packed ARGB pixels into a VP8L bitstream
pub fn encode_vp8l(
    pixels: &[u32], width: usize, height: usize, options: &LosslessOptions
) -> Result<Vec<u8>, WebpErrors> {
    LosslessEncoder::new(pixels, width, height, options.clone()).encode()
}

#[cfg(test)]
mod tests {
    use nanorand::{Rng, WyRand};
    use zune_core::options::DecoderOptions;

    use super::{backward_references, encode_vp8l, prefix_encode, Symbol};
    use crate::bitstream::BitReader;
    use crate::errors::WebpErrors;
    use crate::lossless::decoder::{decode_vp8l, plane_code_to_distance};
    use crate::options::{LosslessOptions, PredictorChoice};
    use crate::transforms::predictor::PredictorMode;
    use crate::transforms::TransformType;

    fn decode(bytes: &[u8]) -> Vec<u32> {
        decode_vp8l(bytes, DecoderOptions::default()).unwrap().1
    }

    #[test]
    fn prefix_codes_invert() {
        for value in 1..=4096 {
            let (symbol, bits, extra) = prefix_encode(value);
            assert!(symbol < 24, "{value}");
            assert!(extra < (1 << bits));

            // same arithmetic the decoder uses
            let decoded = if symbol < 4 {
                symbol + 1
            } else {
                let extra_bits = (symbol - 2) >> 1;
                ((2 + (symbol & 1)) << extra_bits) + extra as usize + 1
            };
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn copy_codes_point_at_neighbours() {
        assert_eq!(plane_code_to_distance(13, super::PLANE_CODE_LEFT), 1);
        assert_eq!(plane_code_to_distance(13, super::PLANE_CODE_ABOVE), 13);
    }

    #[test]
    fn runs_become_copies() {
        let pixels = [7_u32; 10];
        let symbols = backward_references(&pixels, 5, true, 0).unwrap();

        assert_eq!(
            symbols,
            [
                Symbol::Literal(7),
                Symbol::Copy {
                    length:     9,
                    plane_code: 2
                }
            ]
        );
        let cached = backward_references(&[1, 2, 1, 2], 4, false, 4).unwrap();
        assert!(matches!(cached[2], Symbol::CacheIndex(_)));
        assert!(matches!(cached[3], Symbol::CacheIndex(_)));
    }

    #[test]
    fn every_effort_round_trips() {
        let mut rng = WyRand::new_seed(3);
        let (width, height) = (23, 17);

        // smooth gradient with noise and a few repeated stretches
        let pixels: Vec<u32> = (0..width * height)
            .map(|i| {
                let (x, y) = ((i % width) as u32, (i / width) as u32);
                if y % 5 == 0 {
                    return 0xff80_8080;
                }
                let noise = rng.generate_range(0_u32..4);
                0xff00_0000 | ((x * 9 + noise) << 16) | ((y * 11) << 8) | (x + y + noise)
            })
            .collect();

        for effort in 0..=9 {
            let options = LosslessOptions::from_effort(effort);
            let bytes = encode_vp8l(&pixels, width, height, &options).unwrap();
            assert_eq!(decode(&bytes), pixels, "effort {effort}");
        }
    }

    #[test]
    fn random_pixels_round_trip() {
        let mut rng = WyRand::new_seed(99);

        for (width, height) in [(1, 1), (1, 9), (9, 1), (64, 3), (31, 31)] {
            let pixels: Vec<u32> = (0..width * height).map(|_| rng.generate()).collect();

            let options = LosslessOptions::default()
                .set_predictor(PredictorChoice::Fixed(PredictorMode::Select))
                .set_entropy_bits(Some(2));
            let bytes = encode_vp8l(&pixels, width, height, &options).unwrap();

            assert_eq!(decode(&bytes), pixels, "{width}x{height}");
        }
    }

    #[test]
    fn small_palettes_pack() {
        for colors in [1_u32, 2, 3, 5, 16, 17, 256] {
            let (width, height) = (19, 5);
            let pixels: Vec<u32> = (0..(width * height) as u32)
                .map(|i| 0xff00_0000 | ((i * 31) % colors) * 0x0001_0203)
                .collect();

            let options = LosslessOptions::default()
                .set_transforms(&[TransformType::ColorIndexing])
                .set_color_cache_bits(0);
            let bytes = encode_vp8l(&pixels, width, height, &options).unwrap();

            assert_eq!(decode(&bytes), pixels, "{colors} colors");
        }
    }

    #[test]
    fn alpha_hint_is_written() {
        let opaque = encode_vp8l(&[0xff00_0000; 4], 2, 2, &LosslessOptions::default()).unwrap();
        let clear = encode_vp8l(&[0x0000_0000; 4], 2, 2, &LosslessOptions::default()).unwrap();

        let alpha_bit = |bytes: &[u8]| {
            let mut reader = BitReader::new(&bytes[1..]);
            reader.read_bits(28);
            reader.read_bit()
        };
        assert!(!alpha_bit(&opaque));
        assert!(alpha_bit(&clear));
    }

    #[test]
    fn bad_dimensions() {
        let options = LosslessOptions::default();

        assert!(matches!(
            encode_vp8l(&[], 0, 1, &options),
            Err(WebpErrors::TooLargeDimensions(0, _))
        ));
        assert!(matches!(
            encode_vp8l(&[0; 3], 2, 2, &options),
            Err(WebpErrors::LengthMismatch(4, 3))
        ));
    }
}
