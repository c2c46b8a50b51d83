/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Color indexing
//!
//! Images with at most 256 colors store indices into a palette in the
//! green channel, small palettes pack several indices per pixel with
//! the first pixel in the lowest bits.

use alloc::vec;
use alloc::vec::Vec;

use crate::constants::subsample_size;
use crate::errors::WebpErrors;
use crate::transforms::predictor::{add_pixels, sub_pixels};

/// Largest palette the transform can describe
pub const MAX_PALETTE_SIZE: usize = 256;

/// Log2 of the number of indices packed into one pixel for a palette
/// of `num_colors` entries
pub const fn bits_for_palette_size(num_colors: usize) -> u8 {
    if num_colors > 16 {
        0
    } else if num_colors > 4 {
        1
    } else if num_colors > 2 {
        2
    } else {
        3
    }
}

/// Collect the distinct colors of `pixels`, sorted, if there are
/// no more than 256 of them
pub fn collect_palette(pixels: &[u32]) -> Option<Vec<u32>> {
    let mut palette: Vec<u32> = Vec::with_capacity(MAX_PALETTE_SIZE + 1);
    let mut last = None;

    for &pixel in pixels {
        // runs of equal pixels are common
        if last == Some(pixel) {
            continue;
        }
        last = Some(pixel);

        if let Err(pos) = palette.binary_search(&pixel) {
            if palette.len() == MAX_PALETTE_SIZE {
                return None;
            }
            palette.insert(pos, pixel);
        }
    }
    Some(palette)
}

/// Delta code a palette the way it is stored in the stream
pub fn delta_encode_palette(palette: &[u32]) -> Vec<u32> {
    let mut coded = palette.to_vec();

    for i in (1..coded.len()).rev() {
        coded[i] = sub_pixels(palette[i], palette[i - 1]);
    }
    coded
}

/// Undo delta coding and grow the palette to the size packed indices can
/// address, missing entries are transparent black
pub fn delta_decode_palette(coded: &[u32], bits: u8) -> Vec<u32> {
    let size = (1_usize << (8 >> bits)).max(coded.len());
    let mut palette = vec![0_u32; size];

    palette[..coded.len()].copy_from_slice(coded);

    for i in 1..coded.len() {
        palette[i] = add_pixels(palette[i], palette[i - 1]);
    }
    palette
}

/// Pack palette `indices` of a `width` x `height` image, `1 << bits`
/// per pixel
pub fn pack_indices(indices: &[u8], width: usize, height: usize, bits: u8) -> Vec<u32> {
    let packed_width = subsample_size(width, bits);
    let mut packed = vec![0xff00_0000_u32; packed_width * height];

    if bits == 0 {
        for (dst, &index) in packed.iter_mut().zip(indices) {
            *dst |= u32::from(index) << 8;
        }
        return packed;
    }
    let bit_depth = 1_u32 << (3 - bits);
    let mask = (1_usize << bits) - 1;

    for (src, dst) in indices
        .chunks_exact(width)
        .zip(packed.chunks_exact_mut(packed_width))
    {
        for (x, &index) in src.iter().enumerate() {
            let shift = 8 + bit_depth * (x & mask) as u32;
            dst[x >> bits] |= u32::from(index) << shift;
        }
    }
    packed
}

/// Expand packed indices of a `width` x `height` image through `palette`
///
/// Indices past the end of `palette` give transparent black.
pub fn unpack_indices(
    packed: &[u32], palette: &[u32], width: usize, height: usize, bits: u8
) -> Result<Vec<u32>, WebpErrors> {
    let packed_width = subsample_size(width, bits);
    let size = width * height;

    let mut output = Vec::new();
    output
        .try_reserve_exact(size)
        .map_err(|_| WebpErrors::AllocationFailure(size * 4))?;

    if width == 0 {
        return Ok(output);
    }

    if packed.len() < packed_width * height {
        return Err(WebpErrors::LengthMismatch(packed_width * height, packed.len()));
    }
    let bits_per_pixel = 8 >> bits;
    let pixels_per_byte = 1_usize << bits;
    let bit_mask = (1_u32 << bits_per_pixel) - 1;

    let mut table = [0_u32; 256];
    let used = palette.len().min(table.len());
    table[..used].copy_from_slice(&palette[..used]);

    for row in packed.chunks_exact(packed_width).take(height) {
        for (x, &pixel) in row.iter().enumerate() {
            let mut indices = (pixel >> 8) & 0xff;
            let count = pixels_per_byte.min(width - x * pixels_per_byte);

            for _ in 0..count {
                output.push(table[(indices & bit_mask) as usize]);
                indices >>= bits_per_pixel;
            }
        }
    }
    Ok(output)
}

/// Map every pixel to its index in a sorted `palette`
pub fn index_pixels(pixels: &[u32], palette: &[u32]) -> Result<Vec<u8>, WebpErrors> {
    pixels
        .iter()
        .map(|pixel| {
            palette
                .binary_search(pixel)
                .map(|index| index as u8)
                .map_err(|_| WebpErrors::CorruptData("Pixel missing from palette"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_bit_widths() {
        assert_eq!(bits_for_palette_size(2), 3);
        assert_eq!(bits_for_palette_size(3), 2);
        assert_eq!(bits_for_palette_size(4), 2);
        assert_eq!(bits_for_palette_size(5), 1);
        assert_eq!(bits_for_palette_size(16), 1);
        assert_eq!(bits_for_palette_size(17), 0);
        assert_eq!(bits_for_palette_size(256), 0);
    }

    #[test]
    fn packs_little_end_first() {
        // 2 bits per index, 4 per pixel
        let indices = [1, 2, 3, 0, 2];
        let packed = pack_indices(&indices, 5, 1, 2);

        assert_eq!(packed.len(), 2);
        assert_eq!((packed[0] >> 8) & 0xff, 0b00_11_10_01);
        assert_eq!((packed[1] >> 8) & 0xff, 0b10);
        assert_eq!(packed[0] >> 24, 0xff);
    }

    #[test]
    fn palette_too_large() {
        let pixels: Vec<u32> = (0..257).collect();
        assert!(collect_palette(&pixels).is_none());
        assert_eq!(collect_palette(&pixels[..256]).map(|p| p.len()), Some(256));
    }

    #[test]
    fn delta_coding_round_trips() {
        let palette = [0xff00_0000, 0xff10_2030, 0x0010_2030, 0xffff_ffff];
        let coded = delta_encode_palette(&palette);
        let decoded = delta_decode_palette(&coded, bits_for_palette_size(4));

        assert_eq!(decoded.len(), 4);
        assert_eq!(&decoded[..4], &palette);

        let padded = delta_decode_palette(&coded, 0);
        assert_eq!(padded.len(), 256);
        assert!(padded[4..].iter().all(|&p| p == 0));
    }

    #[test]
    fn short_palette_reads_transparent_black() {
        // 2 bits per index, index 1 and 3 point past a one entry palette
        let packed = [0xff00_0000 | (0b11_00_01_00 << 8)];
        let pixels = unpack_indices(&packed, &[0xff12_3456], 4, 1, 2).unwrap();

        assert_eq!(pixels, [0xff12_3456, 0, 0xff12_3456, 0]);

        let two = [0xff00_0000, 0xffff_ffff];
        assert_eq!(
            unpack_indices(&[0x0000_ff00], &two, 4, 1, 2).unwrap(),
            [0, 0, 0, 0]
        );
        assert!(matches!(
            unpack_indices(&[], &two, 4, 1, 2),
            Err(WebpErrors::LengthMismatch(1, 0))
        ));
    }

    #[test]
    fn every_width_round_trips() {
        for num_colors in [2_usize, 3, 11, 200] {
            let palette: Vec<u32> = (0..num_colors as u32).map(|i| i * 0x0103_0507).collect();
            let bits = bits_for_palette_size(num_colors);

            for width in 1..20 {
                let height = 3;
                let indices: Vec<u8> = (0..width * height)
                    .map(|i| ((i * 7 + 3) % num_colors) as u8)
                    .collect();

                let packed = pack_indices(&indices, width, height, bits);
                let full = delta_decode_palette(&delta_encode_palette(&palette), bits);
                let pixels = unpack_indices(&packed, &full, width, height, bits).unwrap();

                let expected: Vec<u32> = indices.iter().map(|&i| palette[usize::from(i)]).collect();
                assert_eq!(pixels, expected);
                assert_eq!(index_pixels(&expected, &palette).unwrap(), indices);
            }
        }
    }
}
