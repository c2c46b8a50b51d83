/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Constants shared by the lossless codec

/// First byte of every VP8L bitstream
pub const VP8L_MAGIC: u8 = 0x2f;
/// Signature byte plus 14+14+1+3 header bits
pub const VP8L_HEADER_SIZE: usize = 5;
pub const VP8L_VERSION_BITS: u8 = 3;
pub const VP8L_IMAGE_SIZE_BITS: u8 = 14;
/// Largest width/height a VP8L header can describe
pub const VP8L_MAX_DIMENSION: usize = 1 << VP8L_IMAGE_SIZE_BITS;

pub const NUM_LITERAL_CODES: usize = 256;
pub const NUM_LENGTH_CODES: usize = 24;
pub const NUM_DISTANCE_CODES: usize = 40;
pub const NUM_CODE_LENGTH_CODES: usize = 19;
pub const MAX_COLOR_CACHE_BITS: u8 = 11;

/// Prefix codes per group, in stream order
pub const HUFFMAN_CODES_PER_META_CODE: usize = 5;
pub const GREEN: usize = 0;
pub const RED: usize = 1;
pub const BLUE: usize = 2;
pub const ALPHA: usize = 3;
pub const DIST: usize = 4;

/// Alphabet sizes for each of the five codes without the color cache
pub const ALPHABET_SIZE: [usize; HUFFMAN_CODES_PER_META_CODE] = [
    NUM_LITERAL_CODES + NUM_LENGTH_CODES,
    NUM_LITERAL_CODES,
    NUM_LITERAL_CODES,
    NUM_LITERAL_CODES,
    NUM_DISTANCE_CODES
];

pub const MAX_ALLOWED_CODE_LENGTH: usize = 15;
/// Width of the first level decode table
pub const HUFFMAN_TABLE_BITS: u8 = 8;
/// Width of the code length code decode table
pub const LENGTHS_TABLE_BITS: u8 = 7;
/// Code length codes are written with 3 bits each
pub const MAX_CODE_LENGTH_CODE_LENGTH: u8 = 7;

/// Order in which code length code lengths appear in the stream
pub const CODE_LENGTH_CODE_ORDER: [u8; NUM_CODE_LENGTH_CODES] = [
    17, 18, 0, 1, 2, 3, 4, 5, 16, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15
];
/// Code length symbols below this are literal lengths
pub const CODE_LENGTH_LITERALS: u8 = 16;
pub const CODE_LENGTH_REPEAT_CODE: u8 = 16;
pub const CODE_LENGTH_EXTRA_BITS: [u8; 3] = [2, 3, 7];
pub const CODE_LENGTH_REPEAT_OFFSETS: [u8; 3] = [3, 3, 11];
/// Repeat code 16 repeats this length when no non-zero length was seen yet
pub const DEFAULT_CODE_LENGTH: u8 = 8;

pub const MIN_TRANSFORM_BITS: u8 = 2;
pub const NUM_TRANSFORM_BITS: u8 = 3;
pub const MIN_HUFFMAN_BITS: u8 = 2;
pub const NUM_HUFFMAN_BITS: u8 = 3;

pub const ARGB_BLACK: u32 = 0xff00_0000;

pub const COLOR_CACHE_MULTIPLIER: u32 = 0x1e35_a7bd;

/// Longest match a backward reference can describe
pub const MAX_COPY_LENGTH: usize = 4096;

/// Number of distance codes that map into the 2D neighbourhood
pub const CODE_TO_PLANE_CODES: usize = 120;

/// `(x, y)` offsets for the first 120 distance codes, the
/// distance is `x + y * xsize` clamped to at least one
#[rustfmt::skip]
pub const DISTANCE_MAP: [(i8, i8); CODE_TO_PLANE_CODES] = [
    (0, 1),  (1, 0),  (1, 1),  (-1, 1), (0, 2),  (2, 0),  (1, 2),  (-1, 2),
    (2, 1),  (-2, 1), (2, 2),  (-2, 2), (0, 3),  (3, 0),  (1, 3),  (-1, 3),
    (3, 1),  (-3, 1), (2, 3),  (-2, 3), (3, 2),  (-3, 2), (0, 4),  (4, 0),
    (1, 4),  (-1, 4), (4, 1),  (-4, 1), (3, 3),  (-3, 3), (2, 4),  (-2, 4),
    (4, 2),  (-4, 2), (0, 5),  (3, 4),  (-3, 4), (4, 3),  (-4, 3), (5, 0),
    (1, 5),  (-1, 5), (5, 1),  (-5, 1), (2, 5),  (-2, 5), (5, 2),  (-5, 2),
    (4, 4),  (-4, 4), (3, 5),  (-3, 5), (5, 3),  (-5, 3), (0, 6),  (6, 0),
    (1, 6),  (-1, 6), (6, 1),  (-6, 1), (2, 6),  (-2, 6), (6, 2),  (-6, 2),
    (4, 5),  (-4, 5), (5, 4),  (-5, 4), (3, 6),  (-3, 6), (6, 3),  (-6, 3),
    (0, 7),  (7, 0),  (1, 7),  (-1, 7), (5, 5),  (-5, 5), (7, 1),  (-7, 1),
    (4, 6),  (-4, 6), (6, 4),  (-6, 4), (2, 7),  (-2, 7), (7, 2),  (-7, 2),
    (3, 7),  (-3, 7), (7, 3),  (-7, 3), (5, 6),  (-5, 6), (6, 5),  (-6, 5),
    (8, 0),  (4, 7),  (-4, 7), (7, 4),  (-7, 4), (8, 1),  (8, 2),  (6, 6),
    (-6, 6), (8, 3),  (5, 7),  (-5, 7), (7, 5),  (-7, 5), (8, 4),  (6, 7),
    (-6, 7), (7, 6),  (-7, 6), (8, 5),  (7, 7),  (-7, 7), (8, 6),  (8, 7)
];

/// Number of pixels covered by a `bits` sized tile, rounded up
#[inline]
pub const fn subsample_size(size: usize, bits: u8) -> usize {
    (size + (1 << bits) - 1) >> bits
}
