/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! VP8L bitstream decoding
use alloc::vec;
use alloc::vec::Vec;

use log::{trace, warn};
use zune_core::options::DecoderOptions;

use crate::bitstream::BitReader;
use crate::constants::{
    subsample_size, ALPHABET_SIZE, ALPHA, BLUE, CODE_TO_PLANE_CODES, DISTANCE_MAP, DIST, GREEN,
    MIN_HUFFMAN_BITS, MIN_TRANSFORM_BITS, NUM_HUFFMAN_BITS, NUM_LENGTH_CODES, NUM_LITERAL_CODES,
    NUM_TRANSFORM_BITS, RED, VP8L_HEADER_SIZE, VP8L_IMAGE_SIZE_BITS, VP8L_MAGIC, VP8L_VERSION_BITS
};
use crate::errors::WebpErrors;
use crate::huffman::{read_huffman_code, HuffmanTable};
use crate::lossless::color_cache::ColorCache;
use crate::transforms::dsp::{select_dsp, LosslessDsp};
use crate::transforms::palette::{bits_for_palette_size, delta_decode_palette};
use crate::transforms::{Transform, TransformType};

/// Fields of the five byte VP8L header
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Vp8lHeader {
    pub width:     usize,
    pub height:    usize,
    /// Hint that some pixel may not be opaque
    pub has_alpha: bool
}

/// Parse the VP8L header at the start of `data`
pub fn read_header(data: &[u8]) -> Result<Vp8lHeader, WebpErrors> {
    if data.len() < VP8L_HEADER_SIZE {
        return Err(WebpErrors::TruncatedStream(VP8L_HEADER_SIZE, data.len()));
    }
    if data[0] != VP8L_MAGIC {
        return Err(WebpErrors::CorruptData("Missing VP8L signature byte"));
    }
    let mut reader = BitReader::new(&data[1..VP8L_HEADER_SIZE]);

    let width = reader.read_bits(VP8L_IMAGE_SIZE_BITS) as usize + 1;
    let height = reader.read_bits(VP8L_IMAGE_SIZE_BITS) as usize + 1;
    let has_alpha = reader.read_bit();
    let version = reader.read_bits(VP8L_VERSION_BITS);

    if version != 0 {
        return Err(WebpErrors::UnsupportedVersion(version));
    }
    Ok(Vp8lHeader {
        width,
        height,
        has_alpha
    })
}

/// Prefix codes used for one group of tiles
struct PrefixCodeGroup {
    green:    HuffmanTable,
    red:      HuffmanTable,
    blue:     HuffmanTable,
    alpha:    HuffmanTable,
    distance: HuffmanTable
}

/// All prefix code groups of an image level and the
/// entropy image selecting between them
struct PrefixCodes {
    groups:        Vec<PrefixCodeGroup>,
    // dense group index per tile, empty when there is a single group
    entropy_image: Vec<u32>,
    entropy_bits:  u8,
    entropy_width: usize
}

impl PrefixCodes {
    /// Mask that is zero at the first column of a tile
    fn tile_mask(&self) -> usize {
        if self.entropy_image.is_empty() {
            usize::MAX
        } else {
            (1 << self.entropy_bits) - 1
        }
    }

    #[inline]
    fn group_for(&self, x: usize, y: usize) -> &PrefixCodeGroup {
        if self.entropy_image.is_empty() {
            return &self.groups[0];
        }
        let tile = (y >> self.entropy_bits) * self.entropy_width + (x >> self.entropy_bits);

        &self.groups[self.entropy_image[tile] as usize]
    }
}

/// Decode a length or distance prefix symbol with its extra bits
#[inline]
fn copy_distance(symbol: usize, reader: &mut BitReader) -> usize {
    if symbol < 4 {
        return symbol + 1;
    }
    let extra_bits = (symbol - 2) >> 1;
    let offset = (2 + (symbol & 1)) << extra_bits;

    offset + reader.read_bits(extra_bits as u8) as usize + 1
}

/// Turn a distance code into a pixel distance for an image `xsize` wide
#[inline]
pub(crate) fn plane_code_to_distance(xsize: usize, plane_code: usize) -> usize {
    if plane_code > CODE_TO_PLANE_CODES {
        return plane_code - CODE_TO_PLANE_CODES;
    }
    let (xi, yi) = DISTANCE_MAP[plane_code - 1];
    let dist = isize::from(xi) + isize::from(yi) * xsize as isize;

    if dist >= 1 {
        dist as usize
    } else {
        1
    }
}

/// A VP8L decoder
///
/// # Example
/// ```no_run
/// use zune_webp::lossless::LosslessDecoder;
///
/// let data = std::fs::read("image.vp8l").unwrap();
/// let mut decoder = LosslessDecoder::new(&data);
/// let pixels = decoder.decode_argb().unwrap();
/// ```
pub struct LosslessDecoder<'a> {
    data:    &'a [u8],
    reader:  BitReader<'a>,
    options: DecoderOptions,
    dsp:     &'static dyn LosslessDsp,
    header:  Option<Vp8lHeader>
}

impl<'a> LosslessDecoder<'a> {
    pub fn new(data: &'a [u8]) -> LosslessDecoder<'a> {
        LosslessDecoder::new_with_options(data, DecoderOptions::default())
    }

    pub fn new_with_options(data: &'a [u8], options: DecoderOptions) -> LosslessDecoder<'a> {
        LosslessDecoder {
            data,
            reader: BitReader::new(data.get(VP8L_HEADER_SIZE..).unwrap_or(&[])),
            options,
            dsp: select_dsp(&options),
            header: None
        }
    }

    /// Read and validate the header
    ///
    /// Fails if the image is larger than the configured limits
    pub fn decode_headers(&mut self) -> Result<(), WebpErrors> {
        if self.header.is_some() {
            return Ok(());
        }
        let header = read_header(self.data)?;

        if header.width > self.options.get_max_width() {
            return Err(WebpErrors::TooLargeDimensions(
                header.width,
                self.options.get_max_width()
            ));
        }
        if header.height > self.options.get_max_height() {
            return Err(WebpErrors::TooLargeDimensions(
                header.height,
                self.options.get_max_height()
            ));
        }
        trace!("Width: {}", header.width);
        trace!("Height: {}", header.height);
        trace!("Alpha hint: {}", header.has_alpha);
        trace!("Transform kernels: {}", self.dsp.name());

        self.header = Some(header);
        Ok(())
    }

    /// Image dimensions or `None` if headers haven't been decoded
    pub fn dimensions(&self) -> Option<(usize, usize)> {
        self.header.map(|h| (h.width, h.height))
    }

    pub const fn header(&self) -> Option<Vp8lHeader> {
        self.header
    }

    /// Decode the image into packed `0xAARRGGBB` pixels in raster order
    pub fn decode_argb(&mut self) -> Result<Vec<u32>, WebpErrors> {
        self.decode_headers()?;

        let header = self
            .header
            .ok_or(WebpErrors::GenericStatic("Headers not decoded"))?;

        let pixels = self.decode_image_stream(header.width, header.height, true)?;

        let trailing = self.reader.len().saturating_sub(self.reader.bytes_consumed());

        if trailing > 0 {
            if self.options.get_strict_mode() {
                return Err(WebpErrors::CorruptData("Trailing bytes after VP8L bitstream"));
            }
            warn!("{trailing} trailing bytes after VP8L bitstream");
        }
        Ok(pixels)
    }

    fn truncated(&self) -> WebpErrors {
        WebpErrors::TruncatedStream(
            self.reader.bytes_consumed() + VP8L_HEADER_SIZE,
            self.data.len()
        )
    }

    fn decode_image_stream(
        &mut self, xsize: usize, ysize: usize, is_level0: bool
    ) -> Result<Vec<u32>, WebpErrors> {
        let mut transforms: Vec<(Transform, usize)> = Vec::new();
        let mut coded_width = xsize;

        if is_level0 {
            let mut seen = 0_u32;

            while self.reader.read_bit() {
                let transform = self.read_transform(coded_width, ysize, &mut seen)?;
                let next_width = transform.transformed_width(coded_width);

                transforms.push((transform, coded_width));
                coded_width = next_width;
            }
        }

        let cache_bits = if self.reader.read_bit() {
            let bits = self.reader.read_bits(4) as u8;
            // validated by the cache constructor
            ColorCache::new(bits)?;
            trace!("Color cache bits: {bits}");
            bits
        } else {
            0
        };

        let codes = self.read_prefix_codes(coded_width, ysize, cache_bits, is_level0)?;
        let mut pixels = self.decode_pixels(coded_width, ysize, &codes, cache_bits)?;

        for (transform, width) in transforms.iter().rev() {
            transform.inverse(self.dsp, *width, ysize, &mut pixels)?;
        }
        Ok(pixels)
    }

    fn read_transform(
        &mut self, xsize: usize, ysize: usize, seen: &mut u32
    ) -> Result<Transform, WebpErrors> {
        let kind = TransformType::from_code(self.reader.read_bits(2));

        if *seen & (1 << kind.to_code()) != 0 {
            return Err(WebpErrors::CorruptData("Transform used more than once"));
        }
        *seen |= 1 << kind.to_code();

        let transform = match kind {
            TransformType::Predictor | TransformType::CrossColor => {
                let bits = self.reader.read_bits(NUM_TRANSFORM_BITS) as u8 + MIN_TRANSFORM_BITS;
                let image = self.decode_image_stream(
                    subsample_size(xsize, bits),
                    subsample_size(ysize, bits),
                    false
                )?;
                if kind == TransformType::Predictor {
                    Transform::Predictor { bits, modes: image }
                } else {
                    Transform::CrossColor {
                        bits,
                        multipliers: image
                    }
                }
            }
            TransformType::SubtractGreen => Transform::SubtractGreen,
            TransformType::ColorIndexing => {
                let num_colors = self.reader.read_bits(8) as usize + 1;
                let bits = bits_for_palette_size(num_colors);
                let coded = self.decode_image_stream(num_colors, 1, false)?;

                Transform::ColorIndexing {
                    bits,
                    palette: delta_decode_palette(&coded, bits)
                }
            }
        };
        trace!("Transform: {:?}", kind);

        Ok(transform)
    }

    fn read_prefix_codes(
        &mut self, xsize: usize, ysize: usize, cache_bits: u8, allow_meta: bool
    ) -> Result<PrefixCodes, WebpErrors> {
        let mut entropy_image = Vec::new();
        let mut entropy_bits = 0;
        let mut entropy_width = 0;
        let mut num_groups = 1;
        let mut used = vec![true];

        if allow_meta && self.reader.read_bit() {
            entropy_bits = self.reader.read_bits(NUM_HUFFMAN_BITS) as u8 + MIN_HUFFMAN_BITS;
            entropy_width = subsample_size(xsize, entropy_bits);

            let image =
                self.decode_image_stream(entropy_width, subsample_size(ysize, entropy_bits), false)?;

            // group numbers can be sparse, give the used ones dense indices
            num_groups = image
                .iter()
                .map(|p| ((p >> 8) & 0xffff) as usize + 1)
                .max()
                .unwrap_or(1);

            used = vec![false; num_groups];
            for p in &image {
                used[((p >> 8) & 0xffff) as usize] = true;
            }
            let mut dense = vec![0_u32; num_groups];
            let mut next = 0;

            for (slot, &is_used) in dense.iter_mut().zip(&used) {
                *slot = next;
                next += u32::from(is_used);
            }
            entropy_image = image
                .iter()
                .map(|p| dense[((p >> 8) & 0xffff) as usize])
                .collect();

            trace!("Entropy image bits: {entropy_bits}, groups: {num_groups}");
        }

        let cache_size = if cache_bits > 0 { 1 << cache_bits } else { 0 };
        let mut groups = Vec::new();

        for is_used in used {
            let group = PrefixCodeGroup {
                green:    read_huffman_code(&mut self.reader, ALPHABET_SIZE[GREEN] + cache_size)?,
                red:      read_huffman_code(&mut self.reader, ALPHABET_SIZE[RED])?,
                blue:     read_huffman_code(&mut self.reader, ALPHABET_SIZE[BLUE])?,
                alpha:    read_huffman_code(&mut self.reader, ALPHABET_SIZE[ALPHA])?,
                distance: read_huffman_code(&mut self.reader, ALPHABET_SIZE[DIST])?
            };
            // unused groups still have to be read past
            if is_used {
                groups.push(group);
            }
        }

        Ok(PrefixCodes {
            groups,
            entropy_image,
            entropy_bits,
            entropy_width
        })
    }

    fn decode_pixels(
        &mut self, width: usize, height: usize, codes: &PrefixCodes, cache_bits: u8
    ) -> Result<Vec<u32>, WebpErrors> {
        let total = width * height;

        let mut data = Vec::new();
        data.try_reserve_exact(total)
            .map_err(|_| WebpErrors::AllocationFailure(total * 4))?;
        data.resize(total, 0_u32);

        let mut cache = if cache_bits > 0 {
            Some(ColorCache::new(cache_bits)?)
        } else {
            None
        };

        let mask = codes.tile_mask();
        let mut group = codes.group_for(0, 0);
        let (mut x, mut y, mut pos) = (0, 0, 0);

        while pos < total {
            if x & mask == 0 {
                group = codes.group_for(x, y);
            }
            let code = usize::from(group.green.read_symbol(&mut self.reader));

            if code < NUM_LITERAL_CODES {
                let red = u32::from(group.red.read_symbol(&mut self.reader));
                let blue = u32::from(group.blue.read_symbol(&mut self.reader));
                let alpha = u32::from(group.alpha.read_symbol(&mut self.reader));

                let argb = (alpha << 24) | (red << 16) | ((code as u32) << 8) | blue;

                data[pos] = argb;

                if let Some(cache) = cache.as_mut() {
                    cache.insert(argb);
                }
                pos += 1;
                x += 1;

                if x >= width {
                    x = 0;
                    y += 1;
                }
            } else if code < NUM_LITERAL_CODES + NUM_LENGTH_CODES {
                let length = copy_distance(code - NUM_LITERAL_CODES, &mut self.reader);
                let dist_symbol = usize::from(group.distance.read_symbol(&mut self.reader));
                let dist_code = copy_distance(dist_symbol, &mut self.reader);
                let dist = plane_code_to_distance(width, dist_code);

                if self.reader.is_eos() {
                    break;
                }
                if dist > pos || length > total - pos {
                    return Err(WebpErrors::CorruptData("Backward reference out of bounds"));
                }
                // overlapping copies repeat the pattern
                for i in pos..pos + length {
                    data[i] = data[i - dist];
                }
                if let Some(cache) = cache.as_mut() {
                    data[pos..pos + length].iter().for_each(|&p| cache.insert(p));
                }
                pos += length;
                x += length;

                while x >= width {
                    x -= width;
                    y += 1;
                }
                if pos < total {
                    group = codes.group_for(x, y);
                }
            } else {
                let key = code - NUM_LITERAL_CODES - NUM_LENGTH_CODES;
                let cache = cache
                    .as_mut()
                    .ok_or(WebpErrors::CorruptData("Color cache symbol without a cache"))?;

                let argb = cache.lookup(key);
                cache.insert(argb);
                data[pos] = argb;

                pos += 1;
                x += 1;

                if x >= width {
                    x = 0;
                    y += 1;
                }
            }

            if self.reader.is_eos() {
                break;
            }
        }

        if self.reader.is_eos() {
            return Err(self.truncated());
        }
        Ok(data)
    }
}

/// Decode a VP8L bitstream into its header and packed ARGB pixels
pub fn decode_vp8l(
    data: &[u8], options: DecoderOptions
) -> Result<(Vp8lHeader, Vec<u32>), WebpErrors> {
    let mut decoder = LosslessDecoder::new_with_options(data, options);
    let pixels = decoder.decode_argb()?;
    let header = decoder
        .header()
        .ok_or(WebpErrors::GenericStatic("Headers not decoded"))?;

    Ok((header, pixels))
}

#[cfg(test)]
mod tests {
    use zune_core::options::DecoderOptions;

    use super::{decode_vp8l, plane_code_to_distance, read_header, Vp8lHeader};
    use crate::bitstream::BitWriter;
    use crate::errors::WebpErrors;
    use crate::huffman::PrefixCode;

    #[test]
    fn parses_header() {
        // 0x2f, width 2, height 3, alpha set, version 0
        let width_minus_one = 1_u32;
        let height_minus_one = 2_u32;
        let bits = width_minus_one | (height_minus_one << 14) | (1 << 28);
        let mut data = vec![0x2f];
        data.extend_from_slice(&bits.to_le_bytes());

        assert_eq!(
            read_header(&data).unwrap(),
            Vp8lHeader {
                width:     2,
                height:    3,
                has_alpha: true
            }
        );
    }

    #[test]
    fn rejects_versions() {
        let bits = 1_u32 << 29;
        let mut data = vec![0x2f];
        data.extend_from_slice(&bits.to_le_bytes());

        assert!(matches!(
            read_header(&data),
            Err(WebpErrors::UnsupportedVersion(1))
        ));
        assert!(matches!(
            read_header(&data[..3]),
            Err(WebpErrors::TruncatedStream(5, 3))
        ));
        assert!(matches!(
            read_header(&[0x9d, 0, 0, 0, 0]),
            Err(WebpErrors::CorruptData(_))
        ));
    }

    #[test]
    fn plane_codes() {
        // first code is the pixel above
        assert_eq!(plane_code_to_distance(100, 1), 100);
        // second is the pixel to the left
        assert_eq!(plane_code_to_distance(100, 2), 1);
        // (-1, 1), up and to the right... or left
        assert_eq!(plane_code_to_distance(100, 4), 99);
        // negative distances clamp to one
        assert_eq!(plane_code_to_distance(1, 4), 1);
        // codes past the table are plain distances
        assert_eq!(plane_code_to_distance(100, 121), 1);
        assert_eq!(plane_code_to_distance(100, 500), 380);
    }

    #[test]
    fn cache_hits_are_inserted_again() {
        let mut writer = BitWriter::new();
        writer.put_bits(8, 0x2f).unwrap();
        // 3x1, no alpha, version 0
        writer.put_bits(14, 2).unwrap();
        writer.put_bits(14, 0).unwrap();
        writer.put_bits(4, 0).unwrap();
        // no transforms, two entry cache, no entropy image
        writer.put_bit(false).unwrap();
        writer.put_bit(true).unwrap();
        writer.put_bits(4, 1).unwrap();
        writer.put_bit(false).unwrap();

        // literal green 0 and cache symbols 280, 281
        let mut green = vec![0; 282];
        green[0] = 1;
        green[280] = 1;
        green[281] = 1;
        let green = PrefixCode::from_histogram(&green);

        green.write_description(&mut writer).unwrap();
        for histogram in [&[1][..], &[0, 1], &[1], &[1]] {
            PrefixCode::from_histogram(histogram)
                .write_description(&mut writer)
                .unwrap();
        }
        // 0x00000001 lands in slot 0
        green.write_symbol(&mut writer, 0).unwrap();
        // slot 1 was never written, its zero goes back into slot 0
        green.write_symbol(&mut writer, 281).unwrap();
        green.write_symbol(&mut writer, 280).unwrap();

        let data = writer.finish().unwrap();
        let (header, pixels) = decode_vp8l(&data, DecoderOptions::default()).unwrap();

        assert_eq!((header.width, header.height), (3, 1));
        assert_eq!(pixels, [1, 0, 0]);
    }
}
