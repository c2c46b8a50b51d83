/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use alloc::vec;
use alloc::vec::Vec;

use log::{trace, warn};
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;

use crate::constants::VP8L_MAGIC;
use crate::errors::WebpErrors;
use crate::lossless::{LosslessDecoder, Vp8lHeader};
use crate::mux::{ChunkId, Mux};
use crate::mux::{is_webp_container, riff_payload};

/// A lossless webp decoder
///
/// Accepts either a complete `RIFF` file or a bare `VP8L` bitstream.
/// Animated files decode their first frame.
///
/// # Example
/// ```
/// use zune_webp::{encode_lossless, LosslessOptions, WebpDecoder};
///
/// let vp8l = encode_lossless(&[0xff11_2233; 6], 3, 2, &LosslessOptions::default()).unwrap();
///
/// let mut decoder = WebpDecoder::new(&vp8l);
/// let pixels = decoder.decode().unwrap();
///
/// assert_eq!(decoder.dimensions(), Some((3, 2)));
/// assert_eq!(&pixels[..3], &[0x11, 0x22, 0x33]);
/// ```
pub struct WebpDecoder<'a> {
    data:            &'a [u8],
    // the VP8L payload, found when parsing headers
    bitstream:       &'a [u8],
    options:         DecoderOptions,
    header:          Option<Vp8lHeader>,
    num_frames:      usize,
    decoded_headers: bool
}

impl<'a> WebpDecoder<'a> {
    /// Create a decoder with default options
    pub fn new(data: &'a [u8]) -> WebpDecoder<'a> {
        WebpDecoder::new_with_options(data, DecoderOptions::default())
    }

    /// Create a decoder obeying the limits in `options`
    pub fn new_with_options(data: &'a [u8], options: DecoderOptions) -> WebpDecoder<'a> {
        WebpDecoder {
            data,
            bitstream: &[],
            options,
            header: None,
            num_frames: 0,
            decoded_headers: false
        }
    }

    /// Locate the image bitstream and read its header
    pub fn decode_headers(&mut self) -> Result<(), WebpErrors> {
        if self.decoded_headers {
            return Ok(());
        }
        if is_webp_container(self.data) {
            let riff = riff_payload(self.data)?;

            if riff.len() < self.data.len() {
                if self.options.get_strict_mode() {
                    return Err(WebpErrors::CorruptData("Data after the RIFF chunk"));
                }
                warn!(
                    "{} bytes after the RIFF chunk, ignoring",
                    self.data.len() - riff.len()
                );
            }
            let mux = Mux::create(riff, false)?;
            let (id, bitstream) = mux.borrowed_bitstream(1)?;

            if id != ChunkId::VP8L {
                return Err(WebpErrors::GenericStatic(
                    "Lossy (VP8) bitstreams are not supported"
                ));
            }
            self.num_frames = mux.num_frames();
            self.bitstream = bitstream;

            trace!("Container with {} frames", self.num_frames);
        } else if self.data.first() == Some(&VP8L_MAGIC) {
            self.bitstream = self.data;
            self.num_frames = 1;
        } else {
            return Err(WebpErrors::CorruptData(
                "Neither a RIFF container nor a VP8L bitstream"
            ));
        }
        let mut decoder = LosslessDecoder::new_with_options(self.bitstream, self.options);
        decoder.decode_headers()?;

        self.header = decoder.header();
        self.decoded_headers = true;

        Ok(())
    }

    /// Width and height, `None` before headers are decoded
    pub fn dimensions(&self) -> Option<(usize, usize)> {
        self.header.map(|h| (h.width, h.height))
    }

    /// Colorspace [`decode`](Self::decode) returns
    ///
    /// RGBA if the bitstream hints at alpha, RGB otherwise.
    pub fn colorspace(&self) -> Option<ColorSpace> {
        self.header.map(|h| {
            if h.has_alpha {
                ColorSpace::RGBA
            } else {
                ColorSpace::RGB
            }
        })
    }

    /// Number of frames in the file, one for still images
    pub const fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Bytes needed by [`decode_into`](Self::decode_into)
    pub fn output_buffer_size(&self) -> Option<usize> {
        let (width, height) = self.dimensions()?;
        let colorspace = self.colorspace()?;

        width
            .checked_mul(height)?
            .checked_mul(colorspace.num_components())
    }

    /// Decode into packed `0xAARRGGBB` pixels
    pub fn decode_argb(&mut self) -> Result<Vec<u32>, WebpErrors> {
        self.decode_headers()?;

        LosslessDecoder::new_with_options(self.bitstream, self.options).decode_argb()
    }

    /// Decode into interleaved RGBA or RGB bytes, see [`colorspace`](Self::colorspace)
    pub fn decode(&mut self) -> Result<Vec<u8>, WebpErrors> {
        self.decode_headers()?;

        let size = self
            .output_buffer_size()
            .ok_or(WebpErrors::GenericStatic("Image size overflows"))?;
        let mut out = vec![0; size];

        self.decode_into(&mut out)?;

        Ok(out)
    }

    /// Decode into `out`, which must hold at least
    /// [`output_buffer_size`](Self::output_buffer_size) bytes
    pub fn decode_into(&mut self, out: &mut [u8]) -> Result<(), WebpErrors> {
        self.decode_headers()?;

        let size = self
            .output_buffer_size()
            .ok_or(WebpErrors::GenericStatic("Image size overflows"))?;

        if out.len() < size {
            return Err(WebpErrors::LengthMismatch(size, out.len()));
        }
        let pixels = self.decode_argb()?;

        match self.colorspace() {
            Some(ColorSpace::RGBA) => argb_to_rgba(&pixels, &mut out[..size]),
            _ => argb_to_rgb(&pixels, &mut out[..size])
        }
        Ok(())
    }
}

/// Unpack `0xAARRGGBB` pixels into RGBA bytes
pub fn argb_to_rgba(pixels: &[u32], out: &mut [u8]) {
    for (pixel, chunk) in pixels.iter().zip(out.chunks_exact_mut(4)) {
        let [b, g, r, a] = pixel.to_le_bytes();
        chunk.copy_from_slice(&[r, g, b, a]);
    }
}

/// Unpack `0xAARRGGBB` pixels into RGB bytes, dropping alpha
pub fn argb_to_rgb(pixels: &[u32], out: &mut [u8]) {
    for (pixel, chunk) in pixels.iter().zip(out.chunks_exact_mut(3)) {
        let [b, g, r, _] = pixel.to_le_bytes();
        chunk.copy_from_slice(&[r, g, b]);
    }
}

/// Unpack `0xAARRGGBB` pixels into BGRA bytes
pub fn argb_to_bgra(pixels: &[u32], out: &mut [u8]) {
    for (pixel, chunk) in pixels.iter().zip(out.chunks_exact_mut(4)) {
        chunk.copy_from_slice(&pixel.to_le_bytes());
    }
}

/// Decode a lossless webp file or `VP8L` bitstream into its
/// width, height and `0xAARRGGBB` pixels
pub fn decode_lossless(data: &[u8]) -> Result<(usize, usize, Vec<u32>), WebpErrors> {
    let mut decoder = WebpDecoder::new(data);
    let pixels = decoder.decode_argb()?;
    let (width, height) = decoder
        .dimensions()
        .ok_or(WebpErrors::GenericStatic("Headers not decoded"))?;

    Ok((width, height, pixels))
}

#[cfg(test)]
mod tests {
    use zune_core::colorspace::ColorSpace;
    use zune_core::options::DecoderOptions;

    use super::{argb_to_bgra, argb_to_rgb, decode_lossless, WebpDecoder};
    use crate::errors::WebpErrors;
    use crate::lossless::encode_vp8l;
    use crate::mux::{AnimParams, FrameInfo, Mux};
    use crate::options::LosslessOptions;

    fn gradient(width: usize, height: usize) -> Vec<u32> {
        (0..width * height)
            .map(|i| 0x8000_0000 | ((i as u32 * 7) & 0xff) << 8 | (i as u32 & 0xff))
            .collect()
    }

    #[test]
    fn container_and_bare_bitstream() {
        let pixels = gradient(9, 5);
        let vp8l = encode_vp8l(&pixels, 9, 5, &LosslessOptions::default()).unwrap();

        let mut mux = Mux::new();
        mux.set_image(&vp8l, false).unwrap();
        let file = mux.assemble().unwrap();

        assert_eq!(decode_lossless(&vp8l).unwrap(), (9, 5, pixels.clone()));
        assert_eq!(decode_lossless(&file).unwrap(), (9, 5, pixels));
    }

    #[test]
    fn rgba_output() {
        let pixels = [0x8011_2233, 0xff44_5566];
        let vp8l = encode_vp8l(&pixels, 2, 1, &LosslessOptions::default()).unwrap();

        let mut decoder = WebpDecoder::new(&vp8l);
        let out = decoder.decode().unwrap();

        assert_eq!(decoder.colorspace(), Some(ColorSpace::RGBA));
        assert_eq!(out, [0x11, 0x22, 0x33, 0x80, 0x44, 0x55, 0x66, 0xff]);
    }

    #[test]
    fn conversions() {
        let pixels = [0x0102_0304];
        let mut rgb = [0; 3];
        let mut bgra = [0; 4];

        argb_to_rgb(&pixels, &mut rgb);
        argb_to_bgra(&pixels, &mut bgra);

        assert_eq!(rgb, [2, 3, 4]);
        assert_eq!(bgra, [4, 3, 2, 1]);
    }

    #[test]
    fn first_frame_of_animation() {
        let a = encode_vp8l(&[0xff00_00ff; 4], 2, 2, &LosslessOptions::default()).unwrap();
        let b = encode_vp8l(&[0xffff_0000; 4], 2, 2, &LosslessOptions::default()).unwrap();

        let mut mux = Mux::new();
        mux.set_animation_params(AnimParams::default()).unwrap();
        mux.push_frame(&a, FrameInfo::default(), false).unwrap();
        mux.push_frame(&b, FrameInfo::default(), false).unwrap();
        let file = mux.assemble().unwrap();

        let mut decoder = WebpDecoder::new(&file);
        assert_eq!(decoder.decode_argb().unwrap(), [0xff00_00ff; 4]);
        assert_eq!(decoder.num_frames(), 2);
    }

    #[test]
    fn limits_and_strictness() {
        let vp8l = encode_vp8l(&gradient(20, 2), 20, 2, &LosslessOptions::default()).unwrap();

        let options = DecoderOptions::default().set_max_width(10);
        let mut decoder = WebpDecoder::new_with_options(&vp8l, options);
        assert!(matches!(
            decoder.decode_headers(),
            Err(WebpErrors::TooLargeDimensions(20, 10))
        ));

        let mut mux = Mux::new();
        mux.set_image(&vp8l, false).unwrap();
        let mut file = mux.assemble().unwrap();
        file.extend_from_slice(b"junk");

        assert!(WebpDecoder::new(&file).decode().is_ok());

        let strict = DecoderOptions::default().set_strict_mode(true);
        assert!(WebpDecoder::new_with_options(&file, strict)
            .decode()
            .is_err());

        assert!(matches!(
            WebpDecoder::new(b"GIF89a").decode_headers(),
            Err(WebpErrors::CorruptData(_))
        ));
    }
}
