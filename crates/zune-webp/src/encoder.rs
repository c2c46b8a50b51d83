/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use alloc::vec::Vec;

use log::trace;
use zune_core::bit_depth::BitDepth;
use zune_core::colorspace::ColorSpace;
use zune_core::options::EncoderOptions;

use crate::errors::WebpErrors;
use crate::lossless::encode_vp8l;
use crate::mux::Mux;
use crate::options::LosslessOptions;

/// A lossless webp encoder
///
/// Input is 8 bit RGB, RGBA or ARGB. Metadata added with the setters
/// ends up in `ICCP`, `EXIF` and `XMP ` chunks of the output file.
///
/// # Example
/// ```
/// use zune_core::bit_depth::BitDepth;
/// use zune_core::colorspace::ColorSpace;
/// use zune_core::options::EncoderOptions;
/// use zune_webp::{WebpDecoder, WebpEncoder};
///
/// let pixels = [255_u8; 4 * 4 * 3];
/// let options = EncoderOptions::new(4, 4, ColorSpace::RGB, BitDepth::Eight);
///
/// let file = WebpEncoder::new(&pixels, options).encode().unwrap();
/// let decoded = WebpDecoder::new(&file).decode().unwrap();
/// assert_eq!(decoded, pixels);
/// ```
pub struct WebpEncoder<'a> {
    data:     &'a [u8],
    options:  EncoderOptions,
    lossless: Option<LosslessOptions>,
    icc:      Option<&'a [u8]>,
    exif:     Option<&'a [u8]>,
    xmp:      Option<&'a [u8]>
}

impl<'a> WebpEncoder<'a> {
    pub fn new(data: &'a [u8], options: EncoderOptions) -> WebpEncoder<'a> {
        WebpEncoder {
            data,
            options,
            lossless: None,
            icc: None,
            exif: None,
            xmp: None
        }
    }

    /// Override the transform pipeline, otherwise derived from the effort
    pub fn set_lossless_options(&mut self, options: LosslessOptions) {
        self.lossless = Some(options);
    }

    pub fn set_icc_profile(&mut self, icc: &'a [u8]) {
        self.icc = Some(icc);
    }

    pub fn set_exif(&mut self, exif: &'a [u8]) {
        self.exif = Some(exif);
    }

    pub fn set_xmp(&mut self, xmp: &'a [u8]) {
        self.xmp = Some(xmp);
    }

    /// Pack the input into `0xAARRGGBB` pixels
    fn to_argb(&self) -> Result<Vec<u32>, WebpErrors> {
        let colorspace = self.options.get_colorspace();

        if self.options.get_depth() != BitDepth::Eight {
            return Err(WebpErrors::GenericStatic("Only 8 bit images can be encoded"));
        }
        let components = match colorspace {
            ColorSpace::RGB => 3,
            ColorSpace::RGBA | ColorSpace::ARGB => 4,
            _ => return Err(WebpErrors::UnsupportedColorspace(colorspace))
        };
        let pixels = self.options.get_width() * self.options.get_height();
        let expected = pixels * components;

        if self.data.len() != expected {
            return Err(WebpErrors::LengthMismatch(expected, self.data.len()));
        }
        let mut out = Vec::new();
        out.try_reserve_exact(pixels)
            .map_err(|_| WebpErrors::AllocationFailure(pixels * 4))?;

        let chunks = self.data.chunks_exact(components);

        match colorspace {
            ColorSpace::RGB => {
                out.extend(chunks.map(|c| u32::from_be_bytes([0xff, c[0], c[1], c[2]])));
            }
            ColorSpace::RGBA => {
                out.extend(chunks.map(|c| u32::from_be_bytes([c[3], c[0], c[1], c[2]])));
            }
            _ => {
                out.extend(chunks.map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]])));
            }
        }
        Ok(out)
    }

    /// Encode into a complete webp file
    pub fn encode(&self) -> Result<Vec<u8>, WebpErrors> {
        let pixels = self.to_argb()?;
        let options = self
            .lossless
            .clone()
            .unwrap_or_else(|| LosslessOptions::from_effort(self.options.get_effort()));

        let vp8l = encode_vp8l(
            &pixels,
            self.options.get_width(),
            self.options.get_height(),
            &options
        )?;
        trace!("VP8L bitstream: {} bytes", vp8l.len());

        let mut mux = Mux::new();
        mux.set_image(&vp8l, false)?;

        for (tag, data) in [(*b"ICCP", self.icc), (*b"EXIF", self.exif), (*b"XMP ", self.xmp)] {
            if let Some(data) = data {
                mux.set_chunk(tag, data, false)?;
            }
        }
        Ok(mux.assemble()?)
    }
}

/// Encode `0xAARRGGBB` pixels into a bare `VP8L` bitstream
///
/// The result can be stored in a container with [`Mux::set_image`].
pub fn encode_lossless(
    pixels: &[u32], width: usize, height: usize, options: &LosslessOptions
) -> Result<Vec<u8>, WebpErrors> {
    encode_vp8l(pixels, width, height, options)
}

#[cfg(test)]
mod tests {
    use zune_core::bit_depth::BitDepth;
    use zune_core::colorspace::ColorSpace;
    use zune_core::options::EncoderOptions;

    use super::WebpEncoder;
    use crate::decoder::{decode_lossless, WebpDecoder};
    use crate::errors::WebpErrors;
    use crate::mux::{Features, Mux};

    #[test]
    fn rgba_round_trip() {
        let pixels: Vec<u8> = (0..5 * 3 * 4).map(|i| (i * 13) as u8).collect();
        let options = EncoderOptions::new(5, 3, ColorSpace::RGBA, BitDepth::Eight);

        let file = WebpEncoder::new(&pixels, options).encode().unwrap();
        let mut decoder = WebpDecoder::new(&file);

        assert_eq!(decoder.decode().unwrap(), pixels);
        assert_eq!(decoder.colorspace(), Some(ColorSpace::RGBA));
    }

    #[test]
    fn argb_input() {
        let pixels = [0xff, 1, 2, 3, 0x40, 4, 5, 6];
        let options = EncoderOptions::new(2, 1, ColorSpace::ARGB, BitDepth::Eight);

        let file = WebpEncoder::new(&pixels, options).encode().unwrap();

        assert_eq!(
            decode_lossless(&file).unwrap(),
            (2, 1, vec![0xff01_0203, 0x4004_0506])
        );
    }

    #[test]
    fn metadata_is_stored() {
        let pixels = [0_u8; 3];
        let options = EncoderOptions::new(1, 1, ColorSpace::RGB, BitDepth::Eight);

        let mut encoder = WebpEncoder::new(&pixels, options);
        encoder.set_exif(b"Exif\0\0");
        encoder.set_icc_profile(b"icc");

        let file = encoder.encode().unwrap();
        let mux = Mux::create(&file, false).unwrap();

        assert_eq!(mux.get_chunk(*b"EXIF"), Ok(&b"Exif\0\0"[..]));
        assert_eq!(mux.get_chunk(*b"ICCP"), Ok(&b"icc"[..]));
        assert!(mux.get_features().unwrap().contains(Features::EXIF));
    }

    #[test]
    fn rejects_bad_input() {
        let options = EncoderOptions::new(2, 2, ColorSpace::Luma, BitDepth::Eight);
        assert!(matches!(
            WebpEncoder::new(&[0; 4], options).encode(),
            Err(WebpErrors::UnsupportedColorspace(ColorSpace::Luma))
        ));

        let options = EncoderOptions::new(2, 2, ColorSpace::RGB, BitDepth::Eight);
        assert!(matches!(
            WebpEncoder::new(&[0; 11], options).encode(),
            Err(WebpErrors::LengthMismatch(12, 11))
        ));
    }
}
