/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The RIFF container
//!
//! A webp file is a `RIFF` chunk of form type `WEBP` holding a flat
//! list of chunks. Simple files contain one `VP8 ` or `VP8L` chunk,
//! extended ones start with a `VP8X` chunk describing the canvas and
//! may add metadata, an alpha plane or animation frames.
//!
//! [`Mux`] keeps every chunk in a [`ChunkStore`] and refers to them by
//! handle, payloads are either borrowed from the caller or owned.
//!
//! # Example
//! ```
//! use zune_webp::mux::Mux;
//! use zune_webp::{encode_lossless, LosslessOptions};
//!
//! let vp8l = encode_lossless(&[0xff00_ff00; 4], 2, 2, &LosslessOptions::default()).unwrap();
//!
//! let mut mux = Mux::new();
//! mux.set_image(&vp8l, false).unwrap();
//! mux.set_chunk(*b"EXIF", b"exif payload", false).unwrap();
//!
//! let file = mux.assemble().unwrap();
//! let parsed = Mux::create(&file, false).unwrap();
//! assert_eq!(parsed.get_chunk(*b"EXIF").unwrap(), b"exif payload");
//! ```
use alloc::vec::Vec;

use log::trace;

pub use crate::mux::chunk::{Chunk, ChunkId};
use crate::errors::MuxErrors;
pub use crate::mux::image::{AnimParams, BlendMethod, DisposeMethod, FrameInfo, MuxImage};
pub use crate::mux::read::is_webp_container;
pub(crate) use crate::mux::read::riff_payload;
pub use crate::mux::store::{ChunkRef, ChunkStore};
use crate::mux::chunk::{copy_bytes, get_u24, VP8X_CHUNK_SIZE};
use crate::mux::image::bitstream_features;

mod chunk;
mod image;
mod read;
mod store;
mod write;

/// Version of the container API, major version in the high byte
pub const MUX_ABI_VERSION: u32 = 0x0108;

/// Largest canvas side a `VP8X` chunk can describe
pub const MAX_CANVAS_SIZE: u32 = 1 << 24;

/// Feature flags of the `VP8X` chunk
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Features(pub u8);

impl Features {
    pub const ANIMATION: u8 = 0x02;
    pub const XMP: u8 = 0x04;
    pub const EXIF: u8 = 0x08;
    pub const ALPHA: u8 = 0x10;
    pub const ICCP: u8 = 0x20;

    pub const fn contains(self, flag: u8) -> bool {
        self.0 & flag == flag
    }
}

/// A frame as stored in a container
#[derive(Copy, Clone, Debug)]
pub struct Frame<'m> {
    /// Placement, default for still images
    pub info:      FrameInfo,
    /// `VP8 ` or `VP8L`
    pub id:        ChunkId,
    pub bitstream: &'m [u8],
    /// Payload of the `ALPH` chunk of lossy frames
    pub alpha:     Option<&'m [u8]>,
    pub width:     u32,
    pub height:    u32,
    pub has_alpha: bool
}

/// A webp container being read or built
///
/// Not internally synchronized, callers must serialize access
/// to one instance.
#[derive(Debug, Default)]
pub struct Mux<'a> {
    store:   ChunkStore<'a>,
    vp8x:    Option<ChunkRef>,
    iccp:    Option<ChunkRef>,
    anim:    Option<ChunkRef>,
    exif:    Option<ChunkRef>,
    xmp:     Option<ChunkRef>,
    unknown: Vec<ChunkRef>,
    images:  Vec<MuxImage>,
    // explicit canvas size, wins over the one derived from frames
    canvas:  Option<(u32, u32)>
}

impl<'a> Mux<'a> {
    /// Create an empty container
    pub fn new() -> Mux<'a> {
        Mux::default()
    }

    /// Create an empty container for callers built against `version`
    /// of the API
    pub fn new_with_version(version: u32) -> Result<Mux<'a>, MuxErrors> {
        if version >> 8 != MUX_ABI_VERSION >> 8 {
            return Err(MuxErrors::UnsupportedVersion(version));
        }
        Ok(Mux::new())
    }

    fn slot(&mut self, id: ChunkId) -> Option<&mut Option<ChunkRef>> {
        match id {
            ChunkId::VP8X => Some(&mut self.vp8x),
            ChunkId::ICCP => Some(&mut self.iccp),
            ChunkId::ANIM => Some(&mut self.anim),
            ChunkId::EXIF => Some(&mut self.exif),
            ChunkId::XMP => Some(&mut self.xmp),
            _ => None
        }
    }

    fn slot_ref(&self, id: ChunkId) -> Option<&Option<ChunkRef>> {
        match id {
            ChunkId::VP8X => Some(&self.vp8x),
            ChunkId::ICCP => Some(&self.iccp),
            ChunkId::ANIM => Some(&self.anim),
            ChunkId::EXIF => Some(&self.exif),
            ChunkId::XMP => Some(&self.xmp),
            _ => None
        }
    }

    /// Add a container level chunk
    ///
    /// Chunks with an unknown tag may repeat and keep their order,
    /// adding a second `ICCP`, `ANIM`, `EXIF`, `XMP ` or `VP8X` chunk
    /// fails with [`MuxErrors::DuplicateChunk`].
    pub fn push_chunk(&mut self, tag: [u8; 4], data: &'a [u8], copy: bool) -> Result<(), MuxErrors> {
        let id = ChunkId::from_tag(tag);

        if id.is_image_part() {
            return Err(MuxErrors::InvalidArgument("Image chunks are added as frames"));
        }
        if self.slot_ref(id).is_some_and(Option::is_some) {
            return Err(MuxErrors::DuplicateChunk(tag));
        }
        let handle = self.store.insert(Chunk::new(tag, data, copy)?)?;

        match self.slot(id) {
            Some(slot) => *slot = Some(handle),
            None => self.unknown.push(handle)
        }
        Ok(())
    }

    /// Store `data` under `tag`, replacing every chunk with that tag
    ///
    /// If `copy` is false the container borrows `data`.
    pub fn set_chunk(&mut self, tag: [u8; 4], data: &'a [u8], copy: bool) -> Result<(), MuxErrors> {
        let id = ChunkId::from_tag(tag);

        if id.is_image_part() || id == ChunkId::VP8X {
            return Err(MuxErrors::InvalidArgument("Chunk is managed by the container"));
        }
        match self.delete_chunk(tag) {
            Ok(()) | Err(MuxErrors::NotFound) => (),
            Err(err) => return Err(err)
        }
        self.push_chunk(tag, data, copy)
    }

    /// First chunk tagged `tag`
    pub fn get_chunk(&self, tag: [u8; 4]) -> Result<&[u8], MuxErrors> {
        self.get_nth_chunk(tag, 1)
    }

    /// The `nth` chunk tagged `tag`, counting from one, zero is the last
    pub fn get_nth_chunk(&self, tag: [u8; 4], nth: usize) -> Result<&[u8], MuxErrors> {
        let id = ChunkId::from_tag(tag);

        if id.is_image_part() {
            return Err(MuxErrors::InvalidArgument("Image chunks are read as frames"));
        }
        let handle = match self.slot_ref(id) {
            Some(slot) if nth <= 1 => slot.as_ref(),
            Some(_) => None,
            None => self.store.find_nth(&self.unknown, tag, nth)
        };
        handle
            .map(|h| self.store.data(h))
            .ok_or(MuxErrors::NotFound)
    }

    /// Remove every chunk tagged `tag`
    pub fn delete_chunk(&mut self, tag: [u8; 4]) -> Result<(), MuxErrors> {
        let id = ChunkId::from_tag(tag);

        if id.is_image_part() {
            return Err(MuxErrors::InvalidArgument("Image chunks are removed as frames"));
        }
        match self.slot(id) {
            Some(slot) => match slot.take() {
                Some(handle) => {
                    self.store.remove(handle);
                    Ok(())
                }
                None => Err(MuxErrors::NotFound)
            },
            None => self.store.delete_matching(&mut self.unknown, tag)
        }
    }

    /// Number of chunks of a kind, image chunks are counted over all frames
    pub fn num_chunks(&self, id: ChunkId) -> usize {
        if let Some(slot) = self.slot_ref(id) {
            return usize::from(slot.is_some());
        }
        match id {
            ChunkId::ANMF => self.images.iter().filter(|i| i.header.is_some()).count(),
            ChunkId::ALPH => self.images.iter().filter(|i| i.alpha.is_some()).count(),
            ChunkId::VP8 | ChunkId::VP8L => self
                .images
                .iter()
                .filter(|i| i.image_id(&self.store) == Some(id))
                .count(),
            _ => self.store.count(&self.unknown, id.tag())
        }
    }

    /// Number of images or animation frames
    pub fn num_frames(&self) -> usize {
        self.images.len()
    }

    /// Build a frame from a bare `VP8 `/`VP8L` bitstream or from a
    /// complete webp file, whose first image is used
    fn image_from_bitstream(&mut self, data: &'a [u8], copy: bool) -> Result<MuxImage, MuxErrors> {
        if data.starts_with(b"RIFF") {
            let mut inner = Mux::create(data, copy)?;

            if inner.images.is_empty() {
                return Err(MuxErrors::BadData("Container holds no image"));
            }
            let source = inner.images.swap_remove(0);
            let mut image = MuxImage::default();

            // move the chunks into our store
            for (from, to) in [(source.alpha, &mut image.alpha), (source.image, &mut image.image)] {
                if let Some(chunk) = from.and_then(|h| inner.store.remove(h)) {
                    *to = Some(self.store.insert(chunk)?);
                }
            }
            return Ok(image);
        }

        let id = if data.first() == Some(&crate::constants::VP8L_MAGIC) {
            ChunkId::VP8L
        } else {
            ChunkId::VP8
        };
        bitstream_features(id, data)?;

        Ok(MuxImage {
            image: Some(self.store.insert(Chunk::new(id.tag(), data, copy)?)?),
            ..MuxImage::default()
        })
    }

    fn release_images(&mut self) {
        for image in core::mem::take(&mut self.images) {
            image.release(&mut self.store);
        }
    }

    /// Make `bitstream` the only image of the container
    ///
    /// `bitstream` is a `VP8 `/`VP8L` payload or a webp file.
    pub fn set_image(&mut self, bitstream: &'a [u8], copy: bool) -> Result<(), MuxErrors> {
        let image = self.image_from_bitstream(bitstream, copy)?;

        self.release_images();
        self.images.push(image);

        Ok(())
    }

    /// Append an animation frame
    pub fn push_frame(
        &mut self, bitstream: &'a [u8], info: FrameInfo, copy: bool
    ) -> Result<(), MuxErrors> {
        if self.images.first().is_some_and(|i| i.header.is_none()) {
            return Err(MuxErrors::InvalidArgument(
                "Cannot add animation frames to a still image"
            ));
        }
        let mut image = self.image_from_bitstream(bitstream, copy)?;

        let anmf = image
            .features(&self.store)
            .and_then(|(width, height, _)| info.to_anmf(width, height));

        match anmf.and_then(|payload| Chunk::owned(ChunkId::ANMF.tag(), payload)) {
            Ok(chunk) => match self.store.insert(chunk) {
                Ok(handle) => image.header = Some(handle),
                Err(err) => {
                    image.release(&mut self.store);
                    return Err(err);
                }
            },
            Err(err) => {
                image.release(&mut self.store);
                return Err(err);
            }
        }
        trace!("Frame {} at ({}, {})", self.images.len(), info.x_offset, info.y_offset);

        self.images.push(image);
        Ok(())
    }

    fn nth_index(&self, nth: usize) -> Result<usize, MuxErrors> {
        match nth {
            0 if !self.images.is_empty() => Ok(self.images.len() - 1),
            n if n >= 1 && n <= self.images.len() => Ok(n - 1),
            _ => Err(MuxErrors::NotFound)
        }
    }

    /// The `nth` frame, counting from one, zero is the last
    pub fn get_frame(&self, nth: usize) -> Result<Frame<'_>, MuxErrors> {
        let image = &self.images[self.nth_index(nth)?];

        let (width, height, has_alpha) = image.features(&self.store)?;
        let id = image
            .image_id(&self.store)
            .ok_or(MuxErrors::BadData("Frame without image data"))?;

        Ok(Frame {
            info: image.frame_info(&self.store)?.unwrap_or_default(),
            id,
            bitstream: image.image.as_ref().map_or(&[][..], |h| self.store.data(h)),
            alpha: image.alpha.as_ref().map(|h| self.store.data(h)),
            width,
            height,
            has_alpha
        })
    }

    /// Image chunk of the `nth` frame, borrowed from the parsed input
    pub(crate) fn borrowed_bitstream(&self, nth: usize) -> Result<(ChunkId, &'a [u8]), MuxErrors> {
        let image = &self.images[self.nth_index(nth)?];
        let chunk = image
            .image
            .as_ref()
            .and_then(|h| self.store.get(h))
            .ok_or(MuxErrors::BadData("Frame without image data"))?;
        let data = chunk
            .borrowed()
            .ok_or(MuxErrors::InvalidArgument("Frame payload is not borrowed"))?;

        Ok((chunk.id(), data))
    }

    /// Wrap the `nth` frame into a standalone webp file
    pub fn frame_as_webp(&self, nth: usize) -> Result<Vec<u8>, MuxErrors> {
        let frame = self.get_frame(nth)?;
        let mut single = Mux::new();

        single.set_image(frame.bitstream, false)?;

        if let Some(alpha) = frame.alpha {
            let handle = single.store.insert(Chunk::new(ChunkId::ALPH.tag(), alpha, false)?)?;
            single.images[0].alpha = Some(handle);
        }
        single.assemble()
    }

    /// Remove the `nth` frame, counting from one, zero is the last
    pub fn delete_frame(&mut self, nth: usize) -> Result<(), MuxErrors> {
        let index = self.nth_index(nth)?;
        let image = self.images.remove(index);

        image.release(&mut self.store);
        Ok(())
    }

    pub fn set_animation_params(&mut self, params: AnimParams) -> Result<(), MuxErrors> {
        self.store.clear_slot(&mut self.anim);

        let chunk = Chunk::owned(ChunkId::ANIM.tag(), params.to_bytes().to_vec())?;
        self.anim = Some(self.store.insert(chunk)?);

        Ok(())
    }

    pub fn get_animation_params(&self) -> Result<AnimParams, MuxErrors> {
        let handle = self.anim.as_ref().ok_or(MuxErrors::NotFound)?;

        AnimParams::from_bytes(self.store.data(handle))
    }

    /// Force the canvas size written to `VP8X`
    ///
    /// `(0, 0)` goes back to deriving it from the frames.
    pub fn set_canvas_size(&mut self, width: u32, height: u32) -> Result<(), MuxErrors> {
        if width > MAX_CANVAS_SIZE || height > MAX_CANVAS_SIZE {
            return Err(MuxErrors::InvalidArgument("Canvas larger than 2^24"));
        }
        if u64::from(width) * u64::from(height) > u64::from(u32::MAX) {
            return Err(MuxErrors::InvalidArgument("Canvas area too large"));
        }
        if (width == 0) != (height == 0) {
            return Err(MuxErrors::InvalidArgument("Only one canvas side is zero"));
        }
        // any parsed VP8X is stale now
        self.store.clear_slot(&mut self.vp8x);

        self.canvas = if width == 0 {
            None
        } else {
            Some((width, height))
        };
        Ok(())
    }

    fn stored_vp8x(&self) -> Option<&[u8]> {
        self.vp8x
            .as_ref()
            .map(|h| self.store.data(h))
            .filter(|data| data.len() >= VP8X_CHUNK_SIZE)
    }

    /// Canvas size of the container
    pub fn get_canvas_size(&self) -> Result<(u32, u32), MuxErrors> {
        if let Some(canvas) = self.canvas {
            return Ok(canvas);
        }
        if let Some(vp8x) = self.stored_vp8x() {
            return Ok((get_u24(&vp8x[4..]) + 1, get_u24(&vp8x[7..]) + 1));
        }
        if self.images.is_empty() {
            return Err(MuxErrors::NotFound);
        }
        self.derived_canvas_size()
    }

    /// `VP8X` flags of the container
    pub fn get_features(&self) -> Result<Features, MuxErrors> {
        if let Some(vp8x) = self.stored_vp8x() {
            return Ok(Features(vp8x[0]));
        }
        let (flags, _) = self.compute_flags()?;
        Ok(flags)
    }

    /// Copy every borrowed payload so the container no longer
    /// depends on the caller's buffers
    pub fn into_owned(self) -> Result<Mux<'static>, MuxErrors> {
        let Mux {
            store: mut source,
            vp8x,
            iccp,
            anim,
            exif,
            xmp,
            unknown,
            images,
            canvas
        } = self;

        let mut store = ChunkStore::new();
        let mut adopt = |handle: Option<ChunkRef>| adopt_chunk(&mut source, &mut store, handle);

        let vp8x = adopt(vp8x)?;
        let iccp = adopt(iccp)?;
        let anim = adopt(anim)?;
        let exif = adopt(exif)?;
        let xmp = adopt(xmp)?;

        let mut owned_unknown = Vec::with_capacity(unknown.len());
        for handle in unknown {
            owned_unknown.extend(adopt(Some(handle))?);
        }

        let mut owned_images = Vec::with_capacity(images.len());
        for image in images {
            let mut moved = MuxImage {
                header:  adopt(image.header)?,
                alpha:   adopt(image.alpha)?,
                image:   adopt(image.image)?,
                unknown: Vec::new()
            };
            for handle in image.unknown {
                moved.unknown.extend(adopt(Some(handle))?);
            }
            owned_images.push(moved);
        }

        Ok(Mux {
            store,
            vp8x,
            iccp,
            anim,
            exif,
            xmp,
            unknown: owned_unknown,
            images: owned_images,
            canvas
        })
    }
}

/// Move a chunk between stores, copying its payload
fn adopt_chunk(
    source: &mut ChunkStore<'_>, target: &mut ChunkStore<'static>, handle: Option<ChunkRef>
) -> Result<Option<ChunkRef>, MuxErrors> {
    let Some(chunk) = handle.and_then(|h| source.remove(h)) else {
        return Ok(None);
    };
    let owned = Chunk::owned(chunk.tag(), copy_bytes(chunk.data())?)?;

    target.insert(owned).map(Some)
}

#[cfg(test)]
mod tests {
    use super::{AnimParams, ChunkId, FrameInfo, Mux, MUX_ABI_VERSION};
    use crate::errors::MuxErrors;
    use crate::lossless::encode_vp8l;
    use crate::options::LosslessOptions;

    fn vp8l(width: usize, height: usize, argb: u32) -> Vec<u8> {
        encode_vp8l(
            &vec![argb; width * height],
            width,
            height,
            &LosslessOptions::default()
        )
        .unwrap()
    }

    #[test]
    fn versions() {
        assert!(Mux::new_with_version(MUX_ABI_VERSION).is_ok());
        assert!(Mux::new_with_version(MUX_ABI_VERSION + 1).is_ok());
        assert!(matches!(
            Mux::new_with_version(0x0208),
            Err(MuxErrors::UnsupportedVersion(0x0208))
        ));
    }

    #[test]
    fn singleton_chunks() {
        let mut mux = Mux::new();

        mux.push_chunk(*b"ICCP", b"profile", false).unwrap();
        assert_eq!(
            mux.push_chunk(*b"ICCP", b"other", false),
            Err(MuxErrors::DuplicateChunk(*b"ICCP"))
        );
        // set replaces
        mux.set_chunk(*b"ICCP", b"other", false).unwrap();
        assert_eq!(mux.get_chunk(*b"ICCP"), Ok(&b"other"[..]));
        assert_eq!(mux.num_chunks(ChunkId::ICCP), 1);

        assert_eq!(mux.delete_chunk(*b"ICCP"), Ok(()));
        assert_eq!(mux.delete_chunk(*b"ICCP"), Err(MuxErrors::NotFound));
        assert_eq!(mux.get_chunk(*b"ICCP"), Err(MuxErrors::NotFound));
    }

    #[test]
    fn unknown_chunks_repeat() {
        let mut mux = Mux::new();

        mux.push_chunk(*b"abcd", b"1", false).unwrap();
        mux.push_chunk(*b"abcd", b"2", true).unwrap();
        mux.push_chunk(*b"wxyz", b"3", false).unwrap();

        assert_eq!(mux.get_nth_chunk(*b"abcd", 2), Ok(&b"2"[..]));
        assert_eq!(mux.get_nth_chunk(*b"abcd", 0), Ok(&b"2"[..]));
        assert_eq!(mux.get_nth_chunk(*b"abcd", 3), Err(MuxErrors::NotFound));
        assert_eq!(mux.num_chunks(ChunkId::Unknown(*b"abcd")), 2);

        mux.delete_chunk(*b"abcd").unwrap();
        assert_eq!(mux.num_chunks(ChunkId::Unknown(*b"abcd")), 0);
        assert_eq!(mux.get_chunk(*b"wxyz"), Ok(&b"3"[..]));
    }

    #[test]
    fn image_chunks_are_rejected() {
        let mut mux = Mux::new();

        for tag in [*b"VP8 ", *b"VP8L", *b"ALPH", *b"ANMF"] {
            assert!(matches!(
                mux.set_chunk(tag, b"", false),
                Err(MuxErrors::InvalidArgument(_))
            ));
            assert!(matches!(
                mux.get_chunk(tag),
                Err(MuxErrors::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn frames() {
        let a = vp8l(4, 4, 0xff00_0000);
        let b = vp8l(2, 6, 0x80ff_0000);

        let mut mux = Mux::new();
        mux.push_frame(&a, FrameInfo::default(), false).unwrap();
        mux.push_frame(
            &b,
            FrameInfo {
                x_offset: 2,
                duration: 40,
                ..FrameInfo::default()
            },
            true
        )
        .unwrap();

        assert_eq!(mux.num_frames(), 2);
        assert_eq!(mux.num_chunks(ChunkId::ANMF), 2);
        assert_eq!(mux.get_canvas_size(), Ok((4, 6)));

        let last = mux.get_frame(0).unwrap();
        assert_eq!((last.width, last.height, last.has_alpha), (2, 6, true));
        assert_eq!(last.info.duration, 40);
        assert_eq!(last.bitstream, &b[..]);

        mux.delete_frame(1).unwrap();
        assert_eq!(mux.num_frames(), 1);
        assert_eq!(mux.get_frame(1).unwrap().bitstream, &b[..]);
        assert_eq!(mux.delete_frame(2), Err(MuxErrors::NotFound));
    }

    #[test]
    fn still_images_reject_frames() {
        let a = vp8l(4, 4, 0xff00_0000);
        let mut mux = Mux::new();

        mux.set_image(&a, false).unwrap();
        assert!(matches!(
            mux.push_frame(&a, FrameInfo::default(), false),
            Err(MuxErrors::InvalidArgument(_))
        ));
    }

    #[test]
    fn animation_params() {
        let mut mux = Mux::new();
        assert_eq!(mux.get_animation_params(), Err(MuxErrors::NotFound));

        let params = AnimParams {
            bgcolor:    0xffff_ffff,
            loop_count: 0
        };
        mux.set_animation_params(params).unwrap();
        mux.set_animation_params(params).unwrap();

        assert_eq!(mux.get_animation_params(), Ok(params));
        assert_eq!(mux.num_chunks(ChunkId::ANIM), 1);
    }

    #[test]
    fn canvas_limits() {
        let mut mux = Mux::new();

        assert_eq!(mux.get_canvas_size(), Err(MuxErrors::NotFound));
        assert!(mux.set_canvas_size(1 << 25, 1).is_err());
        assert!(mux.set_canvas_size(0, 5).is_err());
        mux.set_canvas_size(100, 50).unwrap();
        assert_eq!(mux.get_canvas_size(), Ok((100, 50)));
    }

    #[test]
    fn owned_copy_outlives_input() {
        let owned = {
            let data = vp8l(3, 3, 0xff12_3456);
            let exif = b"exif".to_vec();

            let mut mux = Mux::new();
            mux.set_image(&data, false).unwrap();
            mux.set_chunk(*b"EXIF", &exif, false).unwrap();
            mux.into_owned().unwrap()
        };
        assert_eq!(owned.get_chunk(*b"EXIF"), Ok(&b"exif"[..]));
        assert_eq!(owned.get_frame(1).unwrap().width, 3);
    }
}
