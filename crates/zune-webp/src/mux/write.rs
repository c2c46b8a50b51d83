/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Serializing a [`Mux`] into a RIFF byte stream
use alloc::vec::Vec;

use log::trace;

use crate::errors::MuxErrors;
use crate::mux::chunk::{
    disk_size, emit_chunk_header, put_u24, ChunkId, MAX_CHUNK_PAYLOAD, RIFF_HEADER_SIZE,
    VP8X_CHUNK_SIZE
};
use crate::mux::store::ChunkRef;
use crate::mux::{Features, Mux, MAX_CANVAS_SIZE};

impl<'a> Mux<'a> {
    fn is_animated(&self) -> bool {
        self.images.first().is_some_and(|i| i.header.is_some())
    }

    /// Smallest canvas holding every frame
    pub(crate) fn derived_canvas_size(&self) -> Result<(u32, u32), MuxErrors> {
        let mut width = 0;
        let mut height = 0;

        for image in &self.images {
            let (w, h, _) = image.features(&self.store)?;
            let info = image.frame_info(&self.store)?.unwrap_or_default();

            width = width.max(info.x_offset + w);
            height = height.max(info.y_offset + h);
        }
        Ok((width, height))
    }

    /// Flags a `VP8X` chunk would carry and whether one is needed
    ///
    /// An alpha hint inside a lone `VP8L` image does not require
    /// the extended format, an `ALPH` chunk does.
    pub(crate) fn compute_flags(&self) -> Result<(Features, bool), MuxErrors> {
        let mut flags = 0;

        if self.iccp.is_some() {
            flags |= Features::ICCP;
        }
        if self.exif.is_some() {
            flags |= Features::EXIF;
        }
        if self.xmp.is_some() {
            flags |= Features::XMP;
        }
        if self.is_animated() {
            flags |= Features::ANIMATION;
        }
        if self.images.iter().any(|i| i.alpha.is_some()) {
            flags |= Features::ALPHA;
        }
        let needed = flags != 0 || !self.unknown.is_empty() || self.canvas.is_some();

        if needed {
            for image in &self.images {
                if image.features(&self.store)?.2 {
                    flags |= Features::ALPHA;
                }
            }
        }
        Ok((Features(flags), needed))
    }

    /// Check frames against the canvas and build the `VP8X` payload
    fn build_vp8x(&self) -> Result<Option<[u8; VP8X_CHUNK_SIZE]>, MuxErrors> {
        let (flags, needed) = self.compute_flags()?;

        let (canvas_width, canvas_height) = match self.canvas {
            Some(canvas) => canvas,
            None => self.derived_canvas_size()?
        };

        for image in &self.images {
            let (w, h, _) = image.features(&self.store)?;
            let info = image.frame_info(&self.store)?.unwrap_or_default();

            if info.x_offset + w > canvas_width || info.y_offset + h > canvas_height {
                return Err(MuxErrors::InvalidArgument("Image does not fit the canvas"));
            }
        }
        if !needed {
            return Ok(None);
        }
        if canvas_width > MAX_CANVAS_SIZE || canvas_height > MAX_CANVAS_SIZE {
            return Err(MuxErrors::InvalidArgument("Canvas larger than 2^24"));
        }
        if u64::from(canvas_width) * u64::from(canvas_height) > u64::from(u32::MAX) {
            return Err(MuxErrors::InvalidArgument("Canvas area too large"));
        }

        let mut payload = Vec::with_capacity(VP8X_CHUNK_SIZE);
        payload.extend_from_slice(&[flags.0, 0, 0, 0]);
        put_u24(&mut payload, canvas_width - 1);
        put_u24(&mut payload, canvas_height - 1);

        let mut out = [0; VP8X_CHUNK_SIZE];
        out.copy_from_slice(&payload);

        trace!("VP8X flags: {:#04x}, canvas: {canvas_width}x{canvas_height}", flags.0);

        Ok(Some(out))
    }

    fn validate_for_assembly(&self) -> Result<(), MuxErrors> {
        if self.images.is_empty() {
            return Err(MuxErrors::InvalidArgument("Container has no image"));
        }
        if self.images.iter().any(|i| !i.is_complete(&self.store)) {
            return Err(MuxErrors::BadData("Frame without image data"));
        }
        if self.is_animated() {
            if self.anim.is_none() {
                return Err(MuxErrors::InvalidArgument("Animated container needs ANIM"));
            }
        } else if self.images.len() > 1 {
            return Err(MuxErrors::InvalidArgument("Only one still image is allowed"));
        }
        Ok(())
    }

    fn slot_size(&self, slot: &Option<ChunkRef>) -> usize {
        slot.as_ref()
            .map_or(0, |h| disk_size(self.store.data(h).len()))
    }

    fn emit_slot(&self, slot: &Option<ChunkRef>, out: &mut Vec<u8>) {
        if let Some(chunk) = slot.as_ref().and_then(|h| self.store.get(h)) {
            chunk.emit(out);
        }
    }

    /// Serialize the container
    ///
    /// Chunks are written in the order `VP8X`, `ICCP`, `ANIM`, images,
    /// `EXIF`, `XMP ` then unknown chunks. `VP8X` is generated when the
    /// extended format is needed. A parsed one is regenerated, only its
    /// canvas size is kept.
    pub fn assemble(&self) -> Result<Vec<u8>, MuxErrors> {
        self.validate_for_assembly()?;

        let vp8x = self.build_vp8x()?;

        let size = RIFF_HEADER_SIZE
            + vp8x.map_or(0, |v| disk_size(v.len()))
            + self.slot_size(&self.iccp)
            + self.slot_size(&self.anim)
            + self
                .images
                .iter()
                .map(|i| i.disk_size(&self.store))
                .sum::<usize>()
            + self.slot_size(&self.exif)
            + self.slot_size(&self.xmp)
            + self
                .unknown
                .iter()
                .map(|h| disk_size(self.store.data(h).len()))
                .sum::<usize>();

        if size - 8 > MAX_CHUNK_PAYLOAD {
            return Err(MuxErrors::InvalidArgument("Container larger than 4GB"));
        }

        let mut out = Vec::new();
        out.try_reserve_exact(size)
            .map_err(|_| MuxErrors::AllocationFailure(size))?;

        emit_chunk_header(&mut out, *b"RIFF", size - 8);
        out.extend_from_slice(b"WEBP");

        if let Some(payload) = vp8x {
            emit_chunk_header(&mut out, ChunkId::VP8X.tag(), payload.len());
            out.extend_from_slice(&payload);
        }
        self.emit_slot(&self.iccp, &mut out);
        self.emit_slot(&self.anim, &mut out);

        for image in &self.images {
            image.emit(&self.store, &mut out);
        }
        self.emit_slot(&self.exif, &mut out);
        self.emit_slot(&self.xmp, &mut out);

        for handle in &self.unknown {
            if let Some(chunk) = self.store.get(handle) {
                chunk.emit(&mut out);
            }
        }
        debug_assert_eq!(out.len(), size);

        trace!("Assembled {} bytes", out.len());

        Ok(out)
    }
}
