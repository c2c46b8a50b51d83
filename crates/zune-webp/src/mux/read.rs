/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Parsing a RIFF byte stream into a [`Mux`]
use log::{trace, warn};

use crate::errors::MuxErrors;
use crate::mux::chunk::{
    get_u24, Chunk, ChunkId, ANMF_CHUNK_SIZE, CHUNK_HEADER_SIZE, MAX_CHUNK_PAYLOAD,
    RIFF_HEADER_SIZE
};
use crate::mux::image::MuxImage;
use crate::mux::{Features, Mux};

/// A chunk found while walking a byte stream
struct RawChunk<'a> {
    tag:     [u8; 4],
    payload: &'a [u8],
    // offset of the following chunk
    next:    usize
}

/// Read the chunk header at `pos` and borrow its payload
///
/// A missing pad byte after the last chunk is tolerated.
fn read_chunk(data: &[u8], pos: usize) -> Result<RawChunk<'_>, MuxErrors> {
    let remaining = data.len() - pos;

    if remaining < CHUNK_HEADER_SIZE {
        return Err(MuxErrors::TruncatedStream(CHUNK_HEADER_SIZE, remaining));
    }
    let mut tag = [0; 4];
    tag.copy_from_slice(&data[pos..pos + 4]);

    let size = u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
        as usize;

    if size > MAX_CHUNK_PAYLOAD {
        return Err(MuxErrors::BadData("Chunk size too large"));
    }
    let start = pos + CHUNK_HEADER_SIZE;
    let available = data.len() - start;

    if size > available {
        return Err(MuxErrors::TruncatedStream(size, available));
    }
    Ok(RawChunk {
        tag,
        payload: &data[start..start + size],
        next: (start + size + (size & 1)).min(data.len())
    })
}

/// Returns true if `data` starts with a `RIFF`/`WEBP` header
pub fn is_webp_container(data: &[u8]) -> bool {
    data.len() >= RIFF_HEADER_SIZE && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP"
}

/// Check the `RIFF` header and return the stream it covers
///
/// Bytes after the declared size are ignored.
pub(crate) fn riff_payload(data: &[u8]) -> Result<&[u8], MuxErrors> {
    if data.len() < RIFF_HEADER_SIZE {
        return Err(MuxErrors::TruncatedStream(RIFF_HEADER_SIZE, data.len()));
    }
    if !is_webp_container(data) {
        return Err(MuxErrors::BadData("Missing RIFF/WEBP signature"));
    }
    let riff_size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;

    if riff_size < 4 + CHUNK_HEADER_SIZE {
        return Err(MuxErrors::BadData("RIFF size too small"));
    }
    if riff_size > MAX_CHUNK_PAYLOAD {
        return Err(MuxErrors::BadData("RIFF size too large"));
    }
    let end = riff_size + CHUNK_HEADER_SIZE;

    if end > data.len() {
        return Err(MuxErrors::TruncatedStream(end, data.len()));
    }
    if end < data.len() {
        trace!("Ignoring {} bytes after the RIFF chunk", data.len() - end);
    }
    Ok(&data[..end])
}

impl<'a> Mux<'a> {
    /// Parse a webp file
    ///
    /// If `copy` is false the container borrows payloads from `data`.
    pub fn create(data: &'a [u8], copy: bool) -> Result<Mux<'a>, MuxErrors> {
        let data = riff_payload(data)?;

        let mut mux = Mux::new();
        // ALPH seen before its VP8 chunk
        let mut pending = MuxImage::default();
        let mut pos = RIFF_HEADER_SIZE;

        while pos < data.len() {
            let chunk = read_chunk(data, pos)?;
            let id = ChunkId::from_tag(chunk.tag);

            match id {
                ChunkId::ANMF => {
                    if pending.alpha.is_some() {
                        return Err(MuxErrors::BadData("ALPH chunk without image"));
                    }
                    let image = mux.read_frame(chunk.payload, copy)?;
                    mux.images.push(image);
                }
                ChunkId::ALPH | ChunkId::VP8 | ChunkId::VP8L => {
                    if mux.images.iter().any(|i| i.header.is_some()) {
                        return Err(MuxErrors::BadData("Still image mixed with frames"));
                    }
                    if mux.add_image_part(&mut pending, id, chunk.payload, copy)? {
                        mux.images.push(core::mem::take(&mut pending));
                    }
                }
                _ => mux.push_chunk(chunk.tag, chunk.payload, copy)?
            }
            pos = chunk.next;
        }
        if pending.alpha.is_some() {
            return Err(MuxErrors::BadData("ALPH chunk without image"));
        }
        mux.validate_parsed()?;

        // an explicit canvas, kept on reassembly
        mux.canvas = mux
            .stored_vp8x()
            .map(|vp8x| (get_u24(&vp8x[4..]) + 1, get_u24(&vp8x[7..]) + 1));

        trace!("Parsed container, {} images, {} chunks", mux.images.len(), mux.store.len());

        Ok(mux)
    }

    /// Route an image chunk into `image`, returns true once the image
    /// data chunk completes it
    fn add_image_part(
        &mut self, image: &mut MuxImage, id: ChunkId, payload: &'a [u8], copy: bool
    ) -> Result<bool, MuxErrors> {
        let slot = match id {
            ChunkId::ALPH => &mut image.alpha,
            _ => &mut image.image
        };
        if slot.is_some() {
            return Err(MuxErrors::DuplicateChunk(id.tag()));
        }
        *slot = Some(self.store.insert(Chunk::new(id.tag(), payload, copy)?)?);

        Ok(id != ChunkId::ALPH)
    }

    /// Parse the payload of an `ANMF` chunk
    fn read_frame(&mut self, payload: &'a [u8], copy: bool) -> Result<MuxImage, MuxErrors> {
        if payload.len() < ANMF_CHUNK_SIZE {
            return Err(MuxErrors::BadData("ANMF chunk too small"));
        }
        let mut image = MuxImage {
            header: Some(
                self.store
                    .insert(Chunk::new(ChunkId::ANMF.tag(), &payload[..ANMF_CHUNK_SIZE], copy)?)?
            ),
            ..MuxImage::default()
        };
        let frame_data = &payload[ANMF_CHUNK_SIZE..];
        let mut pos = 0;

        while pos < frame_data.len() {
            let chunk = match read_chunk(frame_data, pos) {
                Ok(chunk) => chunk,
                Err(err) => {
                    image.release(&mut self.store);
                    return Err(err);
                }
            };
            let id = ChunkId::from_tag(chunk.tag);

            let added = match id {
                ChunkId::ALPH | ChunkId::VP8 | ChunkId::VP8L => {
                    self.add_image_part(&mut image, id, chunk.payload, copy).map(|_| ())
                }
                _ => Chunk::new(chunk.tag, chunk.payload, copy)
                    .and_then(|c| self.store.insert(c))
                    .map(|handle| image.unknown.push(handle))
            };
            if let Err(err) = added {
                image.release(&mut self.store);
                return Err(err);
            }
            pos = chunk.next;
        }
        if !image.is_complete(&self.store) {
            image.release(&mut self.store);
            return Err(MuxErrors::BadData("ANMF chunk without image data"));
        }
        Ok(image)
    }

    /// Check that what was parsed agrees with the `VP8X` flags
    fn validate_parsed(&self) -> Result<(), MuxErrors> {
        let num_frames = self.images.iter().filter(|i| i.header.is_some()).count();

        let Some(vp8x) = self.stored_vp8x() else {
            if self.vp8x.is_some() {
                return Err(MuxErrors::BadData("VP8X chunk too small"));
            }
            if num_frames > 0 || self.images.len() > 1 {
                return Err(MuxErrors::BadData("Animation without VP8X chunk"));
            }
            return Ok(());
        };
        let flags = Features(vp8x[0]);

        if flags.contains(Features::ANIMATION) {
            if self.anim.is_none() && num_frames > 0 {
                return Err(MuxErrors::BadData("Animated container without ANIM chunk"));
            }
        } else if num_frames > 0 || self.images.len() > 1 {
            return Err(MuxErrors::BadData("Frames in a container not flagged animated"));
        }

        for (flag, present, name) in [
            (Features::ICCP, self.iccp.is_some(), "ICCP"),
            (Features::EXIF, self.exif.is_some(), "EXIF"),
            (Features::XMP, self.xmp.is_some(), "XMP")
        ] {
            if present && !flags.contains(flag) {
                warn!("{name} chunk present but not flagged in VP8X");
            }
        }
        Ok(())
    }
}
