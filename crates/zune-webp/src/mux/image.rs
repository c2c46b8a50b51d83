/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use alloc::vec::Vec;

use crate::constants::VP8L_MAGIC;
use crate::errors::MuxErrors;
use crate::lossless::read_header;
use crate::mux::chunk::{disk_size, get_u24, put_u24, ChunkId, ANMF_CHUNK_SIZE};
use crate::mux::store::{ChunkRef, ChunkStore};

/// How a frame's area is treated once the frame has been shown
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DisposeMethod {
    /// Leave the canvas as it is
    #[default]
    None,
    /// Fill the frame's rectangle with the background color
    Background
}

/// How a frame is combined with the canvas below it
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum BlendMethod {
    /// Alpha blend over the canvas
    #[default]
    AlphaBlend,
    /// Overwrite the canvas
    NoBlend
}

/// Placement and timing of an animation frame
///
/// Offsets must be even, they are stored halved.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FrameInfo {
    pub x_offset: u32,
    pub y_offset: u32,
    /// Display time in milliseconds, at most 24 bits
    pub duration: u32,
    pub dispose:  DisposeMethod,
    pub blend:    BlendMethod
}

impl FrameInfo {
    /// Payload of an `ANMF` chunk for a `width` x `height` frame,
    /// without the frame data that follows it
    pub(crate) fn to_anmf(self, width: u32, height: u32) -> Result<Vec<u8>, MuxErrors> {
        if self.x_offset & 1 == 1 || self.y_offset & 1 == 1 {
            return Err(MuxErrors::InvalidArgument("Frame offsets must be even"));
        }
        if self.x_offset >= (1 << 25) || self.y_offset >= (1 << 25) {
            return Err(MuxErrors::InvalidArgument("Frame offset too large"));
        }
        if self.duration >= (1 << 24) {
            return Err(MuxErrors::InvalidArgument("Frame duration too large"));
        }
        let mut out = Vec::with_capacity(ANMF_CHUNK_SIZE);

        put_u24(&mut out, self.x_offset / 2);
        put_u24(&mut out, self.y_offset / 2);
        put_u24(&mut out, width - 1);
        put_u24(&mut out, height - 1);
        put_u24(&mut out, self.duration);

        let mut flags = 0;
        if self.blend == BlendMethod::NoBlend {
            flags |= 2;
        }
        if self.dispose == DisposeMethod::Background {
            flags |= 1;
        }
        out.push(flags);

        Ok(out)
    }

    /// Read the placement fields and the frame size from an `ANMF` payload
    pub(crate) fn from_anmf(payload: &[u8]) -> Result<(FrameInfo, u32, u32), MuxErrors> {
        if payload.len() < ANMF_CHUNK_SIZE {
            return Err(MuxErrors::BadData("ANMF chunk too small"));
        }
        let flags = payload[15];
        let info = FrameInfo {
            x_offset: get_u24(&payload[0..]) * 2,
            y_offset: get_u24(&payload[3..]) * 2,
            duration: get_u24(&payload[12..]),
            dispose:  if flags & 1 == 1 {
                DisposeMethod::Background
            } else {
                DisposeMethod::None
            },
            blend:    if flags & 2 == 2 {
                BlendMethod::NoBlend
            } else {
                BlendMethod::AlphaBlend
            }
        };
        Ok((info, get_u24(&payload[6..]) + 1, get_u24(&payload[9..]) + 1))
    }
}

/// Global animation parameters stored in the `ANIM` chunk
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct AnimParams {
    /// Background color in `[Blue, Green, Red, Alpha]` byte order
    pub bgcolor:    u32,
    /// Number of times to repeat, zero loops forever
    pub loop_count: u16
}

impl AnimParams {
    pub(crate) fn to_bytes(self) -> [u8; 6] {
        let mut out = [0; 6];
        out[..4].copy_from_slice(&self.bgcolor.to_le_bytes());
        out[4..].copy_from_slice(&self.loop_count.to_le_bytes());
        out
    }

    pub(crate) fn from_bytes(payload: &[u8]) -> Result<AnimParams, MuxErrors> {
        if payload.len() < 6 {
            return Err(MuxErrors::BadData("ANIM chunk too small"));
        }
        Ok(AnimParams {
            bgcolor:    u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]),
            loop_count: u16::from_le_bytes([payload[4], payload[5]])
        })
    }
}

/// Width, height and alpha hint of a `VP8 ` or `VP8L` payload
pub fn bitstream_features(id: ChunkId, payload: &[u8]) -> Result<(u32, u32, bool), MuxErrors> {
    match id {
        ChunkId::VP8L => {
            if payload.first() != Some(&VP8L_MAGIC) {
                return Err(MuxErrors::BadData("VP8L chunk without signature"));
            }
            let header = read_header(payload).map_err(|_| MuxErrors::BadData("Bad VP8L header"))?;

            Ok((header.width as u32, header.height as u32, header.has_alpha))
        }
        ChunkId::VP8 => {
            // frame tag, start code, then 14 bit dimensions with 2 bit scales
            if payload.len() < 10 || payload[3..6] != [0x9d, 0x01, 0x2a] {
                return Err(MuxErrors::BadData("VP8 chunk without key frame header"));
            }
            if payload[0] & 1 != 0 {
                return Err(MuxErrors::BadData("VP8 chunk is not a key frame"));
            }
            let width = u16::from_le_bytes([payload[6], payload[7]]) & 0x3fff;
            let height = u16::from_le_bytes([payload[8], payload[9]]) & 0x3fff;

            if width == 0 || height == 0 {
                return Err(MuxErrors::BadData("VP8 frame with zero dimension"));
            }
            Ok((u32::from(width), u32::from(height), false))
        }
        _ => Err(MuxErrors::InvalidArgument("Not an image chunk"))
    }
}

/// One image of a container with the chunks that describe it
///
/// `header` is the `ANMF` payload of animation frames, still images
/// have none.
#[derive(Debug, Default)]
pub struct MuxImage {
    pub header:  Option<ChunkRef>,
    pub alpha:   Option<ChunkRef>,
    pub image:   Option<ChunkRef>,
    pub unknown: Vec<ChunkRef>
}

impl MuxImage {
    /// Tag of the image chunk, if any
    pub fn image_id(&self, store: &ChunkStore) -> Option<ChunkId> {
        let handle = self.image.as_ref()?;
        store.get(handle).map(|c| c.id())
    }

    pub fn is_complete(&self, store: &ChunkStore) -> bool {
        self.image_id(store).is_some()
    }

    /// Width, height and whether the image carries alpha
    pub fn features(&self, store: &ChunkStore) -> Result<(u32, u32, bool), MuxErrors> {
        let id = self
            .image_id(store)
            .ok_or(MuxErrors::BadData("Frame without image data"))?;
        let image = self.image.as_ref().map_or(&[][..], |h| store.data(h));
        let (width, height, alpha_hint) = bitstream_features(id, image)?;

        let has_alpha = match id {
            ChunkId::VP8L => alpha_hint,
            _ => self.alpha.is_some()
        };
        Ok((width, height, has_alpha))
    }

    /// Placement of an animation frame
    pub fn frame_info(&self, store: &ChunkStore) -> Result<Option<FrameInfo>, MuxErrors> {
        match &self.header {
            Some(handle) => Ok(Some(FrameInfo::from_anmf(store.data(handle))?.0)),
            None => Ok(None)
        }
    }

    /// Bytes of the chunks after the `ANMF` header
    fn payload_size(&self, store: &ChunkStore) -> usize {
        let alpha = self.alpha.as_ref().map_or(0, |h| disk_size(store.data(h).len()));
        let image = self.image.as_ref().map_or(0, |h| disk_size(store.data(h).len()));
        let unknown: usize = self
            .unknown
            .iter()
            .map(|h| disk_size(store.data(h).len()))
            .sum();

        alpha + image + unknown
    }

    /// Serialized size, `ANMF` wrapper included
    pub fn disk_size(&self, store: &ChunkStore) -> usize {
        let payload = self.payload_size(store);

        match &self.header {
            Some(handle) => disk_size(store.data(handle).len() + payload),
            None => payload
        }
    }

    /// Append the image to `out`
    ///
    /// Frames are written as an `ANMF` chunk wrapping their sub-chunks.
    pub fn emit(&self, store: &ChunkStore, out: &mut Vec<u8>) {
        if let Some(handle) = &self.header {
            let header = store.data(handle);
            let size = header.len() + self.payload_size(store);

            crate::mux::chunk::emit_chunk_header(out, ChunkId::ANMF.tag(), size);
            out.extend_from_slice(header);
        }
        let parts = self.alpha.iter().chain(self.image.iter()).chain(self.unknown.iter());

        for handle in parts {
            if let Some(chunk) = store.get(handle) {
                chunk.emit(out);
            }
        }
    }

    /// Release every chunk of the image
    pub fn release(mut self, store: &mut ChunkStore) {
        store.clear_slot(&mut self.header);
        store.clear_slot(&mut self.alpha);
        store.clear_slot(&mut self.image);
        store.clear_list(&mut self.unknown);
    }
}

#[cfg(test)]
mod tests {
    use super::{bitstream_features, AnimParams, BlendMethod, DisposeMethod, FrameInfo};
    use crate::errors::MuxErrors;
    use crate::mux::chunk::ChunkId;

    #[test]
    fn anmf_round_trips() {
        let info = FrameInfo {
            x_offset: 10,
            y_offset: 4,
            duration: 120,
            dispose:  DisposeMethod::Background,
            blend:    BlendMethod::NoBlend
        };
        let payload = info.to_anmf(33, 7).unwrap();

        assert_eq!(payload.len(), 16);
        assert_eq!(payload[15], 3);
        assert_eq!(FrameInfo::from_anmf(&payload).unwrap(), (info, 33, 7));

        let odd = FrameInfo {
            x_offset: 3,
            ..FrameInfo::default()
        };
        assert!(matches!(
            odd.to_anmf(1, 1),
            Err(MuxErrors::InvalidArgument(_))
        ));
    }

    #[test]
    fn anim_round_trips() {
        let params = AnimParams {
            bgcolor:    0xff11_2233,
            loop_count: 3
        };
        assert_eq!(AnimParams::from_bytes(&params.to_bytes()).unwrap(), params);
    }

    #[test]
    fn vp8_dimensions() {
        let mut frame = vec![0x10, 0x02, 0x00, 0x9d, 0x01, 0x2a];
        frame.extend_from_slice(&640_u16.to_le_bytes());
        frame.extend_from_slice(&(480_u16 | 0x4000).to_le_bytes());

        assert_eq!(
            bitstream_features(ChunkId::VP8, &frame).unwrap(),
            (640, 480, false)
        );
        frame[4] = 0;
        assert!(bitstream_features(ChunkId::VP8, &frame).is_err());
    }
}
