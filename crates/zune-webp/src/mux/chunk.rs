/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use alloc::borrow::Cow;
use alloc::vec::Vec;

use crate::errors::MuxErrors;

/// Size of a tag plus a length field
pub const CHUNK_HEADER_SIZE: usize = 8;
/// Size of the `RIFF` header including the `WEBP` form type
pub const RIFF_HEADER_SIZE: usize = 12;
/// Largest payload a chunk length can describe
pub const MAX_CHUNK_PAYLOAD: usize = (u32::MAX as usize) - CHUNK_HEADER_SIZE - 1;

pub const VP8X_CHUNK_SIZE: usize = 10;
pub const ANIM_CHUNK_SIZE: usize = 6;
pub const ANMF_CHUNK_SIZE: usize = 16;

/// Known chunk kinds
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChunkId {
    VP8X,
    ICCP,
    ANIM,
    ANMF,
    ALPH,
    VP8,
    VP8L,
    EXIF,
    XMP,
    Unknown([u8; 4])
}

impl ChunkId {
    pub fn from_tag(tag: [u8; 4]) -> ChunkId {
        match &tag {
            b"VP8X" => ChunkId::VP8X,
            b"ICCP" => ChunkId::ICCP,
            b"ANIM" => ChunkId::ANIM,
            b"ANMF" => ChunkId::ANMF,
            b"ALPH" => ChunkId::ALPH,
            b"VP8 " => ChunkId::VP8,
            b"VP8L" => ChunkId::VP8L,
            b"EXIF" => ChunkId::EXIF,
            b"XMP " => ChunkId::XMP,
            _ => ChunkId::Unknown(tag)
        }
    }

    pub const fn tag(self) -> [u8; 4] {
        match self {
            ChunkId::VP8X => *b"VP8X",
            ChunkId::ICCP => *b"ICCP",
            ChunkId::ANIM => *b"ANIM",
            ChunkId::ANMF => *b"ANMF",
            ChunkId::ALPH => *b"ALPH",
            ChunkId::VP8 => *b"VP8 ",
            ChunkId::VP8L => *b"VP8L",
            ChunkId::EXIF => *b"EXIF",
            ChunkId::XMP => *b"XMP ",
            ChunkId::Unknown(tag) => tag
        }
    }

    /// Chunks that may appear at most once per container
    pub const fn is_singleton(self) -> bool {
        matches!(
            self,
            ChunkId::VP8X | ChunkId::ICCP | ChunkId::ANIM | ChunkId::EXIF | ChunkId::XMP
        )
    }

    /// Chunks that belong to a frame rather than to the container
    pub const fn is_image_part(self) -> bool {
        matches!(
            self,
            ChunkId::ANMF | ChunkId::ALPH | ChunkId::VP8 | ChunkId::VP8L
        )
    }

    /// Chunks the container builds itself, their payload is always copied
    pub const fn is_structural(self) -> bool {
        matches!(self, ChunkId::VP8X | ChunkId::ANIM | ChunkId::ANMF)
    }
}

/// A tagged payload
///
/// The payload is either borrowed from the caller, who must keep
/// it alive for as long as the chunk, or owned by the chunk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Chunk<'a> {
    tag:  [u8; 4],
    data: Cow<'a, [u8]>
}

impl<'a> Chunk<'a> {
    /// Wrap `data`, copying it if `copy` is set or the tag is structural
    pub fn new(tag: [u8; 4], data: &'a [u8], copy: bool) -> Result<Chunk<'a>, MuxErrors> {
        if data.len() > MAX_CHUNK_PAYLOAD {
            return Err(MuxErrors::InvalidArgument("Chunk payload too large"));
        }
        if copy || ChunkId::from_tag(tag).is_structural() {
            return Chunk::owned(tag, copy_bytes(data)?);
        }
        Ok(Chunk {
            tag,
            data: Cow::Borrowed(data)
        })
    }

    /// A chunk owning `data`
    pub fn owned(tag: [u8; 4], data: Vec<u8>) -> Result<Chunk<'a>, MuxErrors> {
        if data.len() > MAX_CHUNK_PAYLOAD {
            return Err(MuxErrors::InvalidArgument("Chunk payload too large"));
        }
        Ok(Chunk {
            tag,
            data: Cow::Owned(data)
        })
    }

    pub const fn tag(&self) -> [u8; 4] {
        self.tag
    }

    pub fn id(&self) -> ChunkId {
        ChunkId::from_tag(self.tag)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the payload is owned rather than borrowed
    pub fn is_owned(&self) -> bool {
        matches!(self.data, Cow::Owned(_))
    }

    /// The caller's buffer, if the payload was borrowed
    pub fn borrowed(&self) -> Option<&'a [u8]> {
        match self.data {
            Cow::Borrowed(data) => Some(data),
            Cow::Owned(_) => None
        }
    }

    /// Bytes the chunk occupies once serialized, padding included
    pub fn disk_size(&self) -> usize {
        disk_size(self.data.len())
    }

    /// Append the serialized chunk to `out`
    pub fn emit(&self, out: &mut Vec<u8>) {
        emit_chunk_header(out, self.tag, self.data.len());
        out.extend_from_slice(&self.data);

        if self.data.len() & 1 == 1 {
            out.push(0);
        }
    }
}

/// Serialized size of a chunk with `payload` bytes
pub const fn disk_size(payload: usize) -> usize {
    CHUNK_HEADER_SIZE + payload + (payload & 1)
}

pub fn emit_chunk_header(out: &mut Vec<u8>, tag: [u8; 4], payload: usize) {
    out.extend_from_slice(&tag);
    out.extend_from_slice(&(payload as u32).to_le_bytes());
}

pub(crate) fn copy_bytes(data: &[u8]) -> Result<Vec<u8>, MuxErrors> {
    let mut out = Vec::new();
    out.try_reserve_exact(data.len())
        .map_err(|_| MuxErrors::AllocationFailure(data.len()))?;
    out.extend_from_slice(data);
    Ok(out)
}

/// Write the low 24 bits of `value`, little endian
pub(crate) fn put_u24(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}

pub(crate) fn get_u24(data: &[u8]) -> u32 {
    u32::from(data[0]) | (u32::from(data[1]) << 8) | (u32::from(data[2]) << 16)
}
