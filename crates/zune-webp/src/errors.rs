/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Errors possible when decoding, encoding or (de)muxing webp files
use alloc::string::String;
use core::fmt::{Debug, Display, Formatter};

use zune_core::colorspace::ColorSpace;

/// Possible errors that may occur when handling the chunked
/// RIFF container
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum MuxErrors {
    /// A lookup or delete did not match any chunk
    NotFound,
    /// A second chunk was inserted for a tag which may only
    /// occur once in a container
    ///
    /// The argument is the offending tag
    DuplicateChunk([u8; 4]),
    /// The stream is shorter than what a header or a chunk claims
    ///
    /// # Arguments
    /// - 1st argument is the number of bytes we expected
    /// - 2nd argument is number of bytes actually left
    TruncatedStream(usize, usize),
    /// Bad parameters passed to an API call
    InvalidArgument(&'static str),
    /// The container is well sized but its contents are inconsistent
    BadData(&'static str),
    /// The caller asked for an ABI version we cannot provide
    UnsupportedVersion(u32),
    /// We could not grow a buffer to the size in the argument
    AllocationFailure(usize)
}

impl Debug for MuxErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            MuxErrors::NotFound => writeln!(f, "No chunk matched the request"),
            MuxErrors::DuplicateChunk(tag) => {
                writeln!(
                    f,
                    "Chunk {:?} can only appear once in a container",
                    core::str::from_utf8(tag).unwrap_or("????")
                )
            }
            MuxErrors::TruncatedStream(expected, found) => {
                writeln!(
                    f,
                    "Truncated stream, expected {expected} bytes but only {found} remain"
                )
            }
            MuxErrors::InvalidArgument(reason) => writeln!(f, "Invalid argument: {reason}"),
            MuxErrors::BadData(reason) => writeln!(f, "Bad container data: {reason}"),
            MuxErrors::UnsupportedVersion(version) => {
                writeln!(f, "Unsupported mux ABI version {version:#06x}")
            }
            MuxErrors::AllocationFailure(size) => {
                writeln!(f, "Could not allocate {size} bytes")
            }
        }
    }
}

impl Display for MuxErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "{:?}", self)
    }
}

impl From<&'static str> for MuxErrors {
    fn from(r: &'static str) -> Self {
        Self::BadData(r)
    }
}

/// Possible errors that may occur during lossless decoding or encoding
pub enum WebpErrors {
    /// A prefix code description does not form a complete prefix code
    /// or uses code lengths above the allowed maximum
    MalformedTable,
    /// The bitstream ended before the image was fully reconstructed
    ///
    /// # Arguments
    /// - 1st argument is the number of bytes we expected
    /// - 2nd argument is number of bytes actually present
    TruncatedStream(usize, usize),
    /// The VP8L header carries a version we do not know
    UnsupportedVersion(u32),
    /// We could not grow a buffer to the size in the argument
    AllocationFailure(usize),
    /// Image dimensions larger than what is allowed
    ///
    /// # Arguments
    /// - 1st argument is the dimension found
    /// - 2nd argument is the configured or format limit
    TooLargeDimensions(usize, usize),
    /// The bitstream is structurally invalid
    CorruptData(&'static str),
    /// The encoder cannot handle this colorspace
    UnsupportedColorspace(ColorSpace),
    /// Pixel buffer length does not match the dimensions
    ///
    /// # Arguments
    /// - 1st argument is the expected length
    /// - 2nd argument is the length found
    LengthMismatch(usize, usize),
    /// Generic message
    Generic(String),
    /// Generic message does not need heap allocation
    GenericStatic(&'static str),
    /// Errors from the container layer
    Mux(MuxErrors)
}

impl Debug for WebpErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            WebpErrors::MalformedTable => {
                writeln!(f, "Malformed prefix code, code lengths do not form a valid table")
            }
            WebpErrors::TruncatedStream(expected, found) => {
                writeln!(
                    f,
                    "Truncated stream, needed {expected} bytes but stream has {found}"
                )
            }
            WebpErrors::UnsupportedVersion(version) => {
                writeln!(f, "Unsupported VP8L version {version}, expected 0")
            }
            WebpErrors::AllocationFailure(size) => {
                writeln!(f, "Could not allocate {size} bytes")
            }
            WebpErrors::TooLargeDimensions(found, limit) => {
                writeln!(
                    f,
                    "Too large image dimension {found}, greater than the limit {limit}"
                )
            }
            WebpErrors::CorruptData(reason) => writeln!(f, "Corrupt data: {reason}"),
            WebpErrors::UnsupportedColorspace(colorspace) => {
                writeln!(
                    f,
                    "Cannot encode image with colorspace {colorspace:?} into webp"
                )
            }
            WebpErrors::LengthMismatch(expected, found) => {
                writeln!(f, "Expected array of length {expected} but found {found}")
            }
            WebpErrors::Generic(val) => writeln!(f, "{val}"),
            WebpErrors::GenericStatic(val) => writeln!(f, "{val}"),
            WebpErrors::Mux(err) => writeln!(f, "Container error: {err:?}")
        }
    }
}

impl Display for WebpErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "{:?}", self)
    }
}

impl From<&'static str> for WebpErrors {
    fn from(r: &'static str) -> Self {
        Self::GenericStatic(r)
    }
}

impl From<String> for WebpErrors {
    fn from(r: String) -> Self {
        Self::Generic(r)
    }
}

impl From<MuxErrors> for WebpErrors {
    fn from(value: MuxErrors) -> Self {
        match value {
            MuxErrors::AllocationFailure(size) => WebpErrors::AllocationFailure(size),
            err => WebpErrors::Mux(err)
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for WebpErrors {}

#[cfg(feature = "std")]
impl std::error::Error for MuxErrors {}
