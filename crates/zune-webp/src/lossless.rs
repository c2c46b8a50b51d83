/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The VP8L lossless codec
//!
//! A VP8L bitstream is a five byte header followed by an optional
//! chain of transforms and the entropy coded pixels. The types here work
//! on the bare bitstream, see [`crate::mux`] for the RIFF container.
pub use decoder::{decode_vp8l, read_header, LosslessDecoder, Vp8lHeader};
pub use encoder::{encode_vp8l, LosslessEncoder};

pub mod color_cache;
mod decoder;
mod encoder;
