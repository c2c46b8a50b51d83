/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! A lossless webp decoder, encoder and container muxer
//!
//! # Features
//! - `VP8L` lossless decoding and encoding with every transform,
//!   color caching, backward references and meta prefix codes
//! - A `RIFF` container API to read, edit and assemble files with
//!   metadata and animation frames
//! - `no_std` with `alloc`
//!
//! Lossy (`VP8 `) bitstreams are recognized by the container layer
//! but not decoded.
//!
//! # Decoding
//! ```no_run
//! use zune_webp::WebpDecoder;
//! let mut decoder = WebpDecoder::new(&[]);
//!
//! let pixels = decoder.decode().unwrap();
//! ```
//!
//! # Encoding
//! ```
//! use zune_core::bit_depth::BitDepth;
//! use zune_core::colorspace::ColorSpace;
//! use zune_core::options::EncoderOptions;
//! use zune_webp::WebpEncoder;
//!
//! let pixels = [0_u8; 8 * 8 * 4];
//! let options = EncoderOptions::new(8, 8, ColorSpace::RGBA, BitDepth::Eight);
//!
//! let file = WebpEncoder::new(&pixels, options).encode().unwrap();
//! ```
//!
//! # Containers
//! See the [`mux`] module.
#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::identity_op)]
extern crate alloc;

pub use decoder::{argb_to_bgra, argb_to_rgb, argb_to_rgba, decode_lossless, WebpDecoder};
pub use encoder::{encode_lossless, WebpEncoder};
pub use errors::{MuxErrors, WebpErrors};
pub use options::{LosslessOptions, PredictorChoice};
pub use zune_core;

pub mod bitstream;
mod constants;
mod decoder;
mod encoder;
mod errors;
pub mod huffman;
pub mod lossless;
pub mod mux;
mod options;
pub mod transforms;
