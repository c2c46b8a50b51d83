/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Bit level readers and writers
//!
//! VP8L stores values least significant bit first, [`BitReader`]
//! and [`BitWriter`] implement that ordering.
//!
//! [`BoolReader`] and [`BoolWriter`] implement the binary arithmetic
//! coder used by the lossy bitstream, they are provided so that
//! alpha and lossy headers can be inspected without a full VP8 decoder.
pub use bool_coder::{BoolReader, BoolWriter};
pub use reader::BitReader;
pub use writer::BitWriter;

mod bool_coder;
mod reader;
mod writer;
