/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Canonical prefix codes
//!
//! The decoding side builds two level lookup tables from code lengths,
//! the encoding side builds length limited codes from histograms and
//! writes their description using the code length alphabet.
pub use builder::{HuffmanCode, HuffmanTable};
pub use code_lengths::{read_code_lengths, read_huffman_code};
pub use encode::{canonical_codes, limited_code_lengths, PrefixCode};

mod builder;
mod code_lengths;
mod encode;
