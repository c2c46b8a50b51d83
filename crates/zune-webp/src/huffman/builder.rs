/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Two level decode tables

use alloc::vec;
use alloc::vec::Vec;

use crate::bitstream::BitReader;
use crate::constants::{HUFFMAN_TABLE_BITS, MAX_ALLOWED_CODE_LENGTH};
use crate::errors::WebpErrors;

/// A single table entry
///
/// For a leaf `bits` is the code length (relative to the table it lives in)
/// and `value` the symbol.
/// For a root entry pointing into a second level table `bits`
/// is the root width plus the width of that table and `value`
/// the index where the table starts.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct HuffmanCode {
    pub bits:  u8,
    pub value: u16
}

/// A decode table for a canonical prefix code
#[derive(Clone, Debug)]
pub struct HuffmanTable {
    root_bits: u8,
    entries:   Vec<HuffmanCode>
}

/// Return the bit reversed increment of `key` for a code of `len` bits
///
/// Canonical codes are stored reversed because the stream is read
/// least significant bit first.
#[inline]
pub(crate) const fn next_key(key: u32, len: usize) -> u32 {
    let mut step = 1 << (len - 1);

    while key & step != 0 {
        step >>= 1;
    }
    if step == 0 {
        key
    } else {
        (key & (step - 1)) + step
    }
}

/// Store `code` in `table[end - step]`, `table[end - 2 * step]`, ... `table[0]`
#[inline]
fn replicate_value(table: &mut [HuffmanCode], step: usize, mut end: usize, code: HuffmanCode) {
    loop {
        end -= step;
        table[end] = code;

        if end == 0 {
            break;
        }
    }
}

/// Width of the second level table needed for the codes
/// starting at length `len`
fn next_table_bit_size(count: &[u16], mut len: usize, root_bits: usize) -> usize {
    let mut left = 1_i32 << (len - root_bits);

    while len < MAX_ALLOWED_CODE_LENGTH {
        left -= i32::from(count[len]);

        if left <= 0 {
            break;
        }
        len += 1;
        left <<= 1;
    }
    len - root_bits
}

impl HuffmanTable {
    /// Build a table with the default root width of 8 bits
    pub fn build(code_lengths: &[u8]) -> Result<HuffmanTable, WebpErrors> {
        HuffmanTable::build_with_root(HUFFMAN_TABLE_BITS, code_lengths)
    }

    /// Build a table from `code_lengths`, where the index is the
    /// symbol and zero marks an unused symbol
    ///
    /// Codes longer than `root_bits` live in second level tables.
    ///
    /// # Errors
    /// [`WebpErrors::MalformedTable`] if a length exceeds 15, no symbol is
    /// used or the lengths do not describe a complete prefix code.
    /// A code with a single used symbol is accepted, it decodes
    /// without consuming bits.
    pub fn build_with_root(
        root_bits: u8, code_lengths: &[u8]
    ) -> Result<HuffmanTable, WebpErrors> {
        let root = usize::from(root_bits);

        if code_lengths.len() > usize::from(u16::MAX) {
            return Err(WebpErrors::GenericStatic("Alphabet too large"));
        }
        let mut count = [0_u16; MAX_ALLOWED_CODE_LENGTH + 1];

        for &len in code_lengths {
            if usize::from(len) > MAX_ALLOWED_CODE_LENGTH {
                return Err(WebpErrors::MalformedTable);
            }
            count[usize::from(len)] += 1;
        }
        if usize::from(count[0]) == code_lengths.len() {
            return Err(WebpErrors::MalformedTable);
        }

        // symbols sorted by length then by value
        let mut offset = [0_u16; MAX_ALLOWED_CODE_LENGTH + 1];

        for len in 1..MAX_ALLOWED_CODE_LENGTH {
            if u32::from(count[len]) > (1 << len) {
                return Err(WebpErrors::MalformedTable);
            }
            offset[len + 1] = offset[len] + count[len];
        }
        let num_used = usize::from(code_lengths.len() as u16 - count[0]);
        let mut sorted = vec![0_u16; num_used];

        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len > 0 {
                let pos = &mut offset[usize::from(len)];
                sorted[usize::from(*pos)] = symbol as u16;
                *pos += 1;
            }
        }

        let root_size = 1_usize << root;
        let mut entries = vec![HuffmanCode::default(); root_size];

        if num_used == 1 {
            let code = HuffmanCode {
                bits:  0,
                value: sorted[0]
            };
            replicate_value(&mut entries, 1, root_size, code);

            return Ok(HuffmanTable { root_bits, entries });
        }

        let mut key = 0_u32;
        let mut symbol = 0;
        let mut num_nodes = 1_i32;
        let mut num_open = 1_i32;

        // root table
        let mut step = 2;
        for len in 1..=root {
            num_open <<= 1;
            num_nodes += num_open;
            num_open -= i32::from(count[len]);

            if num_open < 0 {
                return Err(WebpErrors::MalformedTable);
            }
            for _ in 0..count[len] {
                let code = HuffmanCode {
                    bits:  len as u8,
                    value: sorted[symbol]
                };
                replicate_value(&mut entries[key as usize..], step, root_size, code);
                key = next_key(key, len);
                symbol += 1;
            }
            step <<= 1;
        }

        // second level tables
        let mask = (root_size - 1) as u32;
        let mut low = u32::MAX;
        let mut table_start = 0;
        let mut table_size = root_size;

        step = 2;
        for len in root + 1..=MAX_ALLOWED_CODE_LENGTH {
            num_open <<= 1;
            num_nodes += num_open;
            num_open -= i32::from(count[len]);

            if num_open < 0 {
                return Err(WebpErrors::MalformedTable);
            }
            for _ in 0..count[len] {
                if key & mask != low {
                    table_start += table_size;

                    let table_bits = next_table_bit_size(&count, len, root);
                    table_size = 1 << table_bits;
                    entries.resize(table_start + table_size, HuffmanCode::default());

                    low = key & mask;
                    entries[low as usize] = HuffmanCode {
                        bits:  (table_bits + root) as u8,
                        value: table_start as u16
                    };
                }
                let code = HuffmanCode {
                    bits:  (len - root) as u8,
                    value: sorted[symbol]
                };
                let start = table_start + (key >> root_bits) as usize;

                replicate_value(&mut entries[start..], step, table_size, code);
                key = next_key(key, len);
                symbol += 1;
            }
            step <<= 1;
        }

        if num_nodes != 2 * offset[MAX_ALLOWED_CODE_LENGTH] as i32 - 1 {
            return Err(WebpErrors::MalformedTable);
        }

        Ok(HuffmanTable { root_bits, entries })
    }

    /// Decode one symbol
    #[inline]
    pub fn read_symbol(&self, reader: &mut BitReader) -> u16 {
        reader.ensure(MAX_ALLOWED_CODE_LENGTH as u8);

        let mut entry = self.entries[reader.peek_bits(self.root_bits) as usize];

        if entry.bits > self.root_bits {
            reader.skip_bits(self.root_bits);

            let index = usize::from(entry.value)
                + reader.peek_bits(entry.bits - self.root_bits) as usize;
            entry = self.entries[index];
        }
        reader.skip_bits(entry.bits);
        entry.value
    }

    /// If every entry decodes to the same symbol without consuming
    /// bits, return that symbol
    pub fn single_symbol(&self) -> Option<u16> {
        let first = self.entries[0];

        if first.bits == 0 {
            Some(first.value)
        } else {
            None
        }
    }

    /// Total number of entries across all levels
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Width of the root table
    pub const fn root_bits(&self) -> u8 {
        self.root_bits
    }
}
