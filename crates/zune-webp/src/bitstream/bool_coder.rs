/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Boolean entropy coder used by VP8 partitions
//!
//! Each boolean is coded with an 8 bit probability that it is zero,
//! the coder keeps a `range` in `128..=255` after every symbol.

use alloc::vec::Vec;

use crate::errors::WebpErrors;

/// Left shifts needed to bring a range back into `128..=255`
#[rustfmt::skip]
static NORM_SHIFT: [u8; 256] = [
    7, 7, 6, 6, 5, 5, 5, 5, 4, 4, 4, 4, 4, 4, 4, 4,
    3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3,
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

#[inline(always)]
fn split(range: u32, probability: u8) -> u32 {
    1 + (((range - 1) * u32::from(probability)) >> 8)
}

/// Boolean decoder over a borrowed buffer
///
/// Bytes past the end of the buffer read as zero, [`is_eos`](Self::is_eos)
/// tells whether that happened.
pub struct BoolReader<'src> {
    src:       &'src [u8],
    position:  usize,
    // two byte window, grows by up to 7 bits before a refill
    value:     u32,
    range:     u32,
    bit_count: u32,
    eos:       bool
}

impl<'src> BoolReader<'src> {
    pub fn new(src: &'src [u8]) -> BoolReader<'src> {
        let mut reader = BoolReader {
            src,
            position: 0,
            value: 0,
            range: 255,
            bit_count: 0,
            eos: false
        };
        let hi = reader.next_byte();
        let lo = reader.next_byte();

        reader.value = (u32::from(hi) << 8) | u32::from(lo);
        reader
    }

    fn next_byte(&mut self) -> u8 {
        match self.src.get(self.position) {
            Some(byte) => {
                self.position += 1;
                *byte
            }
            None => {
                self.eos = true;
                0
            }
        }
    }

    /// Decode one boolean whose probability of being `false` is
    /// `probability / 256`
    #[inline]
    pub fn read_bool(&mut self, probability: u8) -> bool {
        let split = split(self.range, probability);
        let big_split = split << 8;

        let bit = if self.value >= big_split {
            self.range -= split;
            self.value -= big_split;
            true
        } else {
            self.range = split;
            false
        };

        let shift = u32::from(NORM_SHIFT[self.range as usize]);

        self.range <<= shift;
        self.value <<= shift;
        self.bit_count += shift;

        if self.bit_count >= 8 {
            self.bit_count -= 8;
            self.value |= u32::from(self.next_byte()) << self.bit_count;
        }
        bit
    }

    /// Decode a boolean with even probability
    pub fn read_flag(&mut self) -> bool {
        self.read_bool(128)
    }

    /// Read an unsigned `bits` wide value, most significant bit first
    pub fn read_literal(&mut self, bits: u8) -> u32 {
        (0..bits).fold(0, |acc, _| (acc << 1) | u32::from(self.read_flag()))
    }

    /// Read a magnitude followed by a sign flag
    pub fn read_signed(&mut self, bits: u8) -> i32 {
        let value = self.read_literal(bits) as i32;

        if self.read_flag() {
            -value
        } else {
            value
        }
    }

    /// Read a flag and, if set, a signed value, otherwise zero
    pub fn read_optional_signed(&mut self, bits: u8) -> i32 {
        if self.read_flag() {
            self.read_signed(bits)
        } else {
            0
        }
    }

    /// Current range, always in `128..=255` between calls
    pub const fn range(&self) -> u32 {
        self.range
    }

    /// True if the decoder needed bytes beyond the buffer
    pub const fn is_eos(&self) -> bool {
        self.eos
    }
}

/// Boolean encoder producing a stream [`BoolReader`] can decode
#[derive(Clone, Debug)]
pub struct BoolWriter {
    output:    Vec<u8>,
    range:     u32,
    bottom:    u32,
    // shifts left before the top byte of `bottom` is complete
    bit_count: u32
}

impl Default for BoolWriter {
    fn default() -> Self {
        BoolWriter::new()
    }
}

impl BoolWriter {
    pub fn new() -> BoolWriter {
        BoolWriter {
            output:    Vec::new(),
            range:     255,
            bottom:    0,
            bit_count: 24
        }
    }

    fn push(&mut self, byte: u8) -> Result<(), WebpErrors> {
        if self.output.len() == self.output.capacity() {
            let extra = self.output.capacity().max(64);

            self.output
                .try_reserve(extra)
                .map_err(|_| WebpErrors::AllocationFailure(self.output.len() + extra))?;
        }
        self.output.push(byte);
        Ok(())
    }

    // propagate a carry into bytes already written
    fn add_one_to_output(&mut self) {
        for byte in self.output.iter_mut().rev() {
            if *byte == 255 {
                *byte = 0;
            } else {
                *byte += 1;
                return;
            }
        }
    }

    /// Encode `bit` with a `probability / 256` chance of being `false`
    pub fn write_bool(&mut self, probability: u8, bit: bool) -> Result<(), WebpErrors> {
        let split = split(self.range, probability);

        if bit {
            self.bottom = self.bottom.wrapping_add(split);
            self.range -= split;
        } else {
            self.range = split;
        }

        for _ in 0..NORM_SHIFT[self.range as usize] {
            self.range <<= 1;

            if self.bottom & (1 << 31) != 0 {
                self.add_one_to_output();
            }
            self.bottom <<= 1;
            self.bit_count -= 1;

            if self.bit_count == 0 {
                self.push((self.bottom >> 24) as u8)?;
                self.bottom &= (1 << 24) - 1;
                self.bit_count = 8;
            }
        }
        Ok(())
    }

    pub fn write_flag(&mut self, bit: bool) -> Result<(), WebpErrors> {
        self.write_bool(128, bit)
    }

    /// Write the low `bits` of `value`, most significant bit first
    pub fn write_literal(&mut self, bits: u8, value: u32) -> Result<(), WebpErrors> {
        for i in (0..bits).rev() {
            self.write_flag((value >> i) & 1 == 1)?;
        }
        Ok(())
    }

    pub fn write_signed(&mut self, bits: u8, value: i32) -> Result<(), WebpErrors> {
        self.write_literal(bits, value.unsigned_abs())?;
        self.write_flag(value < 0)
    }

    pub fn write_optional_signed(&mut self, bits: u8, value: i32) -> Result<(), WebpErrors> {
        self.write_flag(value != 0)?;

        if value != 0 {
            self.write_signed(bits, value)?;
        }
        Ok(())
    }

    /// Flush pending state and return the coded bytes
    pub fn finish(mut self) -> Result<Vec<u8>, WebpErrors> {
        let count = self.bit_count;
        let mut value = self.bottom;

        if count < 32 && value & (1 << (32 - count)) != 0 {
            self.add_one_to_output();
        }
        value <<= count & 7;

        for _ in 0..count >> 3 {
            value <<= 8;
        }
        for _ in 0..4 {
            self.push((value >> 24) as u8)?;
            value <<= 8;
        }
        Ok(self.output)
    }
}

#[cfg(test)]
mod tests {
    use nanorand::{Rng, WyRand};

    use super::{BoolReader, BoolWriter};

    #[test]
    fn range_stays_normalized() {
        let data = [0x5a, 0x13, 0xff, 0x00, 0x81];
        let mut reader = BoolReader::new(&data);

        for prob in 1..=255_u8 {
            reader.read_bool(prob);
            assert!((128..=255).contains(&reader.range()));
        }
        assert!(reader.is_eos());
    }

    #[test]
    fn random_booleans_round_trip() {
        let mut rng = WyRand::new_seed(0x5eed);
        let mut symbols = Vec::new();

        for _ in 0..20_000 {
            let prob = rng.generate_range(1_u8..=255);
            let bit = rng.generate_range(0_u16..256) >= u16::from(prob);
            symbols.push((prob, bit));
        }

        let mut writer = BoolWriter::new();
        for &(prob, bit) in &symbols {
            writer.write_bool(prob, bit).unwrap();
        }
        let bytes = writer.finish().unwrap();

        let mut reader = BoolReader::new(&bytes);
        for &(prob, bit) in &symbols {
            assert_eq!(reader.read_bool(prob), bit);
        }
    }

    #[test]
    fn literals_round_trip() {
        let mut writer = BoolWriter::new();
        writer.write_literal(7, 0x55).unwrap();
        writer.write_signed(6, -17).unwrap();
        writer.write_optional_signed(4, 0).unwrap();
        writer.write_optional_signed(4, 9).unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = BoolReader::new(&bytes);
        assert_eq!(reader.read_literal(7), 0x55);
        assert_eq!(reader.read_signed(6), -17);
        assert_eq!(reader.read_optional_signed(4), 0);
        assert_eq!(reader.read_optional_signed(4), 9);
    }
}
