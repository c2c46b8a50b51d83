/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Least significant bit first reader over a borrowed buffer

/// Maximum number of bits a single `read_bits` call may request
pub const MAX_READ_BITS: u8 = 24;

/// A bit reader for VP8L streams
///
/// Bits are consumed from the least significant bit of each byte
/// upwards.
///
/// Reading past the end of the buffer never fails, the reader
/// hands out zero bits and remembers it did so, callers
/// check [`is_eos`](Self::is_eos) once they are done with a
/// logical unit and report the truncation there.
pub struct BitReader<'src> {
    src:       &'src [u8],
    // position of the next byte to pull into `buffer`
    position:  usize,
    // zero bytes synthesized after `src` ran out
    over_read: usize,
    bits_left: u8,
    buffer:    u64
}

impl<'src> BitReader<'src> {
    /// Create a new reader starting at the first bit of `src`
    pub fn new(src: &'src [u8]) -> BitReader<'src> {
        BitReader {
            src,
            position: 0,
            over_read: 0,
            bits_left: 0,
            buffer: 0
        }
    }

    /// Refill the bit buffer ensuring it holds between 56 and 63 bits
    #[inline(always)]
    pub fn refill(&mut self) {
        let mut buf = [0; 8];

        match self.src.get(self.position..self.position + 8) {
            Some(bytes) => {
                buf.copy_from_slice(bytes);

                let new_buffer = u64::from_le_bytes(buf);
                // bytes we fully consumed
                let num = 63 ^ self.bits_left;

                self.position += (num >> 3) as usize;
                self.buffer |= new_buffer << self.bits_left;
                self.bits_left |= 56;
            }
            None => self.refill_slow()
        }
    }

    #[inline(never)]
    fn refill_slow(&mut self) {
        let bytes = self.src.get(self.position..).unwrap_or(&[]);

        for byte in bytes {
            if self.bits_left >= 56 {
                return;
            }
            self.buffer |= u64::from(*byte) << self.bits_left;
            self.bits_left += 8;
            self.position += 1;
        }
        // out of input, pad with zeros
        while self.bits_left < 56 {
            self.bits_left += 8;
            self.over_read += 1;
        }
    }

    /// Make sure at least `bits` bits are buffered
    #[inline(always)]
    pub fn ensure(&mut self, bits: u8) {
        if self.bits_left < bits {
            self.refill();
        }
    }

    /// Read `num_bits` bits from the stream, `num_bits` must not exceed
    /// [`MAX_READ_BITS`]
    #[inline(always)]
    pub fn read_bits(&mut self, num_bits: u8) -> u32 {
        debug_assert!(num_bits <= MAX_READ_BITS);

        self.ensure(num_bits);

        let value = self.buffer & ((1_u64 << num_bits) - 1);

        self.buffer >>= num_bits;
        self.bits_left -= num_bits;

        value as u32
    }

    /// Read a single bit
    #[inline(always)]
    pub fn read_bit(&mut self) -> bool {
        self.read_bits(1) == 1
    }

    /// Look at the next `num_bits` without consuming them
    ///
    /// Call [`ensure`](Self::ensure) before, peeks only see
    /// buffered bits.
    #[inline(always)]
    pub const fn peek_bits(&self, num_bits: u8) -> u32 {
        (self.buffer & ((1_u64 << num_bits) - 1)) as u32
    }

    /// Drop `num_bits` buffered bits
    #[inline(always)]
    pub fn skip_bits(&mut self, num_bits: u8) {
        debug_assert!(self.bits_left >= num_bits);
        self.buffer >>= num_bits;
        self.bits_left -= num_bits;
    }

    /// Number of bits handed out so far
    pub const fn bit_position(&self) -> usize {
        (self.position + self.over_read) * 8 - self.bits_left as usize
    }

    /// Returns true if the reader has handed out bits that were
    /// not part of the input
    pub const fn is_eos(&self) -> bool {
        self.bit_position() > self.src.len() * 8
    }

    /// Number of whole bytes that have been read
    pub const fn bytes_consumed(&self) -> usize {
        (self.bit_position() + 7) / 8
    }

    /// Length of the underlying buffer
    pub const fn len(&self) -> usize {
        self.src.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.src.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::BitReader;

    #[test]
    fn reads_lsb_first() {
        let data = [0b1010_0110, 0xff];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(1), 0);
        assert_eq!(reader.read_bits(2), 0b11);
        assert_eq!(reader.read_bits(5), 0b10100);
        assert_eq!(reader.read_bits(8), 0xff);
        assert!(!reader.is_eos());
    }

    #[test]
    fn zero_fill_past_end() {
        let data = [0xff];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(4), 0xf);
        assert!(!reader.is_eos());
        // four real bits followed by zeros
        assert_eq!(reader.read_bits(12), 0xf);
        assert!(reader.is_eos());
        assert_eq!(reader.read_bits(24), 0);
        assert_eq!(reader.bit_position(), 40);
    }

    #[test]
    fn exact_end_is_not_eos() {
        let data = [0x12, 0x34, 0x56];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(24), 0x56_34_12);
        assert!(!reader.is_eos());
        reader.read_bits(0);
        assert!(!reader.is_eos());
        reader.read_bits(1);
        assert!(reader.is_eos());
    }

    #[test]
    fn long_stream_positions() {
        let data: Vec<u8> = (0..100_u8).collect();
        let mut reader = BitReader::new(&data);

        for i in 0..100_u32 {
            assert_eq!(reader.read_bits(8), i);
            assert_eq!(reader.bit_position(), (i as usize + 1) * 8);
        }
        assert!(!reader.is_eos());
    }
}
