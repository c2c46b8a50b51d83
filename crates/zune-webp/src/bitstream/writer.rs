/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Least significant bit first writer

use alloc::vec::Vec;

use crate::errors::WebpErrors;

/// Smallest capacity the writer grows to
const MIN_CAPACITY: usize = 64;

/// A bit writer that owns its output
///
/// Bits are appended from the low end of each value, which
/// mirrors [`BitReader`](crate::bitstream::BitReader).
/// The output grows geometrically, a failed growth is reported
/// as [`WebpErrors::AllocationFailure`].
#[derive(Clone, Debug, Default)]
pub struct BitWriter {
    bits_in_buffer: u8,
    buffer:         u64,
    dest:           Vec<u8>
}

impl BitWriter {
    /// Construct a new bit-writer
    pub fn new() -> BitWriter {
        BitWriter {
            bits_in_buffer: 0,
            buffer:         0,
            dest:           Vec::new()
        }
    }

    /// Construct a bit writer whose output already holds `bytes`
    ///
    /// Used to write a bitstream after a fixed header
    pub fn with_prefix(bytes: &[u8]) -> Result<BitWriter, WebpErrors> {
        let mut writer = BitWriter::new();
        writer.grow(bytes.len())?;
        writer.dest.extend_from_slice(bytes);
        Ok(writer)
    }

    fn grow(&mut self, additional: usize) -> Result<(), WebpErrors> {
        let spare = self.dest.capacity() - self.dest.len();

        if spare < additional {
            // double, but never by less than we need
            let extra = self
                .dest
                .capacity()
                .max(MIN_CAPACITY)
                .max(additional);

            self.dest
                .try_reserve(extra)
                .map_err(|_| WebpErrors::AllocationFailure(self.dest.len() + extra))?;
        }
        Ok(())
    }

    /// Write whole bytes in the bit buffer to the output
    ///
    /// This may leave between 0-7 bits remaining in the bit buffer
    fn flush(&mut self) -> Result<(), WebpErrors> {
        let bits_written = self.bits_in_buffer & 56;
        let bytes_written = usize::from(bits_written >> 3);

        self.grow(bytes_written)?;

        let buf = self.buffer.to_le_bytes();
        self.dest.extend_from_slice(&buf[..bytes_written]);

        self.buffer >>= bits_written;
        self.bits_in_buffer &= 7;

        Ok(())
    }

    /// Append the low `nbits` of `bits` to the stream
    ///
    /// `nbits` can be at most 32
    pub fn put_bits(&mut self, nbits: u8, bits: u32) -> Result<(), WebpErrors> {
        debug_assert!(nbits <= 32);

        if self.bits_in_buffer + nbits > 56 {
            self.flush()?;
        }
        debug_assert!(nbits + self.bits_in_buffer < 64);

        let mask = (1_u64 << nbits) - 1;

        self.buffer |= (mask & u64::from(bits)) << self.bits_in_buffer;
        self.bits_in_buffer += nbits;

        Ok(())
    }

    /// Append a single bit
    pub fn put_bit(&mut self, bit: bool) -> Result<(), WebpErrors> {
        self.put_bits(1, u32::from(bit))
    }

    /// Number of bits written so far
    pub fn bits_written(&self) -> usize {
        self.dest.len() * 8 + usize::from(self.bits_in_buffer)
    }

    /// Pad the final partial byte with zeros and return the output
    pub fn finish(mut self) -> Result<Vec<u8>, WebpErrors> {
        self.flush()?;

        if self.bits_in_buffer != 0 {
            self.put_bits(8 - self.bits_in_buffer, 0)?;
            self.flush()?;
        }
        Ok(self.dest)
    }
}

#[cfg(test)]
mod tests {
    use super::BitWriter;
    use crate::bitstream::BitReader;

    #[test]
    fn pads_final_byte() {
        let mut writer = BitWriter::new();
        writer.put_bits(3, 0b101).unwrap();
        assert_eq!(writer.bits_written(), 3);

        let bytes = writer.finish().unwrap();
        assert_eq!(bytes, [0b101]);
    }

    #[test]
    fn empty_writer_has_no_output() {
        let bytes = BitWriter::new().finish().unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn prefix_is_kept() {
        let mut writer = BitWriter::with_prefix(b"RIFF").unwrap();
        writer.put_bits(8, 0x2f).unwrap();

        assert_eq!(writer.finish().unwrap(), b"RIFF/");
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut writer = BitWriter::new();

        for i in 0..10_000_u32 {
            writer.put_bits(13, i).unwrap();
        }
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes.len(), (10_000 * 13 + 7) / 8);

        let mut reader = BitReader::new(&bytes);
        for i in 0..10_000_u32 {
            assert_eq!(reader.read_bits(13), i & 0x1fff);
        }
    }
}
