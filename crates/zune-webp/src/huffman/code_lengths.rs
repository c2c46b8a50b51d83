/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Reading prefix code descriptions
//!
//! A code is either *simple*, one or two symbols stored verbatim, or
//! *normal*, where the code lengths are themselves prefix coded
//! with a 19 symbol alphabet which is read first.

use alloc::vec;
use alloc::vec::Vec;

use log::trace;

use crate::bitstream::BitReader;
use crate::constants::{
    CODE_LENGTH_CODE_ORDER, CODE_LENGTH_EXTRA_BITS, CODE_LENGTH_LITERALS,
    CODE_LENGTH_REPEAT_CODE, CODE_LENGTH_REPEAT_OFFSETS, DEFAULT_CODE_LENGTH, LENGTHS_TABLE_BITS,
    NUM_CODE_LENGTH_CODES
};
use crate::errors::WebpErrors;
use crate::huffman::HuffmanTable;

/// Read a prefix code description for an alphabet of `alphabet_size`
/// symbols and return the per symbol code lengths
pub fn read_code_lengths(
    reader: &mut BitReader, alphabet_size: usize
) -> Result<Vec<u8>, WebpErrors> {
    let mut code_lengths = vec![0_u8; alphabet_size];

    if reader.read_bit() {
        // simple code
        let num_symbols = reader.read_bits(1) + 1;
        let first_symbol_bits = if reader.read_bit() { 8 } else { 1 };

        let first = reader.read_bits(first_symbol_bits) as usize;
        *code_lengths
            .get_mut(first)
            .ok_or(WebpErrors::CorruptData("Simple code symbol out of range"))? = 1;

        if num_symbols == 2 {
            let second = reader.read_bits(8) as usize;
            *code_lengths
                .get_mut(second)
                .ok_or(WebpErrors::CorruptData("Simple code symbol out of range"))? = 1;
        }
        trace!("Simple prefix code with {num_symbols} symbol(s)");
    } else {
        let mut code_length_code_lengths = [0_u8; NUM_CODE_LENGTH_CODES];
        let num_codes = reader.read_bits(4) as usize + 4;

        for &pos in &CODE_LENGTH_CODE_ORDER[..num_codes] {
            code_length_code_lengths[usize::from(pos)] = reader.read_bits(3) as u8;
        }
        read_huffman_code_lengths(reader, &code_length_code_lengths, &mut code_lengths)?;
    }

    if reader.is_eos() {
        return Err(WebpErrors::TruncatedStream(
            reader.bytes_consumed(),
            reader.len()
        ));
    }
    Ok(code_lengths)
}

/// Second pass of the bootstrap, decode the real code lengths using the
/// code length code
fn read_huffman_code_lengths(
    reader: &mut BitReader, code_length_code_lengths: &[u8], code_lengths: &mut [u8]
) -> Result<(), WebpErrors> {
    let num_symbols = code_lengths.len();
    let table = HuffmanTable::build_with_root(LENGTHS_TABLE_BITS, code_length_code_lengths)?;

    let mut max_symbol = if reader.read_bit() {
        let length_nbits = 2 + 2 * reader.read_bits(3) as u8;
        let max_symbol = 2 + reader.read_bits(length_nbits) as usize;

        if max_symbol > num_symbols {
            return Err(WebpErrors::CorruptData("max_symbol larger than alphabet"));
        }
        max_symbol
    } else {
        num_symbols
    };

    let mut symbol = 0;
    let mut prev_code_len = DEFAULT_CODE_LENGTH;

    while symbol < num_symbols {
        if max_symbol == 0 {
            break;
        }
        max_symbol -= 1;

        let code_len = table.read_symbol(reader) as u8;

        if code_len < CODE_LENGTH_LITERALS {
            code_lengths[symbol] = code_len;
            symbol += 1;

            if code_len != 0 {
                prev_code_len = code_len;
            }
        } else {
            let slot = usize::from(code_len - CODE_LENGTH_REPEAT_CODE);
            let extra_bits = CODE_LENGTH_EXTRA_BITS[slot];
            let repeat_offset = usize::from(CODE_LENGTH_REPEAT_OFFSETS[slot]);
            let repeat = reader.read_bits(extra_bits) as usize + repeat_offset;

            if symbol + repeat > num_symbols {
                return Err(WebpErrors::CorruptData("Code length repeat overflows alphabet"));
            }
            let length = if code_len == CODE_LENGTH_REPEAT_CODE {
                prev_code_len
            } else {
                0
            };
            code_lengths[symbol..symbol + repeat].fill(length);
            symbol += repeat;
        }

        if reader.is_eos() {
            break;
        }
    }
    Ok(())
}

/// Read a prefix code description and build its decode table
pub fn read_huffman_code(
    reader: &mut BitReader, alphabet_size: usize
) -> Result<HuffmanTable, WebpErrors> {
    let code_lengths = read_code_lengths(reader, alphabet_size)?;

    HuffmanTable::build(&code_lengths)
}

#[cfg(test)]
mod tests {
    use super::read_code_lengths;
    use crate::bitstream::{BitReader, BitWriter};
    use crate::errors::WebpErrors;

    #[test]
    fn simple_code_two_symbols() {
        let mut writer = BitWriter::new();
        // simple, two symbols, 8 bit first symbol
        writer.put_bits(1, 1).unwrap();
        writer.put_bits(1, 1).unwrap();
        writer.put_bits(1, 1).unwrap();
        writer.put_bits(8, 200).unwrap();
        writer.put_bits(8, 3).unwrap();
        let bytes = writer.finish().unwrap();

        let lengths = read_code_lengths(&mut BitReader::new(&bytes), 256).unwrap();

        assert_eq!(lengths[200], 1);
        assert_eq!(lengths[3], 1);
        assert_eq!(lengths.iter().filter(|x| **x != 0).count(), 2);
    }

    #[test]
    fn simple_code_out_of_alphabet() {
        let mut writer = BitWriter::new();
        writer.put_bits(1, 1).unwrap();
        writer.put_bits(1, 0).unwrap();
        writer.put_bits(1, 1).unwrap();
        writer.put_bits(8, 45).unwrap();
        let bytes = writer.finish().unwrap();

        let err = read_code_lengths(&mut BitReader::new(&bytes), 40);
        assert!(matches!(err, Err(WebpErrors::CorruptData(_))));
    }

    #[test]
    fn normal_code_with_repeats() {
        // code length code: symbols 1, 17 and 16 each with length 2,
        // symbol 0 with length 2 too, giving a complete 4 symbol code
        let mut cl = [0_u8; 19];
        cl[0] = 2;
        cl[1] = 2;
        cl[16] = 2;
        cl[17] = 2;

        let mut writer = BitWriter::new();
        writer.put_bits(1, 0).unwrap();
        // order is 17, 18, 0, 1, 2, 3, 4, 5, 16 so store 9 entries
        writer.put_bits(4, 9 - 4).unwrap();
        for pos in [17, 18, 0, 1, 2, 3, 4, 5, 16] {
            writer.put_bits(3, u32::from(cl[pos])).unwrap();
        }
        // no max symbol
        writer.put_bits(1, 0).unwrap();

        let codes = crate::huffman::canonical_codes(&cl);
        let put = |writer: &mut BitWriter, sym: usize| {
            writer.put_bits(cl[sym], u32::from(codes[sym])).unwrap();
        };
        // length 1, then repeat previous 3 times, then 5 zeros
        put(&mut writer, 1);
        put(&mut writer, 16);
        writer.put_bits(2, 0).unwrap();
        put(&mut writer, 17);
        writer.put_bits(3, 2).unwrap();
        // one more symbol of length zero and we are at 10 symbols
        put(&mut writer, 0);
        let bytes = writer.finish().unwrap();

        let lengths = read_code_lengths(&mut BitReader::new(&bytes), 10).unwrap();
        assert_eq!(lengths, [1, 1, 1, 1, 0, 0, 0, 0, 0, 0]);
    }
}
