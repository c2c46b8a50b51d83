/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Building and writing prefix codes

use alloc::collections::BinaryHeap;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Reverse;

use crate::bitstream::BitWriter;
use crate::constants::{
    CODE_LENGTH_CODE_ORDER, CODE_LENGTH_EXTRA_BITS, DEFAULT_CODE_LENGTH,
    MAX_ALLOWED_CODE_LENGTH, MAX_CODE_LENGTH_CODE_LENGTH, NUM_CODE_LENGTH_CODES
};
use crate::errors::WebpErrors;

/// Compute code lengths no longer than `max_length` for `histogram`
///
/// Builds an ordinary Huffman tree, if it ends up too deep the
/// smallest counts are raised and the tree is rebuilt until it fits.
/// Unused symbols get a length of zero, a histogram with a single
/// used symbol gives that symbol a length of one.
pub fn limited_code_lengths(histogram: &[u32], max_length: u8) -> Vec<u8> {
    let mut lengths = vec![0_u8; histogram.len()];

    let used: Vec<usize> = (0..histogram.len())
        .filter(|&i| histogram[i] != 0)
        .collect();

    match used.len() {
        0 => return lengths,
        1 => {
            lengths[used[0]] = 1;
            return lengths;
        }
        _ => ()
    }

    let mut count_min = 1_u64;

    loop {
        let weights: Vec<u64> = used
            .iter()
            .map(|&s| u64::from(histogram[s]).max(count_min))
            .collect();

        let depths = tree_depths(&weights);

        if depths.iter().all(|&d| d <= max_length) {
            for (&symbol, depth) in used.iter().zip(depths) {
                lengths[symbol] = depth;
            }
            return lengths;
        }
        count_min *= 2;
    }
}

/// Depth of every leaf in a Huffman tree over `weights`
fn tree_depths(weights: &[u64]) -> Vec<u8> {
    let num_leaves = weights.len();
    // children of internal nodes, leaves are 0..num_leaves
    let mut children: Vec<(usize, usize)> = Vec::with_capacity(num_leaves);
    let mut heap = BinaryHeap::with_capacity(num_leaves);

    for (index, &weight) in weights.iter().enumerate() {
        heap.push(Reverse((weight, index)));
    }

    while heap.len() > 1 {
        let (Some(Reverse((w1, a))), Some(Reverse((w2, b)))) = (heap.pop(), heap.pop()) else {
            break;
        };
        let node = num_leaves + children.len();

        children.push((a, b));
        heap.push(Reverse((w1 + w2, node)));
    }

    let mut depths = vec![0_u8; num_leaves];
    let mut stack = Vec::with_capacity(num_leaves);

    stack.push((num_leaves + children.len() - 1, 0_u8));

    while let Some((node, depth)) = stack.pop() {
        if node < num_leaves {
            depths[node] = depth;
        } else {
            let (left, right) = children[node - num_leaves];
            // saturate, deep trees are rejected by the caller anyway
            let next = depth.saturating_add(1);

            stack.push((left, next));
            stack.push((right, next));
        }
    }
    depths
}

/// Canonical codes for `lengths`, bit reversed so they can be
/// written least significant bit first
pub fn canonical_codes(lengths: &[u8]) -> Vec<u16> {
    let mut count = [0_u16; MAX_ALLOWED_CODE_LENGTH + 1];

    for &len in lengths {
        count[usize::from(len)] += 1;
    }
    count[0] = 0;

    let mut next_code = [0_u16; MAX_ALLOWED_CODE_LENGTH + 1];
    let mut code = 0_u16;

    for len in 1..=MAX_ALLOWED_CODE_LENGTH {
        code = (code + count[len - 1]) << 1;
        next_code[len] = code;
    }

    lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                return 0;
            }
            let code = next_code[usize::from(len)];
            next_code[usize::from(len)] += 1;

            code.reverse_bits() >> (16 - len)
        })
        .collect()
}

/// A prefix code ready for writing
#[derive(Clone, Debug)]
pub struct PrefixCode {
    lengths: Vec<u8>,
    codes:   Vec<u16>,
    // a code with at most one used symbol is written with zero bits
    trivial: bool
}

impl PrefixCode {
    /// Build a code limited to 15 bits from a histogram of symbol counts
    pub fn from_histogram(histogram: &[u32]) -> PrefixCode {
        PrefixCode::from_histogram_limited(histogram, MAX_ALLOWED_CODE_LENGTH as u8)
    }

    fn from_histogram_limited(histogram: &[u32], max_length: u8) -> PrefixCode {
        let lengths = limited_code_lengths(histogram, max_length);
        let codes = canonical_codes(&lengths);
        let trivial = lengths.iter().filter(|&&l| l != 0).count() <= 1;

        PrefixCode {
            lengths,
            codes,
            trivial
        }
    }

    /// Code length of every symbol
    pub fn lengths(&self) -> &[u8] {
        &self.lengths
    }

    /// Number of bits needed to write `symbol`
    pub fn cost(&self, symbol: usize) -> usize {
        if self.trivial {
            0
        } else {
            usize::from(self.lengths[symbol])
        }
    }

    /// Write `symbol`
    #[inline]
    pub fn write_symbol(&self, writer: &mut BitWriter, symbol: usize) -> Result<(), WebpErrors> {
        if self.trivial {
            return Ok(());
        }
        debug_assert!(self.lengths[symbol] != 0);
        writer.put_bits(self.lengths[symbol], u32::from(self.codes[symbol]))
    }

    /// Write the description of this code so a decoder can rebuild it
    pub fn write_description(&self, writer: &mut BitWriter) -> Result<(), WebpErrors> {
        let used: Vec<usize> = (0..self.lengths.len())
            .filter(|&i| self.lengths[i] != 0)
            .collect();

        match used.as_slice() {
            [] => {
                // simple code for symbol zero
                writer.put_bits(1, 1)?;
                writer.put_bits(1, 0)?;
                writer.put_bits(1, 0)?;
                writer.put_bits(1, 0)
            }
            [a] if *a < 256 => write_simple(writer, &[*a]),
            [a, b] if *a < 256 && *b < 256 => write_simple(writer, &[*a, *b]),
            _ => self.write_normal(writer)
        }
    }

    fn write_normal(&self, writer: &mut BitWriter) -> Result<(), WebpErrors> {
        let tokens = tokenize_code_lengths(&self.lengths);

        let mut histogram = [0_u32; NUM_CODE_LENGTH_CODES];
        for token in &tokens {
            histogram[usize::from(token.code)] += 1;
        }
        let length_code =
            PrefixCode::from_histogram_limited(&histogram, MAX_CODE_LENGTH_CODE_LENGTH);

        let mut codes_to_store = NUM_CODE_LENGTH_CODES;

        while codes_to_store > 4
            && length_code.lengths[usize::from(CODE_LENGTH_CODE_ORDER[codes_to_store - 1])] == 0
        {
            codes_to_store -= 1;
        }

        writer.put_bits(1, 0)?;
        writer.put_bits(4, (codes_to_store - 4) as u32)?;

        for &pos in &CODE_LENGTH_CODE_ORDER[..codes_to_store] {
            writer.put_bits(3, u32::from(length_code.lengths[usize::from(pos)]))?;
        }
        // no max_symbol, every length is coded
        writer.put_bits(1, 0)?;

        for token in &tokens {
            length_code.write_symbol(writer, usize::from(token.code))?;

            if token.code >= 16 {
                let extra = CODE_LENGTH_EXTRA_BITS[usize::from(token.code - 16)];
                writer.put_bits(extra, u32::from(token.extra))?;
            }
        }
        Ok(())
    }
}

fn write_simple(writer: &mut BitWriter, symbols: &[usize]) -> Result<(), WebpErrors> {
    writer.put_bits(1, 1)?;
    writer.put_bits(1, (symbols.len() - 1) as u32)?;

    if symbols[0] < 2 {
        writer.put_bits(1, 0)?;
        writer.put_bits(1, symbols[0] as u32)?;
    } else {
        writer.put_bits(1, 1)?;
        writer.put_bits(8, symbols[0] as u32)?;
    }
    if let Some(&second) = symbols.get(1) {
        writer.put_bits(8, second as u32)?;
    }
    Ok(())
}

/// A code length alphabet symbol and its extra bits
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Token {
    code:  u8,
    extra: u8
}

fn push_repeated_zeros(tokens: &mut Vec<Token>, mut repetitions: usize) {
    while repetitions >= 1 {
        if repetitions < 3 {
            for _ in 0..repetitions {
                tokens.push(Token { code: 0, extra: 0 });
            }
            break;
        } else if repetitions < 11 {
            tokens.push(Token {
                code:  17,
                extra: (repetitions - 3) as u8
            });
            break;
        } else if repetitions < 139 {
            tokens.push(Token {
                code:  18,
                extra: (repetitions - 11) as u8
            });
            break;
        } else {
            tokens.push(Token {
                code:  18,
                extra: 0x7f
            });
            repetitions -= 138;
        }
    }
}

fn push_repeated_values(tokens: &mut Vec<Token>, mut repetitions: usize, value: u8, prev: u8) {
    if value != prev {
        tokens.push(Token {
            code:  value,
            extra: 0
        });
        repetitions -= 1;
    }
    while repetitions >= 1 {
        if repetitions < 3 {
            for _ in 0..repetitions {
                tokens.push(Token {
                    code:  value,
                    extra: 0
                });
            }
            break;
        } else if repetitions < 7 {
            tokens.push(Token {
                code:  16,
                extra: (repetitions - 3) as u8
            });
            break;
        } else {
            tokens.push(Token { code: 16, extra: 3 });
            repetitions -= 6;
        }
    }
}

/// Run length code a sequence of code lengths with the repeat
/// symbols 16, 17 and 18
fn tokenize_code_lengths(lengths: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(lengths.len());
    let mut prev = DEFAULT_CODE_LENGTH;
    let mut i = 0;

    while i < lengths.len() {
        let value = lengths[i];
        let runs = lengths[i..].iter().take_while(|&&l| l == value).count();

        if value == 0 {
            push_repeated_zeros(&mut tokens, runs);
        } else {
            push_repeated_values(&mut tokens, runs, value, prev);
            prev = value;
        }
        i += runs;
    }
    tokens
}

#[cfg(test)]
mod tests {
    use nanorand::{Rng, WyRand};

    use super::{canonical_codes, limited_code_lengths, tokenize_code_lengths, PrefixCode};
    use crate::bitstream::{BitReader, BitWriter};
    use crate::huffman::{read_code_lengths, HuffmanTable};

    fn kraft_sum(lengths: &[u8]) -> u64 {
        lengths
            .iter()
            .filter(|&&l| l != 0)
            .map(|&l| 1_u64 << (15 - l))
            .sum()
    }

    #[test]
    fn lengths_respect_limit() {
        // fibonacci counts produce a maximally deep tree
        let mut histogram = vec![1_u32, 1];
        while histogram.len() < 30 {
            let n = histogram.len();
            histogram.push(histogram[n - 1] + histogram[n - 2]);
        }
        let lengths = limited_code_lengths(&histogram, 15);

        assert!(lengths.iter().all(|&l| l <= 15 && l > 0));
        assert_eq!(kraft_sum(&lengths), 1 << 15);
    }

    #[test]
    fn canonical_codes_are_ordered() {
        let lengths = [2, 1, 3, 3];
        let codes = canonical_codes(&lengths);
        // 10, 0, 110, 111 reversed
        assert_eq!(codes, [0b01, 0b0, 0b011, 0b111]);
    }

    #[test]
    fn tokens_expand_back() {
        let mut lengths = vec![0_u8; 300];
        lengths[0..20].fill(8);
        lengths[150..160].fill(3);
        lengths[299] = 15;

        let mut expanded = Vec::new();
        let mut prev = 8;
        for token in tokenize_code_lengths(&lengths) {
            match token.code {
                16 => expanded.extend(core::iter::repeat(prev).take(token.extra as usize + 3)),
                17 => expanded.extend(core::iter::repeat(0).take(token.extra as usize + 3)),
                18 => expanded.extend(core::iter::repeat(0).take(token.extra as usize + 11)),
                len => {
                    expanded.push(len);
                    if len != 0 {
                        prev = len;
                    }
                }
            }
        }
        assert_eq!(expanded, lengths);
    }

    #[test]
    fn written_codes_decode() {
        let mut rng = WyRand::new_seed(42);

        for alphabet in [2_usize, 40, 256, 280, 280 + 2048] {
            let mut histogram = vec![0_u32; alphabet];
            for slot in histogram.iter_mut() {
                if rng.generate_range(0_u8..4) != 0 {
                    *slot = rng.generate_range(0_u32..10_000);
                }
            }
            let code = PrefixCode::from_histogram(&histogram);

            let mut writer = BitWriter::new();
            code.write_description(&mut writer).unwrap();

            let symbols: Vec<usize> = (0..500)
                .map(|_| rng.generate_range(0..alphabet))
                .filter(|&s| histogram[s] != 0)
                .collect();
            for &s in &symbols {
                code.write_symbol(&mut writer, s).unwrap();
            }
            let bytes = writer.finish().unwrap();

            let mut reader = BitReader::new(&bytes);
            let lengths = read_code_lengths(&mut reader, alphabet).unwrap();
            let table = HuffmanTable::build(&lengths).unwrap();

            for &s in &symbols {
                assert_eq!(usize::from(table.read_symbol(&mut reader)), s);
            }
            assert!(!reader.is_eos());
        }
    }

    #[test]
    fn trivial_codes_decode_without_bits() {
        for symbol in [0_usize, 1, 200, 279] {
            let mut histogram = vec![0_u32; 280];
            histogram[symbol] = 77;

            let code = PrefixCode::from_histogram(&histogram);
            let mut writer = BitWriter::new();
            code.write_description(&mut writer).unwrap();
            code.write_symbol(&mut writer, symbol).unwrap();
            let bytes = writer.finish().unwrap();

            let mut reader = BitReader::new(&bytes);
            let table = HuffmanTable::build(&read_code_lengths(&mut reader, 280).unwrap()).unwrap();
            assert_eq!(table.single_symbol(), Some(symbol as u16));
        }
    }
}
