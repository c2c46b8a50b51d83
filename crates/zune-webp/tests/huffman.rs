/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use nanorand::{Rng, WyRand};
use zune_webp::bitstream::{BitReader, BitWriter};
use zune_webp::huffman::{canonical_codes, read_huffman_code, HuffmanTable, PrefixCode};
use zune_webp::WebpErrors;

/// Depths of a random full binary tree with `leaves` leaves,
/// none deeper than 15
fn random_complete_depths(rng: &mut WyRand, leaves: usize) -> Vec<u8> {
    let mut depths = vec![1_u8, 1];

    while depths.len() < leaves {
        let i = rng.generate_range(0..depths.len());

        if depths[i] < 15 {
            depths[i] += 1;
            depths.push(depths[i]);
        }
    }
    depths
}

/// Spread `depths` over an alphabet of `size` symbols
fn scatter(rng: &mut WyRand, depths: &[u8], size: usize) -> Vec<u8> {
    let mut lengths = vec![0; size];
    let mut placed = 0;

    while placed < depths.len() {
        let symbol = rng.generate_range(0..size);

        if lengths[symbol] == 0 {
            lengths[symbol] = depths[placed];
            placed += 1;
        }
    }
    lengths
}

#[test]
fn complete_codes_decode_every_symbol() {
    let mut rng = WyRand::new_seed(7);

    for _ in 0..200 {
        let leaves = rng.generate_range(2_usize..200);
        let depths = random_complete_depths(&mut rng, leaves);
        let lengths = scatter(&mut rng, &depths, 280);

        let table = HuffmanTable::build(&lengths).unwrap();
        let codes = canonical_codes(&lengths);

        let symbols: Vec<usize> = (0..lengths.len()).filter(|&s| lengths[s] != 0).collect();
        let mut writer = BitWriter::new();

        for &symbol in symbols.iter().rev() {
            writer
                .put_bits(lengths[symbol], u32::from(codes[symbol]))
                .unwrap();
        }
        let data = writer.finish().unwrap();
        let mut reader = BitReader::new(&data);

        for &symbol in symbols.iter().rev() {
            assert_eq!(usize::from(table.read_symbol(&mut reader)), symbol);
        }
        assert!(!reader.is_eos());
    }
}

#[test]
fn kraft_violations_are_rejected() {
    let mut rng = WyRand::new_seed(11);

    for _ in 0..200 {
        let leaves = rng.generate_range(3_usize..100);
        let mut depths = random_complete_depths(&mut rng, leaves);

        // drop a leaf, the code no longer fills the space
        let mut incomplete = depths.clone();
        incomplete.swap_remove(rng.generate_range(0..incomplete.len()));
        let lengths = scatter(&mut rng, &incomplete, 280);

        assert!(matches!(
            HuffmanTable::build(&lengths),
            Err(WebpErrors::MalformedTable)
        ));

        // one leaf too many
        depths.push(15);
        let lengths = scatter(&mut rng, &depths, 280);

        assert!(matches!(
            HuffmanTable::build(&lengths),
            Err(WebpErrors::MalformedTable)
        ));
    }
}

#[test]
fn lengths_above_fifteen_are_rejected() {
    let mut lengths = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
    lengths.push(16);

    assert!(matches!(
        HuffmanTable::build(&lengths),
        Err(WebpErrors::MalformedTable)
    ));
}

#[test]
fn descriptions_round_trip() {
    let mut rng = WyRand::new_seed(3);

    for size in [19, 40, 256, 280] {
        let histogram: Vec<u32> = (0..size)
            .map(|_| {
                if rng.generate_range(0_u32..4) == 0 {
                    0
                } else {
                    rng.generate_range(1_u32..1000)
                }
            })
            .collect();
        let code = PrefixCode::from_histogram(&histogram);

        let mut writer = BitWriter::new();
        code.write_description(&mut writer).unwrap();

        let message: Vec<usize> = (0..500)
            .map(|i| (i * 31) % size)
            .filter(|&s| histogram[s] != 0)
            .collect();

        for &symbol in &message {
            code.write_symbol(&mut writer, symbol).unwrap();
        }
        let data = writer.finish().unwrap();
        let mut reader = BitReader::new(&data);
        let table = read_huffman_code(&mut reader, size).unwrap();

        for &symbol in &message {
            assert_eq!(usize::from(table.read_symbol(&mut reader)), symbol);
        }
    }
}
