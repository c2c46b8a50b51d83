/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use nanorand::{Rng, WyRand};
use zune_webp::bitstream::{BitReader, BitWriter, BoolReader, BoolWriter};

#[test]
fn random_bit_fields() {
    let mut rng = WyRand::new_seed(0x5eed);

    // (value, width, bits written before it)
    let mut fields = Vec::new();
    let mut writer = BitWriter::new();

    for _ in 0..10_000 {
        let width = rng.generate_range(0_u32..=24) as u8;
        let offset = rng.generate_range(0_u32..8) as u8;
        let value = rng.generate::<u32>() & ((1_u32 << width) - 1);

        writer.put_bits(offset, 0).unwrap();
        writer.put_bits(width, value).unwrap();
        fields.push((value, width, offset));
    }
    let data = writer.finish().unwrap();
    let mut reader = BitReader::new(&data);

    for (i, &(value, width, offset)) in fields.iter().enumerate() {
        reader.read_bits(offset);
        assert_eq!(reader.read_bits(width), value, "field {i} of width {width}");
    }
    assert!(!reader.is_eos());
}

#[test]
fn reading_past_the_end_gives_zeros() {
    let mut reader = BitReader::new(&[0xff]);

    assert_eq!(reader.read_bits(4), 0xf);
    assert!(!reader.is_eos());
    assert_eq!(reader.read_bits(8), 0xf);
    assert!(reader.is_eos());
    assert_eq!(reader.read_bits(24), 0);
}

#[test]
fn bool_coder_round_trip() {
    let mut rng = WyRand::new_seed(42);
    let mut symbols = Vec::new();
    let mut writer = BoolWriter::new();

    for _ in 0..5_000 {
        let probability = rng.generate_range(1_u32..=255) as u8;
        let bit = rng.generate_range(0_u32..256) >= u32::from(probability);

        writer.write_bool(probability, bit).unwrap();
        symbols.push((probability, bit));
    }
    writer.write_literal(7, 100).unwrap();

    let data = writer.finish().unwrap();
    let mut reader = BoolReader::new(&data);

    for &(probability, bit) in &symbols {
        assert_eq!(reader.read_bool(probability), bit);
    }
    assert_eq!(reader.read_literal(7), 100);
}
