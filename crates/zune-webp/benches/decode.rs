/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use zune_core::options::DecoderOptions;
use zune_webp::lossless::decode_vp8l;
use zune_webp::{encode_lossless, LosslessOptions};

fn test_image(width: usize, height: usize) -> Vec<u32> {
    (0..width * height)
        .map(|i| {
            let (x, y) = ((i % width) as u32, (i / width) as u32);
            0xff00_0000 | (x & 0xff) << 16 | ((x ^ y) & 0xff) << 8 | (y & 0xff)
        })
        .collect()
}

fn decode_test(c: &mut Criterion) {
    let pixels = test_image(512, 512);
    let data = encode_lossless(&pixels, 512, 512, &LosslessOptions::default()).unwrap();

    let mut group = c.benchmark_group("[webp]: VP8L decoding");
    group.throughput(Throughput::Bytes((pixels.len() * 4) as u64));

    group.bench_function("VP8L decoding scalar", |b| {
        b.iter(|| black_box(decode_vp8l(data.as_slice(), DecoderOptions::default()).unwrap()))
    });

    let batched = DecoderOptions::default().set_use_unsafe(true);

    group.bench_function("VP8L decoding batched", |b| {
        b.iter(|| black_box(decode_vp8l(data.as_slice(), batched).unwrap()))
    });
}

fn encode_test(c: &mut Criterion) {
    let pixels = test_image(256, 256);

    let mut group = c.benchmark_group("[webp]: VP8L encoding");
    group.throughput(Throughput::Bytes((pixels.len() * 4) as u64));

    for effort in [0, 4, 9] {
        let options = LosslessOptions::from_effort(effort);

        group.bench_function(format!("VP8L encoding effort {effort}"), |b| {
            b.iter(|| black_box(encode_lossless(&pixels, 256, 256, &options).unwrap()))
        });
    }
}

criterion_group!(name=benches;
      config={
      let c = Criterion::default();
        c.measurement_time(std::time::Duration::from_secs(20))
      };
    targets=decode_test, encode_test);

criterion_main!(benches);
