/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use alloc::vec;
use alloc::vec::Vec;

use crate::constants::{COLOR_CACHE_MULTIPLIER, MAX_COLOR_CACHE_BITS};
use crate::errors::WebpErrors;

/// A small hash table of recently seen colors
///
/// Both sides insert every pixel they produce so a cache symbol
/// always refers to the same color.
#[derive(Clone, Debug)]
pub struct ColorCache {
    hash_shift: u32,
    colors:     Vec<u32>
}

impl ColorCache {
    pub fn new(bits: u8) -> Result<ColorCache, WebpErrors> {
        if bits == 0 || bits > MAX_COLOR_CACHE_BITS {
            return Err(WebpErrors::CorruptData("Invalid color cache size"));
        }
        Ok(ColorCache {
            hash_shift: 32 - u32::from(bits),
            colors:     vec![0; 1 << bits]
        })
    }

    #[inline(always)]
    pub fn key(&self, argb: u32) -> usize {
        (argb.wrapping_mul(COLOR_CACHE_MULTIPLIER) >> self.hash_shift) as usize
    }

    #[inline(always)]
    pub fn insert(&mut self, argb: u32) {
        let key = self.key(argb);
        self.colors[key] = argb;
    }

    #[inline(always)]
    pub fn lookup(&self, key: usize) -> u32 {
        self.colors[key]
    }

    /// Key of `argb` if the cache currently holds it
    #[inline(always)]
    pub fn find(&self, argb: u32) -> Option<usize> {
        let key = self.key(argb);

        (self.colors[key] == argb).then_some(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}
