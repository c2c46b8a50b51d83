/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use alloc::vec::Vec;

use crate::errors::MuxErrors;
use crate::mux::chunk::Chunk;

/// Handle to a chunk inside a [`ChunkStore`]
///
/// Handles can't be cloned, removing a chunk consumes its handle
/// so a slot is released at most once.
#[derive(Debug, Eq, PartialEq)]
pub struct ChunkRef(usize);

/// Arena holding every chunk of a container
///
/// Containers and frames keep ordered lists of [`ChunkRef`]s into
/// the store. Released slots are reused by later inserts.
///
/// Not internally synchronized, callers must serialize access
/// to one instance.
#[derive(Debug, Default)]
pub struct ChunkStore<'a> {
    slots: Vec<Option<Chunk<'a>>>,
    free:  Vec<usize>
}

impl<'a> ChunkStore<'a> {
    pub fn new() -> ChunkStore<'a> {
        ChunkStore::default()
    }

    /// Take ownership of `chunk`, returning its handle
    pub fn insert(&mut self, chunk: Chunk<'a>) -> Result<ChunkRef, MuxErrors> {
        if let Some(index) = self.free.pop() {
            self.slots[index] = Some(chunk);
            return Ok(ChunkRef(index));
        }
        self.slots
            .try_reserve(1)
            .map_err(|_| MuxErrors::AllocationFailure(self.slots.len() + 1))?;
        self.slots.push(Some(chunk));

        Ok(ChunkRef(self.slots.len() - 1))
    }

    pub fn get(&self, handle: &ChunkRef) -> Option<&Chunk<'a>> {
        self.slots.get(handle.0).and_then(Option::as_ref)
    }

    /// Release the chunk behind `handle`
    pub fn remove(&mut self, handle: ChunkRef) -> Option<Chunk<'a>> {
        let chunk = self.slots.get_mut(handle.0)?.take()?;
        self.free.push(handle.0);

        Some(chunk)
    }

    /// Number of live chunks
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload of a chunk, empty if the handle is stale
    pub fn data(&self, handle: &ChunkRef) -> &[u8] {
        match self.get(handle) {
            Some(chunk) => chunk.data(),
            None => &[]
        }
    }

    fn matches(&self, handle: &ChunkRef, tag: [u8; 4]) -> bool {
        self.get(handle).is_some_and(|c| c.tag() == tag)
    }

    /// Find the `nth` chunk tagged `tag` in `list`
    ///
    /// `nth` counts from one, zero selects the last match.
    pub fn find_nth<'l>(
        &self, list: &'l [ChunkRef], tag: [u8; 4], nth: usize
    ) -> Option<&'l ChunkRef> {
        let mut matching = list.iter().filter(|h| self.matches(h, tag));

        if nth == 0 {
            matching.last()
        } else {
            matching.nth(nth - 1)
        }
    }

    /// Number of chunks in `list` tagged `tag`
    pub fn count(&self, list: &[ChunkRef], tag: [u8; 4]) -> usize {
        list.iter().filter(|h| self.matches(h, tag)).count()
    }

    /// Remove every chunk tagged `tag` from `list` and release it
    pub fn delete_matching(
        &mut self, list: &mut Vec<ChunkRef>, tag: [u8; 4]
    ) -> Result<(), MuxErrors> {
        let mut found = false;

        for handle in core::mem::take(list) {
            if self.matches(&handle, tag) {
                self.remove(handle);
                found = true;
            } else {
                list.push(handle);
            }
        }
        if found {
            Ok(())
        } else {
            Err(MuxErrors::NotFound)
        }
    }

    /// Release every chunk in `list`
    pub fn clear_list(&mut self, list: &mut Vec<ChunkRef>) {
        for handle in list.drain(..) {
            self.remove(handle);
        }
    }

    /// Release the chunk in a singleton slot, if any
    pub fn clear_slot(&mut self, slot: &mut Option<ChunkRef>) {
        if let Some(handle) = slot.take() {
            self.remove(handle);
        }
    }
}
