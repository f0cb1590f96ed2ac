use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::env::WordSize;
use crate::layout::{IS_MMAPPED, NON_MAIN_ARENA, PREV_INUSE, SIZE_BITS};

/// One malloc chunk as read from memory, equivalent to ptmalloc's `malloc_chunk` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub address: u64,
    pub prev_size: u64,
    /// Raw size field, flag bits included
    pub size: u64,
    pub forward_pointer: u64,
    pub backward_pointer: u64,
    pub in_use: bool,
}

impl Chunk {
    pub fn new(address: u64, prev_size: u64, size: u64, fd: u64, bk: u64) -> Self {
        Self { address, prev_size, size, forward_pointer: fd, backward_pointer: bk, in_use: true }
    }

    pub fn chunk_size(&self) -> u64 {
        self.size & !SIZE_BITS
    }

    pub fn prev_inuse(&self) -> bool {
        (self.size & PREV_INUSE) != 0
    }

    pub fn is_mmapped(&self) -> bool {
        (self.size & IS_MMAPPED) != 0
    }

    pub fn non_main_arena(&self) -> bool {
        (self.size & NON_MAIN_ARENA) != 0
    }

    /// Where the next chunk would start, `None` if that leaves the address space
    pub fn next_address(&self) -> Option<u64> {
        self.address.checked_add(self.chunk_size())
    }

    /// The pointer malloc returned for this chunk (`chunk2mem`)
    pub fn user_address(&self, word_size: WordSize) -> u64 {
        self.address.wrapping_add(2 * word_size.bytes())
    }
}

/// Chunks keyed by start address, iterated in ascending address order.
///
/// Ordinal indices used by the rest of the crate are positions in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkMap {
    chunks: BTreeMap<u64, Chunk>,
}

impl ChunkMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chunk: Chunk) {
        self.chunks.insert(chunk.address, chunk);
    }

    pub fn get(&self, address: u64) -> Option<&Chunk> {
        self.chunks.get(&address)
    }

    pub fn get_mut(&mut self, address: u64) -> Option<&mut Chunk> {
        self.chunks.get_mut(&address)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk at ordinal `index`
    pub fn nth(&self, index: usize) -> Option<&Chunk> {
        self.chunks.values().nth(index)
    }

    pub fn iter(&self) -> btree_map::Values<'_, u64, Chunk> {
        self.chunks.values()
    }

    pub fn addresses(&self) -> btree_map::Keys<'_, u64, Chunk> {
        self.chunks.keys()
    }
}

impl<'a> IntoIterator for &'a ChunkMap {
    type Item = &'a Chunk;
    type IntoIter = btree_map::Values<'a, u64, Chunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
