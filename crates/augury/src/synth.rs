//! Hand-built heaps for tests and demos.
//!
//! [`SyntheticHeap`] lays chunks out back to back from a base address, lets callers poke
//! individual words (free-list links, corrupted fields), and produces a [`MemoryImage`]
//! with the heap, a small arena holding `fastbinsY`, and all symbols resolved.

use deku::ctx::Endian;

use crate::env::{Symbol, WordSize};
use crate::image::{MemoryImage, encode_word};
use crate::layout::{BK_OFFSET, FD_OFFSET, HeapLayout, PREV_INUSE};

/// Where the fake `main_arena.fastbinsY` lives
pub const ARENA_ADDRESS: u64 = 0x6000_0000;

/// Size of the wilderness chunk appended after the last chunk
const TOP_CHUNK_SIZE: u64 = 0x20d00;

#[derive(Debug, Clone)]
pub struct SyntheticHeap {
    word_size: WordSize,
    endian: Endian,
    base: u64,
    top: u64,
    words: Vec<u64>,
    fastbins: Vec<u64>,
}

impl SyntheticHeap {
    pub fn new(word_size: WordSize, base: u64) -> Self {
        let nfastbins = HeapLayout::new(word_size).nfastbins;
        Self {
            word_size,
            endian: Endian::Little,
            base,
            top: base,
            words: Vec::new(),
            fastbins: vec![0; nfastbins],
        }
    }

    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn word_size(&self) -> WordSize {
        self.word_size
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Address where the next chunk, or the wilderness, starts
    pub fn top(&self) -> u64 {
        self.top
    }

    /// Append a chunk with raw header fields and return its address
    pub fn chunk(&mut self, prev_size: u64, size: u64) -> u64 {
        let address = self.top;
        self.set_word(address, prev_size);
        self.set_word(address + self.word_size.bytes(), size);
        // keep fd/bk readable even for undersized chunks
        self.ensure(address + 4 * self.word_size.bytes());
        self.top = address + (size & !7);
        self.ensure(self.top);
        address
    }

    pub fn set_word(&mut self, address: u64, value: u64) {
        let index = self.index(address);
        self.ensure(address + self.word_size.bytes());
        self.words[index] = value;
    }

    pub fn set_fd(&mut self, chunk: u64, value: u64) {
        self.set_word(chunk + FD_OFFSET * self.word_size.bytes(), value);
    }

    pub fn set_bk(&mut self, chunk: u64, value: u64) {
        self.set_word(chunk + BK_OFFSET * self.word_size.bytes(), value);
    }

    pub fn set_fastbin(&mut self, bin: usize, head: u64) {
        self.fastbins[bin] = head;
    }

    pub fn build(&self) -> MemoryImage {
        let mut words = self.words.clone();
        // wilderness header: prev_size, size, and room for fd/bk
        let at = self.index(self.top);
        if words.len() < at + 4 {
            words.resize(at + 4, 0);
        }
        words[at] = 0;
        words[at + 1] = TOP_CHUNK_SIZE | PREV_INUSE;

        let heap = self.encode(&words);
        let arena = self.encode(&self.fastbins);

        MemoryImage::new(self.word_size, self.endian)
            .with_segment(self.base, heap)
            .with_segment(ARENA_ADDRESS, arena)
            .with_symbol(Symbol::HeapBase, self.base)
            .with_symbol(Symbol::ArenaTop, self.top)
            .with_symbol(Symbol::FastBins, ARENA_ADDRESS)
    }

    fn encode(&self, words: &[u64]) -> Vec<u8> {
        words.iter().flat_map(|w| encode_word(*w, self.word_size, self.endian)).collect()
    }

    fn index(&self, address: u64) -> usize {
        ((address - self.base) / self.word_size.bytes()) as usize
    }

    fn ensure(&mut self, end: u64) {
        let len = self.index(end);
        if self.words.len() < len {
            self.words.resize(len, 0);
        }
    }
}
