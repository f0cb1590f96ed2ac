//! Allocator constants for the modeled glibc.
//!
//! The layout follows ptmalloc2's main arena as shipped in glibc 2.23 through 2.25:
//! `mp_.sbrk_base` marks the heap start, `main_arena.top` the wilderness chunk, and
//! `main_arena.fastbinsY` holds `NFASTBINS` singly linked list heads. Tcache and
//! safe-linking came later and are not modeled.

use crate::env::WordSize;

pub const PREV_INUSE: u64 = 0x1;
pub const IS_MMAPPED: u64 = 0x2;
pub const NON_MAIN_ARENA: u64 = 0x4;
pub const SIZE_BITS: u64 = PREV_INUSE | IS_MMAPPED | NON_MAIN_ARENA;

/// Word offset of `fd` inside a chunk header
pub const FD_OFFSET: u64 = 2;
/// Word offset of `bk` inside a chunk header
pub const BK_OFFSET: u64 = 3;

/// Upper bound on chunks in a single walk before it is treated as runaway
pub const DEFAULT_MAX_CHUNKS: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapLayout {
    pub word_size: WordSize,
    /// Slots read from `fastbinsY`
    pub nfastbins: usize,
    /// Free chunks at or below this many words keep `bk` as a single value
    pub chain_min_words: u64,
    pub max_chunks: usize,
}

impl HeapLayout {
    pub fn new(word_size: WordSize) -> Self {
        let mut layout =
            Self { word_size, nfastbins: 0, chain_min_words: 0, max_chunks: DEFAULT_MAX_CHUNKS };
        layout.set_globals();
        layout
    }

    fn set_globals(&mut self) {
        let size = self.request2size(self.max_fast_size());
        self.nfastbins = self.fastbin_index(size) + 1;
        // default global_max_fast: DEFAULT_MXFAST (64 * SIZE_SZ / 4) rounded to 0x10 words
        self.chain_min_words = 0x10;
    }

    pub fn size_sz(&self) -> u64 {
        self.word_size.bytes()
    }

    pub fn malloc_alignment(&self) -> u64 {
        2 * self.size_sz()
    }

    pub fn malloc_align_mask(&self) -> u64 {
        self.malloc_alignment() - 1
    }

    pub fn min_chunk_size(&self) -> u64 {
        4 * self.size_sz()
    }

    pub fn minsize(&self) -> u64 {
        (self.min_chunk_size() + self.malloc_align_mask()) & !self.malloc_align_mask()
    }

    /// `MAX_FAST_SIZE`, the largest request `global_max_fast` may ever be raised to
    pub fn max_fast_size(&self) -> u64 {
        80 * self.size_sz() / 4
    }

    pub fn request2size(&self, req: u64) -> u64 {
        if req + self.size_sz() + self.malloc_align_mask() < self.minsize() {
            self.minsize()
        } else {
            (req + self.size_sz() + self.malloc_align_mask()) & !self.malloc_align_mask()
        }
    }

    pub fn fastbin_index(&self, size: u64) -> usize {
        let shift = match self.word_size {
            WordSize::Bits64 => 4,
            WordSize::Bits32 => 3,
        };
        ((size >> shift) as usize).saturating_sub(2)
    }

    /// Free chunks larger than this many bytes have a meaningful `bk` chain
    pub fn chain_threshold(&self) -> u64 {
        self.chain_min_words * self.size_sz()
    }
}
