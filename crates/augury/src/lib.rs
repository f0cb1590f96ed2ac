//! Rebuild a glibc ptmalloc heap from raw memory.
//!
//! Everything here reads through an [`Environment`]: the chunk walk from `mp_.sbrk_base`
//! up to `main_arena.top`, the fast bin overlay, free-list chain tracing, and the
//! index/address resolution used by front ends. Nothing writes to the inspected memory.
//!
//! ```
//! use augury::{HeapLayout, SyntheticHeap, WordSize, build_chunk_map};
//!
//! let mut heap = SyntheticHeap::new(WordSize::Bits64, 0x1000);
//! heap.chunk(0, 0x21);
//! heap.chunk(0x20, 0x20);
//! let image = heap.build();
//!
//! let built = build_chunk_map(&image, &HeapLayout::new(WordSize::Bits64)).unwrap();
//! assert!(!built.get(0).unwrap().in_use);
//! assert_eq!(built.resolve_index("0x1030"), Ok(1));
//! ```

pub mod chain;
pub mod chunk;
pub mod env;
pub mod error;
pub mod fastbin;
pub mod image;
pub mod index;
pub mod inspect;
pub mod layout;
pub mod pager;
pub mod synth;
pub mod walk;

pub use chain::{Chain, ChainEnd, DISPLAY_CHAIN_LEN, Direction, trace_chain};
pub use chunk::{Chunk, ChunkMap};
pub use env::{Environment, Symbol, WordSize};
pub use error::{HeapError, HeapWarning};
pub use image::{MemoryImage, Segment};
pub use index::{DumpRegion, Selector, dump_region, resolve_index};
pub use inspect::{Heap, HeapCache, build_chunk_map};
pub use layout::{HeapLayout, IS_MMAPPED, NON_MAIN_ARENA, PREV_INUSE};
pub use pager::{Control, DEFAULT_PAGE_LEN, Pager};
pub use synth::SyntheticHeap;
