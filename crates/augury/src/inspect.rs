use log::{debug, info};

use crate::chain::{Chain, Direction, trace_chain};
use crate::chunk::{Chunk, ChunkMap};
use crate::env::{Environment, Symbol, WordSize};
use crate::error::{HeapError, HeapWarning};
use crate::fastbin::{overlay_fastbins, read_fastbin_heads};
use crate::index::{DumpRegion, dump_region, resolve_index};
use crate::layout::HeapLayout;
use crate::walk::walk_chunks;

/// A reconstructed heap: every chunk between `base` and `top`, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heap {
    pub base: u64,
    pub top: u64,
    pub word_size: WordSize,
    pub layout: HeapLayout,
    pub chunks: ChunkMap,
    pub warnings: Vec<HeapWarning>,
}

impl Heap {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Chunk> {
        self.chunks.nth(index)
    }

    pub fn resolve_index(&self, token: &str) -> Result<usize, HeapError> {
        resolve_index(token, &self.chunks, self.word_size)
    }

    pub fn dump_region(&self, index: usize) -> Result<DumpRegion, HeapError> {
        dump_region(index, &self.chunks, self.top, self.word_size)
    }

    /// `fd` chain of a free chunk, `None` when the chunk is in use and `fd` is just data
    pub fn forward_chain<E: Environment + ?Sized>(
        &self,
        env: &E,
        chunk: &Chunk,
    ) -> Option<Chain> {
        (!chunk.in_use).then(|| trace_chain(env, chunk.forward_pointer, Direction::Forward))
    }

    /// `bk` chain of a free chunk large enough to sit in a doubly linked bin
    pub fn backward_chain<E: Environment + ?Sized>(
        &self,
        env: &E,
        chunk: &Chunk,
    ) -> Option<Chain> {
        (!chunk.in_use && chunk.chunk_size() > self.layout.chain_threshold())
            .then(|| trace_chain(env, chunk.backward_pointer, Direction::Backward))
    }
}

fn resolve<E: Environment + ?Sized>(env: &E, symbol: Symbol) -> Result<u64, HeapError> {
    env.resolve_value(symbol).map_err(|e| match e {
        HeapError::NoSymbols { .. } => e,
        other => {
            debug!("resolving {symbol}: {other}");
            HeapError::NoSymbols { symbol }
        }
    })
}

/// Rebuild the chunk map from scratch: walk, then overlay the fast bins
pub fn build_chunk_map<E: Environment + ?Sized>(
    env: &E,
    layout: &HeapLayout,
) -> Result<Heap, HeapError> {
    let top = resolve(env, Symbol::ArenaTop)?;
    let base = resolve(env, Symbol::HeapBase)?;
    resolve(env, Symbol::FastBins)?;

    if base == 0 {
        return Err(HeapError::HeapNotAllocated);
    }

    let mut warnings = Vec::new();
    let mut chunks = walk_chunks(env, base, top, layout, &mut warnings)?;
    let heads = read_fastbin_heads(env, layout)?;
    overlay_fastbins(&mut chunks, &heads, &mut warnings);

    info!(
        "heap {base:#x}..{top:#x}: {} chunks, {} warnings",
        chunks.len(),
        warnings.len()
    );

    Ok(Heap { base, top, word_size: env.word_size(), layout: *layout, chunks, warnings })
}

/// Optional memo for [`build_chunk_map`].
///
/// The caller owns the generation token and must bump it whenever the target may have
/// changed (a new stop, a reloaded dump). A different token always rebuilds.
#[derive(Debug, Default)]
pub struct HeapCache {
    entry: Option<(u64, Heap)>,
}

impl HeapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build<E: Environment + ?Sized>(
        &mut self,
        generation: u64,
        env: &E,
        layout: &HeapLayout,
    ) -> Result<&Heap, HeapError> {
        let entry = match self.entry.take() {
            Some((cached, heap)) if cached == generation => (cached, heap),
            _ => {
                debug!("heap cache miss for generation {generation}");
                (generation, build_chunk_map(env, layout)?)
            }
        };
        Ok(&self.entry.insert(entry).1)
    }

    pub fn generation(&self) -> Option<u64> {
        self.entry.as_ref().map(|(generation, _)| *generation)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
