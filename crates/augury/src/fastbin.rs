use log::{debug, warn};

use crate::chunk::ChunkMap;
use crate::env::{Environment, Symbol};
use crate::error::{HeapError, HeapWarning};
use crate::layout::HeapLayout;

/// Read the `nfastbins` list heads out of `main_arena.fastbinsY`
pub fn read_fastbin_heads<E: Environment + ?Sized>(
    env: &E,
    layout: &HeapLayout,
) -> Result<Vec<u64>, HeapError> {
    let fastbins = env.resolve_value(Symbol::FastBins)?;
    (0..layout.nfastbins as u64).map(|i| env.read_word(fastbins, i)).collect()
}

/// Mark every chunk reachable from a fast bin head as free.
///
/// A link that does not land on a chunk start aborts that bin with one
/// [`HeapWarning::CorruptFastBin`]; chunks marked before the break stay marked. Reaching a
/// chunk that is already free ends the bin, which also stops cyclic lists.
pub fn overlay_fastbins(chunks: &mut ChunkMap, heads: &[u64], warnings: &mut Vec<HeapWarning>) {
    for (bin, head) in heads.iter().copied().enumerate() {
        let mut addr = head;
        while addr != 0 {
            let Some(chunk) = chunks.get_mut(addr) else {
                warn!("fast bin {bin} corrupted: {addr:#x} is not a chunk");
                warnings.push(HeapWarning::CorruptFastBin { bin, address: addr });
                break;
            };
            if !chunk.in_use {
                break;
            }
            debug!("fast bin {bin}: {addr:#x} is free");
            chunk.in_use = false;
            addr = chunk.forward_pointer;
        }
    }
}
