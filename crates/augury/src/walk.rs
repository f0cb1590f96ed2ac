use log::{debug, warn};

use crate::chunk::{Chunk, ChunkMap};
use crate::env::Environment;
use crate::error::{HeapError, HeapWarning};
use crate::layout::HeapLayout;

/// Walk every chunk in `[base, top)`, following libheap's `next_chunk()` logic.
///
/// Each chunk starts out in use. A chunk whose `PREV_INUSE` bit is clear marks the chunk
/// `prev_size` bytes behind it as free, but only when that chunk exists and really ends
/// where the current one starts. Anything else is recorded as a warning.
pub fn walk_chunks<E: Environment + ?Sized>(
    env: &E,
    base: u64,
    top: u64,
    layout: &HeapLayout,
    warnings: &mut Vec<HeapWarning>,
) -> Result<ChunkMap, HeapError> {
    let mut chunks = ChunkMap::new();
    let mut addr = base;
    let mut last = None;

    while addr < top {
        if chunks.len() >= layout.max_chunks {
            return Err(HeapError::WalkDiverged {
                address: addr,
                size: 0,
                reason: "too many chunks",
            });
        }

        let chunk = Chunk::new(
            addr,
            env.read_word(addr, 0)?,
            env.read_word(addr, 1)?,
            env.read_word(addr, 2)?,
            env.read_word(addr, 3)?,
        );
        debug!("chunk {addr:#x}: prev_size={:#x} size={:#x}", chunk.prev_size, chunk.size);

        if chunk.chunk_size() == 0 {
            return Err(HeapError::WalkDiverged {
                address: addr,
                size: chunk.size,
                reason: "zero chunk size",
            });
        }
        let Some(next) = chunk.next_address() else {
            return Err(HeapError::WalkDiverged {
                address: addr,
                size: chunk.size,
                reason: "chunk size overflows the address space",
            });
        };

        if !chunk.prev_inuse() && addr != base {
            mark_previous_free(&mut chunks, base, &chunk, warnings);
        }

        chunks.insert(chunk);
        last = Some(addr);
        addr = next;
    }

    if let Some(address) = last
        && addr != top
    {
        warn!("last chunk ends at {addr:#x}, past top {top:#x}");
        warnings.push(HeapWarning::OvershootTop { address, end: addr, top });
    }

    Ok(chunks)
}

fn mark_previous_free(
    chunks: &mut ChunkMap,
    base: u64,
    chunk: &Chunk,
    warnings: &mut Vec<HeapWarning>,
) {
    let address = chunk.address;
    let prev_size = chunk.prev_size;
    let previous = (prev_size != 0)
        .then(|| address.checked_sub(prev_size))
        .flatten()
        .filter(|prev| *prev >= base && *prev < address);

    let Some(previous) = previous else {
        warn!("chunk {address:#x}: prev_size {prev_size:#x} points outside the heap");
        warnings.push(HeapWarning::DanglingPrevSize { address, prev_size });
        return;
    };

    match chunks.get_mut(previous) {
        Some(prev) if prev.next_address() == Some(address) => {
            debug!("chunk {previous:#x} is free (PREV_INUSE clear at {address:#x})");
            prev.in_use = false;
        }
        Some(_) => {
            warn!("chunk {address:#x}: chunk at {previous:#x} does not end at {address:#x}");
            warnings.push(HeapWarning::PrevSizeMismatch { address, prev_size, previous });
        }
        None => {
            warn!("chunk {address:#x}: no chunk starts at {previous:#x}");
            warnings.push(HeapWarning::DanglingPrevSize { address, prev_size });
        }
    }
}
