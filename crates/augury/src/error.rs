use thiserror::Error;

use crate::env::Symbol;

/// Reasons an inspection request fails as a whole
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    #[error("No symbol table is loaded: `{symbol}` could not be resolved")]
    NoSymbols { symbol: Symbol },

    #[error("heap area is not allocated")]
    HeapNotAllocated,

    #[error("Index {index} is out of range (0..={count})")]
    OutOfRange { index: String, count: usize },

    #[error("No chunk is allocated at {token}")]
    NotFound { token: String },

    #[error("Heap walk diverged at {address:#x} (size field {size:#x}): {reason}")]
    WalkDiverged { address: u64, size: u64, reason: &'static str },

    #[error("Cannot read memory at {address:#x}")]
    UnreadableMemory { address: u64 },

    #[error("Unsupported pointer width: {0} bits")]
    UnsupportedWidth(u32),
}

/// Inconsistencies found while rebuilding the chunk map that do not stop it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeapWarning {
    #[error("fast bin {bin} corrupted: {address:#x} is not a chunk")]
    CorruptFastBin { bin: usize, address: u64 },

    #[error("chunk {address:#x} marks its previous chunk free, but prev_size {prev_size:#x} leads nowhere")]
    DanglingPrevSize { address: u64, prev_size: u64 },

    #[error(
        "chunk {address:#x} has prev_size {prev_size:#x}, but the chunk at {previous:#x} does not end there"
    )]
    PrevSizeMismatch { address: u64, prev_size: u64, previous: u64 },

    #[error("chunk {address:#x} ends at {end:#x}, past the top chunk at {top:#x}")]
    OvershootTop { address: u64, end: u64, top: u64 },
}
