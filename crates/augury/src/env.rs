use std::fmt;
use std::str::FromStr;

use crate::error::HeapError;

/// Pointer width of the inspected target
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WordSize {
    Bits32,
    Bits64,
}

impl WordSize {
    pub fn from_bits(bits: u32) -> Result<Self, HeapError> {
        match bits {
            32 => Ok(Self::Bits32),
            64 => Ok(Self::Bits64),
            other => Err(HeapError::UnsupportedWidth(other)),
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Self::Bits32 => 32,
            Self::Bits64 => 64,
        }
    }

    /// `SIZE_SZ` in glibc terms
    pub fn bytes(self) -> u64 {
        u64::from(self.bits() / 8)
    }
}

/// Program values the core needs resolved before it can walk anything
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    /// `main_arena.top`
    ArenaTop,
    /// `mp_.sbrk_base`
    HeapBase,
    /// Address of `main_arena.fastbinsY`
    FastBins,
}

impl Symbol {
    pub const ALL: [Symbol; 3] = [Symbol::ArenaTop, Symbol::HeapBase, Symbol::FastBins];

    pub fn name(self) -> &'static str {
        match self {
            Symbol::ArenaTop => "main_arena.top",
            Symbol::HeapBase => "mp_.sbrk_base",
            Symbol::FastBins => "main_arena.fastbinsY",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Symbol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::ALL.into_iter().find(|sym| sym.name() == s).ok_or_else(|| {
            format!("unknown symbol `{s}`, expected one of {:?}", Symbol::ALL.map(Symbol::name))
        })
    }
}

/// Everything the core knows about the target: its word size, which values look like
/// addresses, named program values, and raw memory.
///
/// Implementations only read. Nothing in this crate writes to the inspected memory.
pub trait Environment {
    fn word_size(&self) -> WordSize;

    fn is_plausible_address(&self, value: u64) -> bool;

    fn resolve_value(&self, symbol: Symbol) -> Result<u64, HeapError>;

    fn read_u32_at(&self, address: u64) -> Result<u32, HeapError>;

    fn read_u64_at(&self, address: u64) -> Result<u64, HeapError>;

    fn pointer_width_bits(&self) -> u32 {
        self.word_size().bits()
    }

    /// Read the machine word `offset` words past `address`, widened to `u64`
    fn read_word(&self, address: u64, offset: u64) -> Result<u64, HeapError> {
        let word = self.word_size();
        let at = offset
            .checked_mul(word.bytes())
            .and_then(|delta| address.checked_add(delta))
            .ok_or(HeapError::UnreadableMemory { address })?;

        match word {
            WordSize::Bits32 => self.read_u32_at(at).map(u64::from),
            WordSize::Bits64 => self.read_u64_at(at),
        }
    }
}

impl<E: Environment + ?Sized> Environment for &E {
    fn word_size(&self) -> WordSize {
        (**self).word_size()
    }

    fn is_plausible_address(&self, value: u64) -> bool {
        (**self).is_plausible_address(value)
    }

    fn resolve_value(&self, symbol: Symbol) -> Result<u64, HeapError> {
        (**self).resolve_value(symbol)
    }

    fn read_u32_at(&self, address: u64) -> Result<u32, HeapError> {
        (**self).read_u32_at(address)
    }

    fn read_u64_at(&self, address: u64) -> Result<u64, HeapError> {
        (**self).read_u64_at(address)
    }
}
