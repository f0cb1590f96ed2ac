use std::collections::BTreeMap;

use deku::ctx::Endian;
use log::trace;

use crate::env::{Environment, Symbol, WordSize};
use crate::error::HeapError;

/// Bytes of target memory mapped at `start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub start: u64,
    pub data: Vec<u8>,
}

impl Segment {
    pub fn new(start: u64, data: Vec<u8>) -> Self {
        Self { start, data }
    }

    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.data.len() as u64)
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end()
    }

    fn slice(&self, address: u64, len: usize) -> Option<&[u8]> {
        if !self.contains(address) {
            return None;
        }
        let offset = (address - self.start) as usize;
        self.data.get(offset..offset.checked_add(len)?)
    }
}

/// A frozen copy of the target: mapped segments plus resolved symbols.
///
/// Plausible addresses are exactly the ones that fall inside a segment. When segments
/// overlap, the one added last wins.
#[derive(Debug, Clone)]
pub struct MemoryImage {
    word_size: WordSize,
    endian: Endian,
    segments: Vec<Segment>,
    symbols: BTreeMap<Symbol, u64>,
}

impl MemoryImage {
    pub fn new(word_size: WordSize, endian: Endian) -> Self {
        Self { word_size, endian, segments: Vec::new(), symbols: BTreeMap::new() }
    }

    pub fn with_segment(mut self, start: u64, data: Vec<u8>) -> Self {
        self.add_segment(start, data);
        self
    }

    pub fn with_symbol(mut self, symbol: Symbol, value: u64) -> Self {
        self.set_symbol(symbol, value);
        self
    }

    pub fn add_segment(&mut self, start: u64, data: Vec<u8>) {
        trace!("segment {start:#x}..{:#x}", start.saturating_add(data.len() as u64));
        self.segments.push(Segment::new(start, data));
    }

    pub fn set_symbol(&mut self, symbol: Symbol, value: u64) {
        self.symbols.insert(symbol, value);
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Borrow `len` bytes starting at `address`; the whole range must sit in one segment
    pub fn read_bytes(&self, address: u64, len: usize) -> Result<&[u8], HeapError> {
        self.segments
            .iter()
            .rev()
            .find_map(|segment| segment.slice(address, len))
            .ok_or(HeapError::UnreadableMemory { address })
    }

    fn read_array<const N: usize>(&self, address: u64) -> Result<[u8; N], HeapError> {
        let bytes = self.read_bytes(address, N)?;
        let mut buf = [0; N];
        buf.copy_from_slice(bytes);
        Ok(buf)
    }

    /// Encode `value` as one target word in the image's byte order
    pub fn encode_word(&self, value: u64) -> Vec<u8> {
        encode_word(value, self.word_size, self.endian)
    }
}

pub(crate) fn encode_word(value: u64, word_size: WordSize, endian: Endian) -> Vec<u8> {
    match (word_size, endian) {
        (WordSize::Bits32, Endian::Little) => (value as u32).to_le_bytes().to_vec(),
        (WordSize::Bits32, Endian::Big) => (value as u32).to_be_bytes().to_vec(),
        (WordSize::Bits64, Endian::Little) => value.to_le_bytes().to_vec(),
        (WordSize::Bits64, Endian::Big) => value.to_be_bytes().to_vec(),
    }
}

impl Environment for MemoryImage {
    fn word_size(&self) -> WordSize {
        self.word_size
    }

    fn is_plausible_address(&self, value: u64) -> bool {
        value != 0 && self.segments.iter().any(|segment| segment.contains(value))
    }

    fn resolve_value(&self, symbol: Symbol) -> Result<u64, HeapError> {
        self.symbols.get(&symbol).copied().ok_or(HeapError::NoSymbols { symbol })
    }

    fn read_u32_at(&self, address: u64) -> Result<u32, HeapError> {
        let bytes = self.read_array::<4>(address)?;
        Ok(match self.endian {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        })
    }

    fn read_u64_at(&self, address: u64) -> Result<u64, HeapError> {
        let bytes = self.read_array::<8>(address)?;
        Ok(match self.endian {
            Endian::Little => u64::from_le_bytes(bytes),
            Endian::Big => u64::from_be_bytes(bytes),
        })
    }
}
