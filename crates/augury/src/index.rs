use crate::chunk::ChunkMap;
use crate::env::WordSize;
use crate::error::HeapError;

/// What a token names once it is parsed, before it is checked against a chunk map
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Selector {
    Index(usize),
    Address(u64),
}

impl Selector {
    /// Accept `123` (all digits) or `0x1f` (`0x` then hex digits), nothing else
    pub fn parse(token: &str) -> Result<Self, HeapError> {
        if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
            return token
                .parse::<usize>()
                .map(Selector::Index)
                .map_err(|_| HeapError::OutOfRange { index: token.to_owned(), count: 0 });
        }

        if let Some(hex) = token.strip_prefix("0x")
            && !hex.is_empty()
            && hex.chars().all(|c| c.is_ascii_hexdigit())
            && let Ok(address) = u64::from_str_radix(hex, 16)
        {
            return Ok(Selector::Address(address));
        }

        Err(HeapError::NotFound { token: token.to_owned() })
    }
}

/// Map a decimal index or a hex chunk/user address to an ordinal in `chunks`.
///
/// Indices run up to and including `chunks.len()`, which names the top chunk. An address
/// matches a chunk header or the user pointer `2 * word` past it; the first match wins.
pub fn resolve_index(
    token: &str,
    chunks: &ChunkMap,
    word_size: WordSize,
) -> Result<usize, HeapError> {
    let count = chunks.len();
    match Selector::parse(token) {
        Ok(Selector::Index(index)) if index <= count => Ok(index),
        Ok(Selector::Index(_)) | Err(HeapError::OutOfRange { .. }) => {
            Err(HeapError::OutOfRange { index: token.to_owned(), count })
        }
        Ok(Selector::Address(address)) => chunks
            .iter()
            .position(|chunk| {
                chunk.address == address || chunk.user_address(word_size) == address
            })
            .ok_or_else(|| HeapError::NotFound { token: format!("{address:#x}") }),
        Err(e) => Err(e),
    }
}

/// A region to show verbatim: `words` machine words starting at `address`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DumpRegion {
    pub address: u64,
    pub words: u64,
}

impl DumpRegion {
    pub fn len_bytes(&self, word_size: WordSize) -> u64 {
        self.words * word_size.bytes()
    }
}

/// The raw region behind ordinal `index`: the chunk's own size, or the top chunk's
/// two header words when `index == chunks.len()`
pub fn dump_region(
    index: usize,
    chunks: &ChunkMap,
    top: u64,
    word_size: WordSize,
) -> Result<DumpRegion, HeapError> {
    if index == chunks.len() {
        return Ok(DumpRegion { address: top, words: 2 });
    }
    chunks
        .nth(index)
        .map(|chunk| DumpRegion {
            address: chunk.address,
            words: chunk.chunk_size() / word_size.bytes(),
        })
        .ok_or(HeapError::OutOfRange { index: index.to_string(), count: chunks.len() })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::chunk::Chunk;

    fn five_chunks() -> ChunkMap {
        let mut chunks = ChunkMap::new();
        for (i, size) in [0x291u64, 0x21, 0x31, 0x41, 0x91].into_iter().enumerate() {
            let address = 0x1000 + 0x300 * i as u64;
            chunks.insert(Chunk::new(address, 0, size, 0, 0));
        }
        chunks
    }

    #[rstest]
    #[case("0", Ok(0))]
    #[case("4", Ok(4))]
    #[case("5", Ok(5))]
    #[case("0x1600", Ok(2))]
    #[case("0x1610", Ok(2))]
    #[case("0x1000", Ok(0))]
    #[case("6", Err(HeapError::OutOfRange { index: "6".into(), count: 5 }))]
    #[case("999999", Err(HeapError::OutOfRange { index: "999999".into(), count: 5 }))]
    #[case(
        "99999999999999999999999",
        Err(HeapError::OutOfRange { index: "99999999999999999999999".into(), count: 5 })
    )]
    #[case("0xdead", Err(HeapError::NotFound { token: "0xdead".into() }))]
    #[case("0x1608", Err(HeapError::NotFound { token: "0x1608".into() }))]
    #[case("0x", Err(HeapError::NotFound { token: "0x".into() }))]
    #[case("", Err(HeapError::NotFound { token: "".into() }))]
    #[case("-1", Err(HeapError::NotFound { token: "-1".into() }))]
    #[case("0X1000", Err(HeapError::NotFound { token: "0X1000".into() }))]
    #[case("12a", Err(HeapError::NotFound { token: "12a".into() }))]
    fn test_resolve_index(#[case] token: &str, #[case] expected: Result<usize, HeapError>) {
        assert_eq!(resolve_index(token, &five_chunks(), WordSize::Bits64), expected);
    }

    #[test]
    fn test_user_address_depends_on_width() {
        let chunks = five_chunks();
        assert_eq!(resolve_index("0x1608", &chunks, WordSize::Bits32), Ok(2));
    }

    #[test]
    fn test_first_match_wins() {
        // 0x1010 is the header of the second chunk and the user pointer of the first
        let mut chunks = ChunkMap::new();
        chunks.insert(Chunk::new(0x1000, 0, 0x11, 0, 0));
        chunks.insert(Chunk::new(0x1010, 0, 0x21, 0, 0));
        assert_eq!(resolve_index("0x1010", &chunks, WordSize::Bits64), Ok(0));
    }

    #[test]
    fn test_dump_region() {
        let chunks = five_chunks();
        assert_eq!(
            dump_region(0, &chunks, 0x2000, WordSize::Bits64),
            Ok(DumpRegion { address: 0x1000, words: 0x52 })
        );
        assert_eq!(
            dump_region(5, &chunks, 0x2000, WordSize::Bits64),
            Ok(DumpRegion { address: 0x2000, words: 2 })
        );
        assert_eq!(
            dump_region(6, &chunks, 0x2000, WordSize::Bits64),
            Err(HeapError::OutOfRange { index: "6".into(), count: 5 })
        );
        let region = dump_region(2, &chunks, 0x2000, WordSize::Bits32).unwrap();
        assert_eq!(region, DumpRegion { address: 0x1600, words: 0xc });
        assert_eq!(region.len_bytes(WordSize::Bits32), 0x30);
    }
}
