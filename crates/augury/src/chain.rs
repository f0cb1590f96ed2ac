use std::collections::BTreeSet;
use std::fmt;

use log::debug;

use crate::env::Environment;
use crate::layout::{BK_OFFSET, FD_OFFSET};

/// Hard stop for a single trace, whatever the links look like
pub const MAX_CHAIN_LEN: usize = 4096;

/// How many links a free chunk shows before the rest is elided
pub const DISPLAY_CHAIN_LEN: usize = 6;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Word offset of the followed pointer inside a chunk header
    pub fn offset(self) -> u64 {
        match self {
            Direction::Forward => FD_OFFSET,
            Direction::Backward => BK_OFFSET,
        }
    }
}

/// Why a trace stopped
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChainEnd {
    /// The next link was the start value again
    Closed,
    /// The start value itself is not an address
    Implausible,
    /// The next link was not an address (usually a null terminator)
    Terminated(u64),
    /// The next link was already visited, without passing through the start
    Revisited(u64),
    /// The link word at this chunk could not be read
    Unreadable(u64),
    /// [`MAX_CHAIN_LEN`] reached
    Limit,
}

/// Addresses visited from a free-list pointer, in link order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub links: Vec<u64>,
    pub end: ChainEnd,
}

impl Chain {
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Render at most `limit` links joined by `-->`, eliding the rest with `...`
    pub fn display(&self, limit: usize) -> ChainDisplay<'_> {
        ChainDisplay { chain: self, limit }
    }
}

pub struct ChainDisplay<'a> {
    chain: &'a Chain,
    limit: usize,
}

impl fmt::Display for ChainDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let links = &self.chain.links;
        for (i, link) in links.iter().take(self.limit).enumerate() {
            if i > 0 {
                f.write_str(" --> ")?;
            }
            write!(f, "{link:#x}")?;
        }

        if links.len() > self.limit {
            return f.write_str(" --> ...");
        }
        match self.chain.end {
            ChainEnd::Terminated(value) | ChainEnd::Revisited(value) => {
                write!(f, " --> {value:#x}")
            }
            ChainEnd::Limit => f.write_str(" --> ..."),
            ChainEnd::Closed | ChainEnd::Implausible | ChainEnd::Unreadable(_) => Ok(()),
        }
    }
}

/// Follow the free list that starts at `start` through `fd` or `bk` links.
///
/// The start value is always the first link. Tracing stops once a link points back to
/// the start, points somewhere that is not an address, or revisits an earlier link.
/// The result is for display; classification never depends on it.
pub fn trace_chain<E: Environment + ?Sized>(env: &E, start: u64, direction: Direction) -> Chain {
    let mut links = vec![start];
    let mut seen = BTreeSet::from([start]);

    if !env.is_plausible_address(start) {
        return Chain { links, end: ChainEnd::Implausible };
    }

    let mut current = start;
    let end = loop {
        if links.len() >= MAX_CHAIN_LEN {
            break ChainEnd::Limit;
        }
        let next = match env.read_word(current, direction.offset()) {
            Ok(next) => next,
            Err(e) => {
                debug!("chain from {start:#x}: {e}");
                break ChainEnd::Unreadable(current);
            }
        };
        if next == start {
            break ChainEnd::Closed;
        }
        if !env.is_plausible_address(next) {
            break ChainEnd::Terminated(next);
        }
        if !seen.insert(next) {
            break ChainEnd::Revisited(next);
        }
        links.push(next);
        current = next;
    };

    Chain { links, end }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::WordSize;
    use crate::synth::SyntheticHeap;

    fn four_chunks() -> (SyntheticHeap, [u64; 4]) {
        let mut heap = SyntheticHeap::new(WordSize::Bits64, 0x1000);
        let nodes = [
            heap.chunk(0, 0x91),
            heap.chunk(0, 0x91),
            heap.chunk(0, 0x91),
            heap.chunk(0, 0x91),
        ];
        (heap, nodes)
    }

    #[test]
    fn test_acyclic_list() {
        let (mut heap, [a, b, c, d]) = four_chunks();
        heap.set_fd(a, b);
        heap.set_fd(b, c);
        heap.set_fd(c, d);
        heap.set_fd(d, 0);
        let image = heap.build();

        let chain = trace_chain(&image, a, Direction::Forward);
        assert_eq!(chain.links, vec![a, b, c, d]);
        assert_eq!(chain.end, ChainEnd::Terminated(0));
    }

    #[test]
    fn test_cycle_through_start() {
        let (mut heap, [a, b, c, d]) = four_chunks();
        heap.set_bk(a, d);
        heap.set_bk(d, c);
        heap.set_bk(c, b);
        heap.set_bk(b, a);
        let image = heap.build();

        let chain = trace_chain(&image, a, Direction::Backward);
        assert_eq!(chain.links, vec![a, d, c, b]);
        assert_eq!(chain.end, ChainEnd::Closed);
    }

    #[test]
    fn test_cycle_not_through_start() {
        let (mut heap, [a, b, c, _]) = four_chunks();
        heap.set_fd(a, b);
        heap.set_fd(b, c);
        heap.set_fd(c, b);
        let image = heap.build();

        let chain = trace_chain(&image, a, Direction::Forward);
        assert_eq!(chain.links, vec![a, b, c]);
        assert_eq!(chain.end, ChainEnd::Revisited(b));
    }

    #[test]
    fn test_implausible_start() {
        let (heap, _) = four_chunks();
        let image = heap.build();

        let chain = trace_chain(&image, 0x4141414141414141, Direction::Forward);
        assert_eq!(chain.links, vec![0x4141414141414141]);
        assert_eq!(chain.end, ChainEnd::Implausible);
    }

    #[test]
    fn test_display_truncates() {
        let chain = Chain { links: (1..=8).map(|i| i * 0x10).collect(), end: ChainEnd::Closed };
        assert_eq!(
            chain.display(DISPLAY_CHAIN_LEN).to_string(),
            "0x10 --> 0x20 --> 0x30 --> 0x40 --> 0x50 --> 0x60 --> ..."
        );

        let chain = Chain { links: vec![0x1000, 0x1090], end: ChainEnd::Terminated(0) };
        assert_eq!(chain.display(DISPLAY_CHAIN_LEN).to_string(), "0x1000 --> 0x1090 --> 0x0");

        let chain = Chain { links: vec![0x1000], end: ChainEnd::Closed };
        assert_eq!(chain.display(DISPLAY_CHAIN_LEN).to_string(), "0x1000");
    }
}
