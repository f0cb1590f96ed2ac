use augury::{Chunk, DISPLAY_CHAIN_LEN, Environment, Heap};
use ratatui::{
    Frame,
    layout::{Constraint::Fill, Constraint::Length, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation},
};

use crate::State;

use super::{FREE_COLOR, GREEN, IN_USE_COLOR, ORANGE, PURPLE, RED, SCROLL_CONTROL_TEXT, YELLOW};

/// Lines taken by one chunk in the heap view, including the spacer
pub const BLOCK_HEIGHT: usize = 6;

const MAX_WARNINGS_SHOWN: usize = 5;

/// One chunk, formatted and with its free-list chains already traced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkBlock {
    pub index: usize,
    pub address: u64,
    pub prev_size: u64,
    pub size: u64,
    pub in_use: bool,
    pub prev_inuse: bool,
    pub mmapped: bool,
    pub non_main_arena: bool,
    pub fd: String,
    pub bk: String,
}

impl ChunkBlock {
    pub fn new<E: Environment + ?Sized>(
        heap: &Heap,
        env: &E,
        index: usize,
        chunk: &Chunk,
    ) -> Self {
        let fd = match heap.forward_chain(env, chunk) {
            Some(chain) => chain.display(DISPLAY_CHAIN_LEN).to_string(),
            None => format!("{:#x}", chunk.forward_pointer),
        };
        let bk = match heap.backward_chain(env, chunk) {
            Some(chain) => chain.display(DISPLAY_CHAIN_LEN).to_string(),
            None => format!("{:#x}", chunk.backward_pointer),
        };
        Self {
            index,
            address: chunk.address,
            prev_size: chunk.prev_size,
            size: chunk.size,
            in_use: chunk.in_use,
            prev_inuse: chunk.prev_inuse(),
            mmapped: chunk.is_mmapped(),
            non_main_arena: chunk.non_main_arena(),
            fd,
            bk,
        }
    }

    pub fn header(&self) -> String {
        format!("HEAP[{}] is at {:#x}", self.index, self.address)
    }

    /// `(label, value)` rows under the header
    pub fn fields(&self) -> [(&'static str, String); 4] {
        [
            ("prev_size", format!("{:#x}", self.prev_size)),
            ("size", format!("{:#x}", self.size)),
            ("fd", self.fd.clone()),
            ("bk", self.bk.clone()),
        ]
    }

    fn color(&self) -> Color {
        if self.in_use { IN_USE_COLOR } else { FREE_COLOR }
    }

    fn to_lines<'a>(&self, selected: bool) -> Vec<Line<'a>> {
        let color = self.color();
        let mut header_style = Style::default().fg(color).add_modifier(Modifier::BOLD);
        if selected {
            header_style = header_style.add_modifier(Modifier::REVERSED);
        }

        let mut header = vec![Span::styled(self.header(), header_style), Span::raw(" | ")];
        if self.prev_inuse {
            header.push(Span::styled("PREV_INUSE ", Style::default().fg(GREEN)));
        }
        if self.mmapped {
            header.push(Span::styled("IS_MMAPPED ", Style::default().fg(YELLOW)));
        }
        if self.non_main_arena {
            header.push(Span::styled("NON_MAIN_ARENA ", Style::default().fg(ORANGE)));
        }

        let mut lines = vec![Line::from(header)];
        for (label, value) in self.fields() {
            let value = if label == "size" {
                Span::styled(value, Style::default().fg(color))
            } else {
                Span::raw(value)
            };
            lines.push(Line::from(vec![Span::raw(format!("{label:<9}: ")), value]));
        }
        lines.push(Line::from(""));
        lines
    }
}

fn top_lines<'a, E: Environment + ?Sized>(heap: &Heap, env: &E, selected: bool) -> Vec<Line<'a>> {
    let mut style = Style::default().fg(PURPLE).add_modifier(Modifier::BOLD);
    if selected {
        style = style.add_modifier(Modifier::REVERSED);
    }
    let size = match env.read_word(heap.top, 1) {
        Ok(size) => format!("{size:#x}"),
        Err(e) => e.to_string(),
    };
    vec![
        Line::from(Span::styled(
            format!("HEAP[{}] is at {:#x} (top)", heap.len(), heap.top),
            style,
        )),
        Line::from(vec![Span::raw(format!("{:<9}: ", "size")), Span::raw(size)]),
    ]
}

fn block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(format!("Heap{title} {SCROLL_CONTROL_TEXT}, Hexdump(H), Reload(r))").fg(ORANGE))
}

/// Blocks starting at `skip`, enough to fill `height` rows; the top chunk closes the list
fn heap_lines<'a, E: Environment + ?Sized>(
    heap: &Heap,
    env: &E,
    skip: usize,
    height: usize,
) -> Vec<Line<'a>> {
    let take = height / BLOCK_HEIGHT + 1;
    let mut lines = Vec::new();
    for (index, chunk) in heap.chunks.iter().enumerate().skip(skip).take(take) {
        lines.extend(ChunkBlock::new(heap, env, index, chunk).to_lines(index == skip));
    }
    if skip + take > heap.len() {
        lines.extend(top_lines(heap, env, skip == heap.len()));
    }
    lines
}

pub fn draw_heap(state: &mut State, f: &mut Frame, area: Rect) {
    let skip = state.heap_scroll.scroll;
    let State { target, heap_scroll, .. } = state;

    let (heap, image) = match target.heap() {
        Ok(built) => built,
        Err(e) => {
            let paragraph =
                Paragraph::new(e.to_string()).block(block("")).style(Style::default().fg(RED));
            f.render_widget(paragraph, area);
            return;
        }
    };

    let shown = heap.warnings.len().min(MAX_WARNINGS_SHOWN);
    let warnings_height = if shown == 0 { 0 } else { shown as u16 + 2 };
    let vertical = Layout::vertical([Fill(1), Length(warnings_height)]);
    let [chunks_area, warnings_area] = vertical.areas(area);

    let title = format!("(0x{:x}..0x{:x}, {} chunks)", heap.base, heap.top, heap.len());
    let lines = heap_lines(heap, image, skip, chunks_area.height as usize);
    let paragraph =
        Paragraph::new(lines).block(block(&title)).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, chunks_area);

    // top chunk is the extra entry
    heap_scroll.state = heap_scroll.state.content_length(heap.len() + 1);
    f.render_stateful_widget(
        Scrollbar::new(ScrollbarOrientation::VerticalRight),
        chunks_area,
        &mut heap_scroll.state,
    );

    if shown > 0 {
        let lines: Vec<Line> = heap
            .warnings
            .iter()
            .take(MAX_WARNINGS_SHOWN)
            .map(|w| Line::from(w.to_string().fg(YELLOW)))
            .collect();
        let title = format!("Warnings({})", heap.warnings.len());
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(title.fg(RED)));
        f.render_widget(paragraph, warnings_area);
    }
}

#[cfg(test)]
mod tests {
    use augury::{HeapLayout, SyntheticHeap, WordSize, build_chunk_map};

    use super::*;

    fn sample() -> SyntheticHeap {
        let mut heap = SyntheticHeap::new(WordSize::Bits64, 0x555555559000);
        heap.chunk(0, 0x291);
        let fast = heap.chunk(0, 0x21);
        let small = heap.chunk(0, 0x91);
        heap.chunk(0x90, 0x30);
        heap.set_fastbin(0, fast);
        heap.set_fd(small, 0x555555559000);
        heap.set_bk(small, 0x555555559000);
        heap
    }

    #[test]
    fn test_chunk_block_in_use_shows_raw_pointers() {
        let image = sample().build();
        let heap = build_chunk_map(&image, &HeapLayout::new(WordSize::Bits64)).unwrap();
        let block = ChunkBlock::new(&heap, &image, 0, heap.get(0).unwrap());
        assert!(block.in_use);
        assert_eq!(block.header(), "HEAP[0] is at 0x555555559000");
        assert_eq!(block.fd, "0x0");
        assert_eq!(block.bk, "0x0");
    }

    #[test]
    fn test_chunk_block_free_shows_chains() {
        let image = sample().build();
        let heap = build_chunk_map(&image, &HeapLayout::new(WordSize::Bits64)).unwrap();

        let fast = ChunkBlock::new(&heap, &image, 1, heap.get(1).unwrap());
        assert!(!fast.in_use);
        assert_eq!(fast.fd, "0x0");
        // too small for a doubly linked bin
        assert_eq!(fast.bk, "0x0");

        let small = ChunkBlock::new(&heap, &image, 2, heap.get(2).unwrap());
        assert!(!small.in_use);
        assert_eq!(small.fd, "0x555555559000 --> 0x0");
        assert_eq!(small.bk, "0x555555559000 --> 0x0");
        assert_eq!(small.fields()[1], ("size", "0x91".to_string()));
    }

    #[test]
    fn test_chunk_block_flag_spans() {
        let mut heap_def = SyntheticHeap::new(WordSize::Bits64, 0x1000);
        heap_def.chunk(0, 0x27);
        let image = heap_def.build();
        let heap = build_chunk_map(&image, &HeapLayout::new(WordSize::Bits64)).unwrap();

        let block = ChunkBlock::new(&heap, &image, 0, heap.get(0).unwrap());
        assert!(block.prev_inuse && block.mmapped && block.non_main_arena);
        assert_eq!(
            block.to_lines(false)[0].to_string(),
            "HEAP[0] is at 0x1000 | PREV_INUSE IS_MMAPPED NON_MAIN_ARENA "
        );
    }

    #[test]
    fn test_heap_lines_end_with_top() {
        let heap_def = sample();
        let image = heap_def.build();
        let heap = build_chunk_map(&image, &HeapLayout::new(WordSize::Bits64)).unwrap();

        let lines = heap_lines(&heap, &image, 3, 40);
        assert_eq!(lines.len(), BLOCK_HEIGHT + 2);
        assert_eq!(
            lines[BLOCK_HEIGHT].to_string(),
            format!("HEAP[4] is at {:#x} (top)", heap_def.top())
        );
        assert_eq!(lines[BLOCK_HEIGHT + 1].to_string(), "size     : 0x20d01");

        let lines = heap_lines(&heap, &image, 0, 6);
        assert_eq!(lines.len(), 2 * BLOCK_HEIGHT);
        assert_eq!(lines[0].to_string(), "HEAP[0] is at 0x555555559000 | PREV_INUSE ");
    }
}
