use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation},
};

use crate::State;

use super::{BLUE, DARK_GRAY, GREEN, ORANGE, SCROLL_CONTROL_TEXT, YELLOW};

pub const HEXDUMP_WIDTH: usize = 16;

/// Convert bytes read at `pos` into hexdump lines, `skip` that many lines, `take` that many lines
fn to_hexdump_str<'a>(pos: u64, buffer: &[u8], skip: usize, take: usize) -> Vec<Line<'a>> {
    let mut lines = Vec::new();
    for (offset, chunk) in buffer.chunks(HEXDUMP_WIDTH).skip(skip).take(take).enumerate() {
        let mut hex_spans = Vec::new();
        // bytes
        for byte in chunk {
            let style = Style::default().fg(color(*byte));
            hex_spans.push(Span::styled(format!("{byte:02x} "), style));
        }
        // pad a short final row so the ascii column lines up
        for _ in chunk.len()..HEXDUMP_WIDTH {
            hex_spans.push(Span::raw("   "));
        }

        // ascii
        hex_spans.push(Span::raw("| "));
        for byte in chunk {
            let ascii_char = if byte.is_ascii_graphic() { *byte as char } else { '.' };
            let style = Style::default().fg(color(*byte));
            hex_spans.push(Span::styled(ascii_char.to_string(), style));
        }

        let address = pos + ((skip + offset) * HEXDUMP_WIDTH) as u64;
        let line = Line::from_iter(
            vec![Span::raw(format!("{address:016x}: "))].into_iter().chain(hex_spans),
        );
        lines.push(line);
    }

    lines
}

pub fn color(byte: u8) -> Color {
    if byte == 0x00 {
        DARK_GRAY
    } else if byte.is_ascii_graphic() {
        BLUE
    } else if byte.is_ascii_whitespace() {
        GREEN
    } else if byte.is_ascii() {
        ORANGE
    } else {
        YELLOW
    }
}

fn block(pos: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(format!("Hexdump{pos} {SCROLL_CONTROL_TEXT}, Back(H/Esc))").fg(ORANGE))
}

pub fn draw_hexdump(state: &mut State, f: &mut Frame, hexdump: Rect) {
    let Some((address, data)) = &state.hexdump else {
        f.render_widget(Paragraph::new("").block(block("")), hexdump);
        return;
    };
    let pos = format!("(0x{address:02x}, {} bytes)", data.len());

    let skip = state.hexdump_scroll.scroll;
    let take = hexdump.height;
    let lines = to_hexdump_str(*address, data, skip, take as usize);
    let content_len = data.len().div_ceil(HEXDUMP_WIDTH);

    state.hexdump_scroll.state = state.hexdump_scroll.state.content_length(content_len);
    let paragraph =
        Paragraph::new(lines).block(block(&pos)).style(Style::default().fg(Color::White));

    f.render_widget(paragraph, hexdump);
    f.render_stateful_widget(
        Scrollbar::new(ScrollbarOrientation::VerticalRight),
        hexdump,
        &mut state.hexdump_scroll.state,
    );
}
