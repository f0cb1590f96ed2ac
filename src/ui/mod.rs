use ratatui::Frame;
use ratatui::layout::Constraint::{Fill, Length, Percentage};
use ratatui::layout::{Flex, Layout, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::{Mode, State};

pub mod heap;
pub mod hexdump;
pub mod input;
pub mod title;

// Ayu bell colors
const BLUE: Color = Color::Rgb(0x59, 0xc2, 0xff);
const PURPLE: Color = Color::Rgb(0xd2, 0xa6, 0xff);
const ORANGE: Color = Color::Rgb(0xff, 0x8f, 0x40);
const YELLOW: Color = Color::Rgb(0xe6, 0xb4, 0x50);
const GREEN: Color = Color::Rgb(0xaa, 0xd9, 0x4c);
const RED: Color = Color::Rgb(0xff, 0x33, 0x33);
const DARK_GRAY: Color = Color::Rgb(0x20, 0x27, 0x34);
const GRAY_FG: Color = Color::Rgb(0x64, 0x67, 0x6a);

const IN_USE_COLOR: Color = BLUE;
const FREE_COLOR: Color = GREEN;

const SCROLL_CONTROL_TEXT: &str = "(up(k), down(j), 50 up(K), 50 down(J), top(g), bottom(G)";

pub fn ui(f: &mut Frame, state: &mut State) {
    let vertical = Layout::vertical([Length(2), Fill(1), Length(3)]);
    let [title_area, main, input] = vertical.areas(f.area());

    title::draw_title_area(state, f, title_area);

    let mode = if state.mode == Mode::QuitConfirmation { state.previous_mode } else { state.mode };
    match mode {
        Mode::Hexdump => hexdump::draw_hexdump(state, f, main),
        _ => heap::draw_heap(state, f, main),
    }

    input::draw_input(title_area, state, f, input);

    if state.mode == Mode::QuitConfirmation {
        draw_quit_confirmation(f, main);
    }
}

fn popup_area(area: Rect, percent_x: u16) -> Rect {
    let vertical = Layout::vertical([Length(3)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}

fn draw_quit_confirmation(f: &mut Frame, area: Rect) {
    let area = popup_area(area, 40);
    let text = Paragraph::new("Quit? Enter to confirm, Esc to cancel").block(
        Block::default()
            .borders(Borders::ALL)
            .title("Quit".fg(YELLOW))
            .border_style(Style::default().fg(ORANGE)),
    );
    f.render_widget(Clear, area);
    f.render_widget(text, area);
}
