use ratatui::layout::Constraint::Length;
use ratatui::layout::{Alignment, Layout};
use ratatui::prelude::Stylize;
use ratatui::style::Modifier;
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, layout::Rect, style::Style};

use super::{FREE_COLOR, GRAY_FG, IN_USE_COLOR};

use crate::{InputMode, State};

pub fn draw_title_area(state: &mut State, f: &mut Frame, title_area: Rect) {
    let vertical_title = Layout::vertical([Length(1), Length(1)]);
    let [first, second] = vertical_title.areas(title_area);
    f.render_widget(
        Block::new()
            .borders(Borders::TOP)
            .title(vec![
                "|".fg(GRAY_FG),
                env!("CARGO_PKG_NAME").bold(),
                "-".fg(GRAY_FG),
                "v".into(),
                env!("CARGO_PKG_VERSION").into(),
                "|".fg(GRAY_FG),
            ])
            .title_alignment(Alignment::Center),
        first,
    );

    state.status = match state.input_mode {
        InputMode::Normal => "Press q to exit, i to go to a chunk".to_owned(),
        InputMode::Editing => "Press Esc to stop editing, Enter to go".to_owned(),
    };

    let msg = vec![
        Span::raw("(Legend: "),
        Span::styled("in use", Style::default().fg(IN_USE_COLOR).add_modifier(Modifier::BOLD)),
        Span::raw(", "),
        Span::styled("not in use", Style::default().fg(FREE_COLOR).add_modifier(Modifier::BOLD)),
        Span::raw(") | "),
        Span::styled("H", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" hexdump | "),
        Span::styled("r", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" reload"),
    ];
    let text = Text::from(Line::from(msg));
    let help_message = Paragraph::new(text).alignment(Alignment::Center);
    f.render_widget(help_message, second);
}
