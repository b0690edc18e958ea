//! Search line and status bar rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::{App, Mode};

/// Render the search line above the board.
pub fn render_search(frame: &mut Frame, area: Rect, app: &App) {
    let style = if app.mode == Mode::Search {
        theme::highlighted()
    } else {
        theme::dimmed()
    };
    let cursor = if app.mode == Mode::Search { "_" } else { "" };
    let line = Line::from(vec![
        Span::styled("Search: ", style),
        Span::styled(format!("{}{cursor}", app.search), theme::normal()),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

/// Render the status bar at the bottom of the screen.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let help_text = match app.mode {
        Mode::Browse => "←→↑↓: select | Space: pick up | /: search | r: refresh | x: dismiss | q: quit",
        Mode::Search => "type to filter | Enter: keep | Esc: clear",
        Mode::Dragging => "←→: column | ↑↓: card | Enter: drop | Esc: cancel",
    };

    let dot_color = if app.connection.starts_with("Online") {
        theme::SUCCESS
    } else {
        theme::OFFLINE
    };

    let mut spans = vec![
        Span::styled("TaskBoard", theme::bold()),
        Span::raw(" | "),
        Span::styled("●", theme::normal().fg(dot_color)),
        Span::raw(format!(" {}", app.connection)),
    ];
    if app.in_flight > 0 {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("{} pending", app.in_flight),
            theme::normal().fg(theme::WARNING),
        ));
    }
    spans.push(Span::raw(" | "));
    if let Some(notice) = app.board.notices().latest() {
        spans.push(Span::styled(notice.message(), theme::normal().fg(theme::ERROR)));
    } else if let Some(flash) = &app.flash {
        spans.push(Span::styled(flash.clone(), theme::normal().fg(theme::WARNING)));
    } else {
        spans.push(Span::styled(help_text, theme::dimmed()));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(theme::status_bar_bg());
    frame.render_widget(paragraph, area);
}
