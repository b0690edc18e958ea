//! Board rendering: five columns of cards.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
};
use taskboard_proto::task::{Task, TaskStatus};

use super::theme;
use crate::app::{App, Mode};

/// Render every column side by side.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 5); 5])
        .split(area);

    let board = app.board.project(&app.search);
    for ((status, tasks), column_area) in board.iter().zip(columns.iter()) {
        render_column(frame, *column_area, app, status, tasks);
    }
}

fn render_column(frame: &mut Frame, area: Rect, app: &App, status: TaskStatus, tasks: &[&Task]) {
    let dragged = app.board.drag().session().map(|s| &s.task_id);
    let candidate = app.candidate_column() == Some(status);

    let items: Vec<ListItem> = tasks
        .iter()
        .enumerate()
        .map(|(row, task)| {
            let style = if dragged == Some(&task.id) {
                theme::dragging()
            } else if candidate && app.drop_row == Some(row) {
                theme::drop_target()
            } else if app.mode != Mode::Dragging
                && app.cursor.column == status
                && app.cursor.row == row
            {
                theme::selected()
            } else {
                theme::normal()
            };
            ListItem::new(card_lines(task, style))
        })
        .collect();

    let border_style = if candidate {
        theme::highlighted()
    } else {
        theme::dimmed()
    };
    let title = Span::styled(
        format!(" {} ({}) ", status.label(), tasks.len()),
        theme::panel_title(theme::column_color(status)),
    );
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style);

    frame.render_widget(List::new(items).block(block), area);
}

fn card_lines(task: &Task, style: ratatui::style::Style) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::styled("● ", theme::normal().fg(theme::priority_color(task.priority))),
        Span::styled(task.title.clone(), style),
    ])];
    let meta: Vec<String> = [
        task.assignee.as_ref().map(|a| format!("@{a}")),
        task.due_date.map(|d| format!("due {}", d.format("%b %d"))),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !meta.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("  {}", meta.join("  ")),
            theme::dimmed(),
        )));
    }
    lines
}
