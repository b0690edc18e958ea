//! Application state and key handling for the terminal board.
//!
//! Keyboard gestures stand in for pointer drags: `Space` picks up the
//! selected card, arrow keys move it over columns and cards, `Enter` drops
//! and `Esc` cancels. Every gesture goes through the same
//! [`DragEvent`] path a pointer would use.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use taskboard_proto::task::{TaskId, TaskStatus};

use crate::drag::{DragEvent, DropTarget};
use crate::optimistic::{Settlement, TaskBoard};
use crate::sync::{GatewayCommand, GatewayEvent};

/// Input mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Moving the cursor between cards.
    Browse,
    /// Editing the search query.
    Search,
    /// Carrying a card.
    Dragging,
}

/// Selected card position within the visible board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub column: TaskStatus,
    pub row: usize,
}

/// Main application state.
pub struct App {
    /// Board state, owned by the UI loop.
    pub board: TaskBoard,
    /// Current search query.
    pub search: String,
    pub mode: Mode,
    pub cursor: Cursor,
    /// While dragging, the card in the candidate column the drop would land
    /// on; `None` drops on the column itself.
    pub drop_row: Option<usize>,
    /// Gateway description shown in the status bar.
    pub connection: String,
    /// Transient status line message.
    pub flash: Option<String>,
    /// Transition calls awaiting an answer.
    pub in_flight: usize,
    pub should_quit: bool,
}

impl App {
    /// Creates an app around `board`, starting with `search` as the query.
    #[must_use]
    pub fn new(board: TaskBoard, search: impl Into<String>) -> Self {
        Self {
            board,
            search: search.into(),
            mode: Mode::Browse,
            cursor: Cursor {
                column: TaskStatus::Todo,
                row: 0,
            },
            drop_row: None,
            connection: "Connecting".to_string(),
            flash: None,
            in_flight: 0,
            should_quit: false,
        }
    }

    /// Ids of the visible cards in `status`, top to bottom.
    #[must_use]
    pub fn visible_column(&self, status: TaskStatus) -> Vec<TaskId> {
        self.board
            .project(&self.search)
            .column(status)
            .iter()
            .map(|t| t.id.clone())
            .collect()
    }

    /// Card under the cursor.
    #[must_use]
    pub fn selected_task(&self) -> Option<TaskId> {
        self.visible_column(self.cursor.column)
            .into_iter()
            .nth(self.cursor.row)
    }

    /// Column the dragged card is over, if dragging.
    #[must_use]
    pub fn candidate_column(&self) -> Option<TaskStatus> {
        self.board.drag().session().and_then(|s| s.candidate)
    }

    /// Handles a key and returns the command to send to the gateway worker,
    /// if any.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<GatewayCommand> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return None;
        }
        match self.mode {
            Mode::Browse => self.handle_browse_key(key),
            Mode::Search => {
                self.handle_search_key(key);
                None
            }
            Mode::Dragging => self.handle_drag_key(key),
        }
    }

    fn handle_browse_key(&mut self, key: KeyEvent) -> Option<GatewayCommand> {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Left | KeyCode::Char('h') => self.move_column(-1),
            KeyCode::Right | KeyCode::Char('l') => self.move_column(1),
            KeyCode::Up | KeyCode::Char('k') => self.cursor.row = self.cursor.row.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                self.cursor.row += 1;
                self.clamp_cursor();
            }
            KeyCode::Char(' ') | KeyCode::Enter => self.pick_up(),
            KeyCode::Char('/') => self.mode = Mode::Search,
            KeyCode::Char('x') => {
                self.board.notices_mut().dismiss_latest();
            }
            KeyCode::Char('r') => return Some(GatewayCommand::Refresh),
            _ => {}
        }
        None
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.mode = Mode::Browse,
            KeyCode::Esc => {
                self.search.clear();
                self.mode = Mode::Browse;
            }
            KeyCode::Backspace => {
                self.search.pop();
            }
            KeyCode::Char(c) => self.search.push(c),
            _ => {}
        }
        self.cursor.row = 0;
        self.clamp_cursor();
    }

    fn handle_drag_key(&mut self, key: KeyEvent) -> Option<GatewayCommand> {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.move_candidate(-1),
            KeyCode::Right | KeyCode::Char('l') => self.move_candidate(1),
            KeyCode::Up | KeyCode::Char('k') => {
                self.drop_row = self.drop_row.and_then(|row| row.checked_sub(1));
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self
                    .candidate_column()
                    .map_or(0, |c| self.visible_column(c).len());
                let next = self.drop_row.map_or(0, |row| row + 1);
                if next < len {
                    self.drop_row = Some(next);
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => return self.drop(),
            KeyCode::Esc => {
                self.feed(DragEvent::Cancel);
                self.end_drag();
            }
            _ => {}
        }
        None
    }

    fn pick_up(&mut self) {
        let Some(task_id) = self.selected_task() else {
            return;
        };
        self.feed(DragEvent::Start(task_id));
        if self.board.drag().is_dragging() {
            self.mode = Mode::Dragging;
            self.drop_row = None;
        }
    }

    fn drop(&mut self) -> Option<GatewayCommand> {
        let dragged = self.board.drag().session().map(|s| s.task_id.clone());
        let target = self.candidate_column().map(|column| {
            self.drop_row
                .and_then(|row| self.visible_column(column).into_iter().nth(row))
                .map_or(DropTarget::Column(column), DropTarget::Task)
        });
        let pending = self.feed(DragEvent::Drop(target));
        self.end_drag();
        if let Some(task_id) = dragged {
            self.follow(&task_id);
        }
        pending.map(|p| {
            self.in_flight += 1;
            GatewayCommand::Transition(p)
        })
    }

    fn feed(&mut self, event: DragEvent) -> Option<crate::optimistic::PendingTransition> {
        match self.board.handle_drag(event) {
            Ok(pending) => pending,
            Err(e) => {
                self.flash = Some(e.to_string());
                None
            }
        }
    }

    fn end_drag(&mut self) {
        self.mode = Mode::Browse;
        self.drop_row = None;
        self.clamp_cursor();
    }

    fn move_column(&mut self, delta: isize) {
        self.cursor.column = step_column(self.cursor.column, delta);
        self.clamp_cursor();
    }

    fn move_candidate(&mut self, delta: isize) {
        let current = self.candidate_column().unwrap_or(self.cursor.column);
        let next = step_column(current, delta);
        self.feed(DragEvent::Over(Some(next)));
        self.drop_row = None;
    }

    /// Moves the cursor onto `task_id` if it is visible.
    fn follow(&mut self, task_id: &TaskId) {
        if let Some((column, row)) = self.board.project(&self.search).locate(task_id) {
            self.cursor = Cursor { column, row };
        }
    }

    fn clamp_cursor(&mut self) {
        let len = self.visible_column(self.cursor.column).len();
        self.cursor.row = self.cursor.row.min(len.saturating_sub(1));
    }

    /// Applies a result from the gateway worker.
    pub fn apply_gateway_event(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::Settled { pending, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if let Settlement::RolledBack(_) = self.board.settle(&pending, result) {
                    self.clamp_cursor();
                }
            }
            GatewayEvent::Refreshed(Ok(tasks)) => {
                let selected = self.selected_task();
                self.board.refresh(tasks);
                if self.mode == Mode::Dragging {
                    self.end_drag();
                }
                match selected {
                    Some(task_id) => self.follow(&task_id),
                    None => self.clamp_cursor(),
                }
                self.flash = None;
            }
            GatewayEvent::Refreshed(Err(e)) => {
                self.flash = Some(format!("Refresh failed: {e}"));
            }
            GatewayEvent::ConnectionStatus(description) => self.connection = description,
        }
    }

    /// Refresh command owed to the worker, if the board asked for one.
    pub fn pending_refresh(&mut self) -> Option<GatewayCommand> {
        self.board
            .take_refresh_request()
            .then_some(GatewayCommand::Refresh)
    }
}

fn step_column(status: TaskStatus, delta: isize) -> TaskStatus {
    let index = status.index().saturating_add_signed(delta);
    TaskStatus::from_index(index.min(TaskStatus::ALL.len() - 1)).unwrap_or(status)
}
