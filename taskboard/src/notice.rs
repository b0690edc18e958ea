//! Dismissible user-facing notices about failed transitions.

use std::collections::VecDeque;

use taskboard_proto::task::{TaskId, TaskStatus};

use crate::gateway::TransitionError;

/// Why a move did not stick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    /// The backend could not be reached.
    Network,
    /// The backend did not answer in time.
    Timeout,
    /// The task changed concurrently.
    Conflict {
        /// Backend status, when known.
        current: Option<TaskStatus>,
    },
    /// The backend refused the target status.
    Rejected(String),
    /// The move was based on a status the task no longer had locally.
    Stale,
}

impl From<&TransitionError> for NoticeKind {
    fn from(err: &TransitionError) -> Self {
        match err {
            TransitionError::Network(_) => Self::Network,
            TransitionError::Timeout => Self::Timeout,
            TransitionError::Conflict { current } => Self::Conflict { current: *current },
            TransitionError::Validation(reason) => Self::Rejected(reason.clone()),
        }
    }
}

/// A message shown until dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Queue-assigned id used for dismissal.
    pub id: u64,
    /// Task the move concerned.
    pub task_id: TaskId,
    /// Title at the time of the failure.
    pub task_title: String,
    /// Status before the attempted move.
    pub from: TaskStatus,
    /// Attempted target status.
    pub to: TaskStatus,
    /// Failure category.
    pub kind: NoticeKind,
}

impl Notice {
    /// Human-readable text naming the task, the attempted move and the reason.
    #[must_use]
    pub fn message(&self) -> String {
        let reason = match &self.kind {
            NoticeKind::Network => "server unreachable".to_string(),
            NoticeKind::Timeout => "no reply from server, reloading board".to_string(),
            NoticeKind::Conflict {
                current: Some(current),
            } => format!("changed elsewhere, now {}", current.label()),
            NoticeKind::Conflict { current: None } => "changed elsewhere".to_string(),
            NoticeKind::Rejected(reason) => format!("rejected: {reason}"),
            NoticeKind::Stale => "board was out of date".to_string(),
        };
        format!(
            "Could not move \"{}\" from {} to {}: {reason}",
            self.task_title,
            self.from.label(),
            self.to.label()
        )
    }
}

/// Bounded queue of notices; the oldest is evicted when full.
#[derive(Debug)]
pub struct NoticeQueue {
    notices: VecDeque<Notice>,
    capacity: usize,
    next_id: u64,
}

impl NoticeQueue {
    /// Creates a queue holding at most `capacity` notices (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            notices: VecDeque::new(),
            capacity: capacity.max(1),
            next_id: 0,
        }
    }

    /// Queues a notice and returns its id.
    pub fn push(
        &mut self,
        task_id: TaskId,
        task_title: String,
        from: TaskStatus,
        to: TaskStatus,
        kind: NoticeKind,
    ) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        if self.notices.len() == self.capacity {
            self.notices.pop_front();
        }
        self.notices.push_back(Notice {
            id,
            task_id,
            task_title,
            from,
            to,
            kind,
        });
        id
    }

    /// Most recent notice.
    #[must_use]
    pub fn latest(&self) -> Option<&Notice> {
        self.notices.back()
    }

    /// Dismisses the notice with `id`; returns whether it was present.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    /// Dismisses the most recent notice.
    pub fn dismiss_latest(&mut self) -> Option<Notice> {
        self.notices.pop_back()
    }

    /// Notices from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}

impl Default for NoticeQueue {
    fn default() -> Self {
        Self::new(8)
    }
}
