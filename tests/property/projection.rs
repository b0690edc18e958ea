//! Property tests for the board projection and optimistic rollback.
//!
//! Uses proptest to verify:
//! 1. Every status has a column and the columns hold exactly the matching tasks.
//! 2. No task shows up in more than one column.
//! 3. Tasks sharing a status keep their input order.
//! 4. A failed transition always restores the source status.
//! 5. A failure of an older transition never undoes a newer one.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use proptest::prelude::*;
use taskboard::board::project;
use taskboard::drag::StatusChange;
use taskboard::gateway::TransitionError;
use taskboard::optimistic::{BeginOutcome, Settlement, TaskBoard};
use taskboard::store::TaskStore;
use taskboard_proto::task::{Task, TaskId, TaskStatus};

// --- Strategies ---

fn arb_status() -> impl Strategy<Value = TaskStatus> {
    (0..TaskStatus::ALL.len()).prop_map(|i| TaskStatus::ALL[i])
}

const WORDS: [&str; 8] = [
    "invoice", "client", "lease", "Draft", "review", "MOTION", "call", "file",
];

fn arb_title() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS.to_vec()), 1..4).prop_map(|w| w.join(" "))
}

/// Tasks with unique ids, in arbitrary status order.
fn arb_tasks() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(
        (arb_title(), arb_status(), prop::option::of(arb_title())),
        0..40,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (title, status, description))| {
                let task = Task::new(format!("t{i}"), title, status).unwrap();
                match description {
                    Some(d) => task.with_description(d),
                    None => task,
                }
            })
            .collect()
    })
}

fn arb_query() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("   ".to_string()),
        prop::sample::select(WORDS.to_vec()).prop_map(str::to_string),
        prop::sample::select(WORDS.to_vec()).prop_map(str::to_uppercase),
        "[a-z]{1,3}",
    ]
}

fn matches(task: &Task, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    needle.is_empty()
        || task.title.to_lowercase().contains(&needle)
        || task
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&needle))
}

fn failure() -> impl Strategy<Value = TransitionError> {
    prop_oneof![
        Just(TransitionError::Network("connection reset".to_string())),
        Just(TransitionError::Timeout),
        arb_status().prop_map(|s| TransitionError::Conflict { current: Some(s) }),
        Just(TransitionError::Conflict { current: None }),
        Just(TransitionError::Validation("not allowed".to_string())),
    ]
}

// --- Projection properties ---

proptest! {
    #[test]
    fn columns_hold_exactly_the_matching_tasks(tasks in arb_tasks(), query in arb_query()) {
        let board = project(&tasks, &query);
        prop_assert_eq!(board.iter().count(), TaskStatus::ALL.len());

        let shown: HashSet<&TaskId> = board
            .iter()
            .flat_map(|(_, column)| column.iter().map(|t| &t.id))
            .collect();
        let expected: HashSet<&TaskId> = tasks
            .iter()
            .filter(|t| matches(t, &query))
            .map(|t| &t.id)
            .collect();
        prop_assert_eq!(shown, expected);

        for (status, column) in board.iter() {
            prop_assert!(column.iter().all(|t| t.status == status));
        }
    }

    #[test]
    fn no_task_is_in_two_columns(tasks in arb_tasks(), query in arb_query()) {
        let board = project(&tasks, &query);
        let mut seen = HashSet::new();
        for (_, column) in board.iter() {
            for task in column {
                prop_assert!(seen.insert(task.id.clone()), "{} shown twice", task.id);
            }
        }
        prop_assert_eq!(seen.len(), board.len());
    }

    #[test]
    fn column_order_follows_input_order(tasks in arb_tasks(), query in arb_query()) {
        let board = project(&tasks, &query);
        for status in TaskStatus::ALL {
            let expected: Vec<&TaskId> = tasks
                .iter()
                .filter(|t| t.status == status && matches(t, &query))
                .map(|t| &t.id)
                .collect();
            let actual: Vec<&TaskId> = board.column(status).iter().map(|t| &t.id).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}

// --- Rollback properties ---

proptest! {
    #[test]
    fn failed_transition_restores_source(
        tasks in arb_tasks().prop_filter("non-empty", |t| !t.is_empty()),
        pick in any::<prop::sample::Index>(),
        to in arb_status(),
        err in failure(),
    ) {
        let task = &tasks[pick.index(tasks.len())];
        let (task_id, from) = (task.id.clone(), task.status);
        prop_assume!(from != to);

        let mut board = TaskBoard::new(TaskStore::from_tasks(tasks.clone()).unwrap(), 8);
        let BeginOutcome::Pending(pending) = board.begin(StatusChange {
            task_id: task_id.clone(),
            from,
            to,
        }) else {
            return Err(TestCaseError::fail("move was not applied"));
        };
        prop_assert_eq!(board.store().status_of(&task_id), Some(to));

        let settlement = board.settle(&pending, Err(err));
        prop_assert!(matches!(settlement, Settlement::RolledBack(_)));
        prop_assert_eq!(board.store().status_of(&task_id), Some(from));
        prop_assert_eq!(board.project("").locate(&task_id).map(|(s, _)| s), Some(from));
    }

    #[test]
    fn older_failure_never_undoes_newer_move(
        from in arb_status(),
        mid in arb_status(),
        last in arb_status(),
        err in failure(),
    ) {
        prop_assume!(from != mid && mid != last);
        let task = Task::new("t1", "Draft invoice", from).unwrap();
        let mut board = TaskBoard::new(TaskStore::from_tasks(vec![task]).unwrap(), 8);
        let id = TaskId::new("t1");

        let BeginOutcome::Pending(first) = board.begin(StatusChange {
            task_id: id.clone(),
            from,
            to: mid,
        }) else {
            return Err(TestCaseError::fail("first move was not applied"));
        };
        let BeginOutcome::Pending(_second) = board.begin(StatusChange {
            task_id: id.clone(),
            from: mid,
            to: last,
        }) else {
            return Err(TestCaseError::fail("second move was not applied"));
        };

        prop_assert_eq!(board.settle(&first, Err(err)), Settlement::Superseded);
        prop_assert_eq!(board.store().status_of(&id), Some(last));
        prop_assert!(board.notices().is_empty());
    }
}
