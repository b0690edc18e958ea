//! End-to-end board flows: drag gestures, optimistic apply, gateway
//! settlement and rollback through the gateway worker.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use taskboard::drag::{DragEvent, DropTarget};
use taskboard::gateway::loopback::LoopbackGateway;
use taskboard::gateway::{StatusGateway, TransitionError};
use taskboard::notice::NoticeKind;
use taskboard::optimistic::{PendingTransition, Settlement, TaskBoard};
use taskboard::store::TaskStore;
use taskboard::sync::{GatewayCommand, GatewayEvent, spawn_gateway_worker};
use taskboard_proto::task::{Task, TaskId, TaskStatus};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A transition call held open until the test answers it.
struct ParkedCall {
    task_id: TaskId,
    to: TaskStatus,
    reply: oneshot::Sender<Result<(), TransitionError>>,
}

/// Gateway whose transition calls block until resolved by the test, so
/// the order in which answers arrive is fully controlled.
#[derive(Default)]
struct ParkingGateway {
    parked: Mutex<Vec<ParkedCall>>,
}

impl ParkingGateway {
    async fn wait_for_calls(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.parked.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("gateway calls did not arrive");
    }

    /// Answers the parked call that targets `to` and returns its task.
    fn resolve(&self, to: TaskStatus, result: Result<(), TransitionError>) -> TaskId {
        let call = {
            let mut parked = self.parked.lock();
            let index = parked
                .iter()
                .position(|c| c.to == to)
                .expect("no parked call for target");
            parked.remove(index)
        };
        let _ = call.reply.send(result);
        call.task_id
    }
}

impl StatusGateway for ParkingGateway {
    async fn request_transition(
        &self,
        task_id: &TaskId,
        old: TaskStatus,
        new: TaskStatus,
    ) -> Result<(), TransitionError> {
        assert_ne!(old, new);
        let (tx, rx) = oneshot::channel();
        self.parked.lock().push(ParkedCall {
            task_id: task_id.clone(),
            to: new,
            reply: tx,
        });
        rx.await
            .unwrap_or_else(|_| Err(TransitionError::Network("call dropped".to_string())))
    }

    async fn fetch_tasks(&self) -> Result<Vec<Task>, TransitionError> {
        Ok(Vec::new())
    }

    fn describe(&self) -> String {
        "Parked".to_string()
    }
}

fn id(s: &str) -> TaskId {
    TaskId::new(s)
}

fn single_task_board() -> TaskBoard {
    let store = TaskStore::from_tasks(vec![
        Task::new("t1", "Draft invoice", TaskStatus::Todo).unwrap(),
    ])
    .unwrap();
    TaskBoard::new(store, 8)
}

fn column_ids(board: &TaskBoard, status: TaskStatus) -> Vec<String> {
    board
        .project("")
        .column(status)
        .iter()
        .map(|t| t.id.to_string())
        .collect()
}

/// Runs a full pick-up and drop of `task` onto the `to` column.
fn drag_to(board: &mut TaskBoard, task: &str, to: TaskStatus) -> Option<PendingTransition> {
    board.handle_drag(DragEvent::Start(id(task))).unwrap();
    board.handle_drag(DragEvent::Over(Some(to))).unwrap();
    board
        .handle_drag(DragEvent::Drop(Some(DropTarget::Column(to))))
        .unwrap()
}

/// Next `Settled` event, skipping connection updates.
async fn next_settled(
    rx: &mut mpsc::Receiver<GatewayEvent>,
) -> (PendingTransition, Result<(), TransitionError>) {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for gateway event")
            .expect("worker stopped");
        if let GatewayEvent::Settled { pending, result } = event {
            return (pending, result);
        }
    }
}

async fn next_refreshed(rx: &mut mpsc::Receiver<GatewayEvent>) -> Vec<Task> {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for gateway event")
            .expect("worker stopped");
        if let GatewayEvent::Refreshed(result) = event {
            return result.expect("refresh failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Confirm and roll back
// ---------------------------------------------------------------------------

#[tokio::test]
async fn confirmed_move_stays_in_target_column() {
    let mut board = single_task_board();
    let gateway = Arc::new(LoopbackGateway::new(vec![
        Task::new("t1", "Draft invoice", TaskStatus::Todo).unwrap(),
    ]));
    let (cmd_tx, mut evt_rx) = spawn_gateway_worker(Arc::clone(&gateway), 16);

    let pending = drag_to(&mut board, "t1", TaskStatus::InProgress).expect("status change");
    assert_eq!(column_ids(&board, TaskStatus::InProgress), vec!["t1"]);
    cmd_tx.send(GatewayCommand::Transition(pending)).await.unwrap();

    let (pending, result) = next_settled(&mut evt_rx).await;
    assert_eq!(board.settle(&pending, result), Settlement::Confirmed);
    assert_eq!(column_ids(&board, TaskStatus::InProgress), vec!["t1"]);
    assert!(column_ids(&board, TaskStatus::Todo).is_empty());
    assert_eq!(gateway.status_of(&id("t1")), Some(TaskStatus::InProgress));
}

#[tokio::test]
async fn network_failure_rolls_back_and_notifies() {
    let mut board = single_task_board();
    let gateway = Arc::new(LoopbackGateway::new(vec![
        Task::new("t1", "Draft invoice", TaskStatus::Todo).unwrap(),
    ]));
    gateway.set_offline(true);
    let (cmd_tx, mut evt_rx) = spawn_gateway_worker(Arc::clone(&gateway), 16);

    let pending = drag_to(&mut board, "t1", TaskStatus::InProgress).expect("status change");
    cmd_tx.send(GatewayCommand::Transition(pending)).await.unwrap();

    let (pending, result) = next_settled(&mut evt_rx).await;
    assert!(matches!(result, Err(TransitionError::Network(_))));
    let Settlement::RolledBack(notice) = board.settle(&pending, result) else {
        panic!("expected rollback");
    };
    assert_eq!(notice.task_id, id("t1"));
    assert_eq!(notice.kind, NoticeKind::Network);
    assert!(notice.message().contains("Draft invoice"));

    assert_eq!(column_ids(&board, TaskStatus::Todo), vec!["t1"]);
    assert!(column_ids(&board, TaskStatus::InProgress).is_empty());
    assert_eq!(board.notices().latest().map(|n| n.id), Some(notice.id));
}

#[test]
fn every_failure_kind_restores_the_source_status() {
    let failures = [
        TransitionError::Network("reset".to_string()),
        TransitionError::Conflict {
            current: Some(TaskStatus::Done),
        },
        TransitionError::Validation("task is locked".to_string()),
    ];
    for failure in failures {
        let mut board = single_task_board();
        let pending = drag_to(&mut board, "t1", TaskStatus::Review).expect("status change");
        let settlement = board.settle(&pending, Err(failure.clone()));
        assert!(
            matches!(settlement, Settlement::RolledBack(_)),
            "{failure:?} did not roll back"
        );
        assert_eq!(
            board.store().status_of(&id("t1")),
            Some(TaskStatus::Todo),
            "{failure:?} left the task moved"
        );
        assert_eq!(column_ids(&board, TaskStatus::Todo), vec!["t1"]);
    }
}

// ---------------------------------------------------------------------------
// Overlapping moves
// ---------------------------------------------------------------------------

#[tokio::test]
async fn older_conflict_does_not_undo_newer_move() {
    let mut board = single_task_board();
    let gateway = Arc::new(ParkingGateway::default());
    let (cmd_tx, mut evt_rx) = spawn_gateway_worker(Arc::clone(&gateway), 16);

    let first = drag_to(&mut board, "t1", TaskStatus::Review).expect("first move");
    cmd_tx.send(GatewayCommand::Transition(first)).await.unwrap();
    let second = drag_to(&mut board, "t1", TaskStatus::Done).expect("second move");
    assert_eq!(second.from, TaskStatus::Review);
    cmd_tx.send(GatewayCommand::Transition(second)).await.unwrap();
    gateway.wait_for_calls(2).await;

    let answered = gateway.resolve(
        TaskStatus::Review,
        Err(TransitionError::Conflict {
            current: Some(TaskStatus::Todo),
        }),
    );
    assert_eq!(answered, id("t1"));
    let (pending, result) = next_settled(&mut evt_rx).await;
    assert_eq!(pending.to, TaskStatus::Review);
    assert_eq!(board.settle(&pending, result), Settlement::Superseded);
    assert_eq!(column_ids(&board, TaskStatus::Done), vec!["t1"]);
    assert!(board.notices().is_empty());

    gateway.resolve(TaskStatus::Done, Ok(()));
    let (pending, result) = next_settled(&mut evt_rx).await;
    assert_eq!(board.settle(&pending, result), Settlement::Confirmed);
    assert_eq!(column_ids(&board, TaskStatus::Done), vec!["t1"]);
}

#[tokio::test]
async fn older_network_failure_keeps_latest_status() {
    let mut board = single_task_board();
    let gateway = Arc::new(ParkingGateway::default());
    let (cmd_tx, mut evt_rx) = spawn_gateway_worker(Arc::clone(&gateway), 16);

    let to_b = drag_to(&mut board, "t1", TaskStatus::InProgress).expect("move to B");
    cmd_tx.send(GatewayCommand::Transition(to_b)).await.unwrap();
    let to_c = drag_to(&mut board, "t1", TaskStatus::Review).expect("move to C");
    cmd_tx.send(GatewayCommand::Transition(to_c)).await.unwrap();
    gateway.wait_for_calls(2).await;

    gateway.resolve(
        TaskStatus::InProgress,
        Err(TransitionError::Network("timeout".to_string())),
    );
    let (pending, result) = next_settled(&mut evt_rx).await;
    assert_eq!(board.settle(&pending, result), Settlement::Superseded);
    assert_eq!(board.store().status_of(&id("t1")), Some(TaskStatus::Review));
}

#[tokio::test]
async fn newer_failure_rolls_back_to_its_own_source() {
    let mut board = single_task_board();
    let gateway = Arc::new(ParkingGateway::default());
    let (cmd_tx, mut evt_rx) = spawn_gateway_worker(Arc::clone(&gateway), 16);

    let first = drag_to(&mut board, "t1", TaskStatus::InProgress).expect("first move");
    cmd_tx.send(GatewayCommand::Transition(first)).await.unwrap();
    let second = drag_to(&mut board, "t1", TaskStatus::Done).expect("second move");
    cmd_tx.send(GatewayCommand::Transition(second)).await.unwrap();
    gateway.wait_for_calls(2).await;

    gateway.resolve(
        TaskStatus::Done,
        Err(TransitionError::Validation("needs review first".to_string())),
    );
    let (pending, result) = next_settled(&mut evt_rx).await;
    assert!(matches!(board.settle(&pending, result), Settlement::RolledBack(_)));
    assert_eq!(
        board.store().status_of(&id("t1")),
        Some(TaskStatus::InProgress)
    );

    gateway.resolve(TaskStatus::InProgress, Ok(()));
    let (pending, result) = next_settled(&mut evt_rx).await;
    assert_eq!(board.settle(&pending, result), Settlement::Confirmed);
    assert_eq!(
        board.store().status_of(&id("t1")),
        Some(TaskStatus::InProgress)
    );
}

#[tokio::test]
async fn refresh_supersedes_in_flight_failure() {
    let mut board = single_task_board();
    let gateway = Arc::new(ParkingGateway::default());
    let (cmd_tx, mut evt_rx) = spawn_gateway_worker(Arc::clone(&gateway), 16);

    let pending = drag_to(&mut board, "t1", TaskStatus::Review).expect("status change");
    cmd_tx.send(GatewayCommand::Transition(pending)).await.unwrap();
    gateway.wait_for_calls(1).await;

    board.refresh(vec![
        Task::new("t1", "Draft invoice", TaskStatus::Review).unwrap(),
    ]);
    gateway.resolve(
        TaskStatus::Review,
        Err(TransitionError::Network("late".to_string())),
    );
    let (pending, result) = next_settled(&mut evt_rx).await;
    assert_eq!(board.settle(&pending, result), Settlement::Superseded);
    assert_eq!(board.store().status_of(&id("t1")), Some(TaskStatus::Review));
    assert_eq!(gateway.parked.lock().len(), 0);
}

// ---------------------------------------------------------------------------
// Conflict recovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn conflict_rolls_back_then_refresh_shows_backend_state() {
    let mut board = single_task_board();
    let gateway = Arc::new(LoopbackGateway::new(vec![
        Task::new("t1", "Draft invoice", TaskStatus::Todo).unwrap(),
    ]));
    gateway.set_status(&id("t1"), TaskStatus::Done);
    let (cmd_tx, mut evt_rx) = spawn_gateway_worker(Arc::clone(&gateway), 16);

    let pending = drag_to(&mut board, "t1", TaskStatus::Review).expect("status change");
    cmd_tx.send(GatewayCommand::Transition(pending)).await.unwrap();
    let (pending, result) = next_settled(&mut evt_rx).await;
    assert_eq!(
        result,
        Err(TransitionError::Conflict {
            current: Some(TaskStatus::Done)
        })
    );
    let Settlement::RolledBack(notice) = board.settle(&pending, result) else {
        panic!("expected rollback");
    };
    assert_eq!(
        notice.kind,
        NoticeKind::Conflict {
            current: Some(TaskStatus::Done)
        }
    );
    assert_eq!(board.store().status_of(&id("t1")), Some(TaskStatus::Todo));

    assert!(board.take_refresh_request());
    cmd_tx.send(GatewayCommand::Refresh).await.unwrap();
    let tasks = next_refreshed(&mut evt_rx).await;
    board.refresh(tasks);
    assert_eq!(column_ids(&board, TaskStatus::Done), vec!["t1"]);
    assert!(!board.take_refresh_request());
}

// ---------------------------------------------------------------------------
// No-op guard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn drop_on_own_column_changes_nothing() {
    let mut board = single_task_board();
    let gateway = Arc::new(LoopbackGateway::new(vec![
        Task::new("t1", "Draft invoice", TaskStatus::Todo).unwrap(),
    ]));
    let (cmd_tx, _evt_rx) = spawn_gateway_worker(Arc::clone(&gateway), 16);
    let before = board.store().version(&id("t1"));

    let pending = drag_to(&mut board, "t1", TaskStatus::Todo);
    assert!(pending.is_none());
    if let Some(pending) = pending {
        cmd_tx.send(GatewayCommand::Transition(pending)).await.unwrap();
    }

    assert_eq!(board.store().version(&id("t1")), before);
    assert_eq!(column_ids(&board, TaskStatus::Todo), vec!["t1"]);
    assert!(!board.drag().is_dragging());
    assert_eq!(gateway.call_count(), 0);
}

#[test]
fn drop_on_itself_or_outside_changes_nothing() {
    let mut board = single_task_board();
    let before = board.store().version(&id("t1"));

    board.handle_drag(DragEvent::Start(id("t1"))).unwrap();
    let on_self = board
        .handle_drag(DragEvent::Drop(Some(DropTarget::Task(id("t1")))))
        .unwrap();
    assert!(on_self.is_none());

    board.handle_drag(DragEvent::Start(id("t1"))).unwrap();
    board.handle_drag(DragEvent::Over(None)).unwrap();
    let outside = board.handle_drag(DragEvent::Drop(None)).unwrap();
    assert!(outside.is_none());

    assert_eq!(board.store().version(&id("t1")), before);
    assert_eq!(board.store().status_of(&id("t1")), Some(TaskStatus::Todo));
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[test]
fn search_limits_board_to_matching_titles() {
    let store = TaskStore::from_tasks(vec![
        Task::new("task1", "Draft invoice", TaskStatus::Todo).unwrap(),
        Task::new("task2", "Call client", TaskStatus::Todo).unwrap(),
    ])
    .unwrap();
    let board = TaskBoard::new(store, 8);
    let projected = board.project("invoice");

    let todo: Vec<_> = projected
        .column(TaskStatus::Todo)
        .iter()
        .map(|t| t.id.to_string())
        .collect();
    assert_eq!(todo, vec!["task1"]);
    for status in TaskStatus::ALL.into_iter().skip(1) {
        assert!(projected.column(status).is_empty());
    }
}

#[test]
fn card_dropped_on_a_card_in_another_column_moves_there() {
    let store = TaskStore::from_tasks(vec![
        Task::new("t1", "Draft invoice", TaskStatus::Todo).unwrap(),
        Task::new("t2", "Review lease", TaskStatus::Review).unwrap(),
    ])
    .unwrap();
    let mut board = TaskBoard::new(store, 8);

    board.handle_drag(DragEvent::Start(id("t1"))).unwrap();
    board
        .handle_drag(DragEvent::Over(Some(TaskStatus::Review)))
        .unwrap();
    let pending = board
        .handle_drag(DragEvent::Drop(Some(DropTarget::Task(id("t2")))))
        .unwrap()
        .expect("status change");
    assert_eq!(pending.from, TaskStatus::Todo);
    assert_eq!(pending.to, TaskStatus::Review);
    assert_eq!(
        column_ids(&board, TaskStatus::Review),
        vec!["t2".to_string(), "t1".to_string()]
    );
}
