//! `RemoteGateway` against an in-process `taskboard-server`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use taskboard::gateway::remote::RemoteGateway;
use taskboard::gateway::{StatusGateway, TransitionError};
use taskboard::optimistic::{Settlement, TaskBoard};
use taskboard::store::TaskStore;
use taskboard::sync::{GatewayCommand, GatewayEvent, spawn_gateway_worker};
use taskboard_proto::task::{Task, TaskId, TaskStatus};
use taskboard_server::server::{ServerState, start_server_with_state};
use taskboard_server::store::TaskRecord;

fn seed() -> Vec<TaskRecord> {
    vec![
        Task::new("t1", "Draft invoice", TaskStatus::Todo).unwrap().into(),
        Task::new("t2", "Call client", TaskStatus::InProgress).unwrap().into(),
        TaskRecord {
            task: Task::new("t3", "Archive matter", TaskStatus::Done).unwrap(),
            locked: true,
        },
    ]
}

async fn start() -> (Arc<ServerState>, String, tokio::task::JoinHandle<()>) {
    let state = Arc::new(ServerState::new(seed()));
    let (addr, handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .unwrap();
    (state, format!("ws://{addr}/ws"), handle)
}

async fn connect(url: &str) -> RemoteGateway {
    RemoteGateway::connect(url, Duration::from_secs(2), Duration::from_secs(2))
        .await
        .unwrap()
}

fn id(s: &str) -> TaskId {
    TaskId::new(s)
}

#[tokio::test]
async fn fetch_returns_server_tasks_in_order() {
    let (_state, url, _handle) = start().await;
    let gateway = connect(&url).await;

    let tasks = gateway.fetch_tasks().await.unwrap();
    let ids: Vec<_> = tasks.iter().map(|t| t.id.to_string()).collect();
    assert_eq!(ids, vec!["t1", "t2", "t3"]);
    assert!(gateway.describe().starts_with("Online: "));
}

#[tokio::test]
async fn applied_transition_persists_on_server() {
    let (state, url, _handle) = start().await;
    let gateway = connect(&url).await;

    gateway
        .request_transition(&id("t1"), TaskStatus::Todo, TaskStatus::Review)
        .await
        .unwrap();
    assert_eq!(state.table.status_of(&id("t1")).await, Some(TaskStatus::Review));
}

#[tokio::test]
async fn concurrent_change_is_reported_as_conflict() {
    let (state, url, _handle) = start().await;
    let gateway = connect(&url).await;
    assert!(state.table.set_status(&id("t1"), TaskStatus::Done).await);

    let err = gateway
        .request_transition(&id("t1"), TaskStatus::Todo, TaskStatus::InProgress)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransitionError::Conflict {
            current: Some(TaskStatus::Done)
        }
    );
    assert_eq!(state.table.status_of(&id("t1")).await, Some(TaskStatus::Done));
}

#[tokio::test]
async fn locked_task_is_rejected() {
    let (state, url, _handle) = start().await;
    let gateway = connect(&url).await;

    let err = gateway
        .request_transition(&id("t3"), TaskStatus::Done, TaskStatus::Todo)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::Validation(_)));
    assert_eq!(state.table.status_of(&id("t3")).await, Some(TaskStatus::Done));
}

#[tokio::test]
async fn unknown_task_is_rejected() {
    let (_state, url, _handle) = start().await;
    let gateway = connect(&url).await;

    let err = gateway
        .request_transition(&id("nope"), TaskStatus::Todo, TaskStatus::Done)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::Validation(_)));
}

#[tokio::test]
async fn two_clients_see_each_others_changes() {
    let (_state, url, _handle) = start().await;
    let alice = connect(&url).await;
    let bob = connect(&url).await;

    alice
        .request_transition(&id("t2"), TaskStatus::InProgress, TaskStatus::Review)
        .await
        .unwrap();
    let err = bob
        .request_transition(&id("t2"), TaskStatus::InProgress, TaskStatus::Done)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransitionError::Conflict {
            current: Some(TaskStatus::Review)
        }
    );

    let tasks = bob.fetch_tasks().await.unwrap();
    let t2 = tasks.iter().find(|t| t.id == id("t2")).unwrap();
    assert_eq!(t2.status, TaskStatus::Review);
}

#[tokio::test]
async fn unreachable_server_fails_to_connect() {
    let result = RemoteGateway::connect(
        "ws://127.0.0.1:1/ws",
        Duration::from_secs(1),
        Duration::from_secs(1),
    )
    .await;
    assert!(matches!(result, Err(TransitionError::Network(_))));
}

#[tokio::test]
async fn board_rolls_back_when_server_rejects() {
    let (_state, url, _handle) = start().await;
    let gateway = Arc::new(connect(&url).await);
    let tasks = gateway.fetch_tasks().await.unwrap();
    let mut board = TaskBoard::new(TaskStore::from_tasks(tasks).unwrap(), 8);
    let (cmd_tx, mut evt_rx) = spawn_gateway_worker(Arc::clone(&gateway), 16);

    let change = taskboard::drag::StatusChange {
        task_id: id("t3"),
        from: TaskStatus::Done,
        to: TaskStatus::Review,
    };
    let taskboard::optimistic::BeginOutcome::Pending(pending) = board.begin(change) else {
        panic!("expected pending transition");
    };
    assert_eq!(board.store().status_of(&id("t3")), Some(TaskStatus::Review));
    cmd_tx.send(GatewayCommand::Transition(pending)).await.unwrap();

    let (pending, result) = loop {
        let event = tokio::time::timeout(Duration::from_secs(2), evt_rx.recv())
            .await
            .unwrap()
            .unwrap();
        if let GatewayEvent::Settled { pending, result } = event {
            break (pending, result);
        }
    };
    let Settlement::RolledBack(notice) = board.settle(&pending, result) else {
        panic!("expected rollback");
    };
    assert!(notice.message().contains("Archive matter"));
    assert_eq!(board.store().status_of(&id("t3")), Some(TaskStatus::Done));
}
