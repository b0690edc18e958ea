//! Gateway worker bridging the UI loop and the async gateway.
//!
//! The UI loop owns the [`TaskBoard`](crate::optimistic::TaskBoard) and
//! never awaits. It sends [`GatewayCommand`]s and drains [`GatewayEvent`]s
//! on every tick:
//!
//! ```text
//! UI loop  ─── GatewayCommand ──▶  worker ──▶ one tokio task per call
//!          ◀── GatewayEvent ────────────────┘
//! ```
//!
//! Calls for different tasks run concurrently. Calls for the same task are
//! chained, so the backend sees them in the order the board emitted them.
//! Calls are never cancelled; a superseded result is discarded by the
//! board's version check when it is applied.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use taskboard_proto::task::{Task, TaskId};

use crate::gateway::{StatusGateway, TransitionError};
use crate::optimistic::PendingTransition;

/// Requests from the UI loop.
#[derive(Debug)]
pub enum GatewayCommand {
    /// Persist an optimistically applied status change.
    Transition(PendingTransition),
    /// Fetch the full board.
    Refresh,
    /// Stop accepting commands.
    Shutdown,
}

/// Results delivered back to the UI loop.
#[derive(Debug)]
pub enum GatewayEvent {
    /// A transition call finished.
    Settled {
        pending: PendingTransition,
        result: Result<(), TransitionError>,
    },
    /// A board fetch finished.
    Refreshed(Result<Vec<Task>, TransitionError>),
    /// Connection description for the status bar.
    ConnectionStatus(String),
}

/// Spawns the worker and returns its command and event channels.
///
/// Must be called from within a tokio runtime.
pub fn spawn_gateway_worker<G>(
    gateway: Arc<G>,
    capacity: usize,
) -> (mpsc::Sender<GatewayCommand>, mpsc::Receiver<GatewayEvent>)
where
    G: StatusGateway + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(capacity.max(1));
    let (evt_tx, evt_rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(command_handler(gateway, cmd_rx, evt_tx));
    (cmd_tx, evt_rx)
}

async fn command_handler<G>(
    gateway: Arc<G>,
    mut cmd_rx: mpsc::Receiver<GatewayCommand>,
    evt_tx: mpsc::Sender<GatewayEvent>,
) where
    G: StatusGateway + 'static,
{
    let _ = evt_tx
        .send(GatewayEvent::ConnectionStatus(gateway.describe()))
        .await;

    // Last call spawned per task.
    let mut in_flight: HashMap<TaskId, JoinHandle<()>> = HashMap::new();

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            GatewayCommand::Transition(pending) => {
                in_flight.retain(|_, call| !call.is_finished());
                let previous = in_flight.remove(&pending.task_id);
                let task_id = pending.task_id.clone();
                let gateway = Arc::clone(&gateway);
                let evt_tx = evt_tx.clone();
                let call = tokio::spawn(async move {
                    if let Some(previous) = previous {
                        let _ = previous.await;
                    }
                    let result = gateway
                        .request_transition(&pending.task_id, pending.from, pending.to)
                        .await;
                    tracing::debug!(ticket = pending.ticket, ok = result.is_ok(), "transition call finished");
                    let status = gateway.describe();
                    // UI gone means nothing left to update.
                    let _ = evt_tx.send(GatewayEvent::Settled { pending, result }).await;
                    let _ = evt_tx.send(GatewayEvent::ConnectionStatus(status)).await;
                });
                in_flight.insert(task_id, call);
            }
            GatewayCommand::Refresh => {
                let gateway = Arc::clone(&gateway);
                let evt_tx = evt_tx.clone();
                tokio::spawn(async move {
                    let result = gateway.fetch_tasks().await;
                    if let Err(e) = &result {
                        tracing::warn!(err = %e, "board refresh failed");
                    }
                    let status = gateway.describe();
                    let _ = evt_tx.send(GatewayEvent::Refreshed(result)).await;
                    let _ = evt_tx.send(GatewayEvent::ConnectionStatus(status)).await;
                });
            }
            GatewayCommand::Shutdown => {
                tracing::info!("gateway worker shutting down");
                break;
            }
        }
    }
}
