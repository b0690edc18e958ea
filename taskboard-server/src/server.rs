//! WebSocket endpoint serving the task table.
//!
//! Each connection gets a writer task fed by an unbounded channel, so
//! replies can be produced while the reader keeps consuming requests.
//! Every request is answered on the connection it arrived on.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use taskboard_proto::codec;
use taskboard_proto::transition::{BoardMessage, TransitionRequest};
use tokio::sync::mpsc;

use crate::store::{TaskRecord, TaskTable};

/// Default maximum accepted frame size in bytes (64 KB).
const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Shared server state.
pub struct ServerState {
    /// Authoritative tasks.
    pub table: TaskTable,
    max_frame_size: usize,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ServerState {
    /// Creates a state over `records` with the default frame size limit.
    #[must_use]
    pub fn new(records: Vec<TaskRecord>) -> Self {
        Self::with_config(records, DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a state with a custom frame size limit.
    #[must_use]
    pub fn with_config(records: Vec<TaskRecord>, max_frame_size: usize) -> Self {
        Self {
            table: TaskTable::new(records),
            max_frame_size,
        }
    }
}

/// Handles an upgraded WebSocket connection for a single client.
pub async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!("WebSocket write failed");
                break;
            }
        }
    });

    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    if let Some(reply) = handle_frame(&data, &reader_state).await
                        && let Ok(bytes) = codec::encode(&reply)
                        && tx.send(Message::Binary(bytes.into())).is_err()
                    {
                        break;
                    }
                }
                Message::Close(_) => {
                    tracing::info!("client closed connection");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => write_task.abort(),
        _ = &mut write_task => read_task.abort(),
    }
    tracing::info!("client disconnected");
}

/// Decodes one frame and produces the reply, if any.
///
/// Oversized frames are answered with an error; undecodable frames are
/// logged and skipped.
pub async fn handle_frame(data: &[u8], state: &ServerState) -> Option<BoardMessage> {
    if data.len() > state.max_frame_size {
        tracing::warn!(size = data.len(), max = state.max_frame_size, "frame exceeds size limit");
        return Some(BoardMessage::Error {
            request_id: None,
            reason: format!(
                "frame too large: {} bytes (max {})",
                data.len(),
                state.max_frame_size
            ),
        });
    }
    let msg = match codec::decode(data) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "failed to decode frame");
            return None;
        }
    };

    match msg {
        BoardMessage::FetchBoard { request_id } => {
            let tasks = state.table.snapshot().await;
            tracing::debug!(%request_id, count = tasks.len(), "board fetched");
            Some(BoardMessage::Board { request_id, tasks })
        }
        BoardMessage::Transition(TransitionRequest {
            request_id,
            task_id,
            expected,
            target,
        }) => {
            let outcome = state.table.transition(&task_id, expected, target).await;
            tracing::info!(
                %request_id,
                task_id = %task_id,
                from = %expected,
                to = %target,
                ?outcome,
                "transition decided"
            );
            Some(BoardMessage::TransitionReply {
                request_id,
                outcome,
            })
        }
        other => {
            tracing::warn!(msg = ?other, "unexpected message type from client");
            Some(BoardMessage::Error {
                request_id: other.request_id(),
                reason: "unexpected message type".to_string(),
            })
        }
    }
}

/// Starts the server on `addr` with an empty table.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(ServerState::default())).await
}

/// Starts the server with a pre-built [`ServerState`] and returns the bound
/// address and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<ServerState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "task server error");
        }
    });

    Ok((bound_addr, handle))
}

async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<ServerState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
