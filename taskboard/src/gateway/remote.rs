//! WebSocket gateway to `taskboard-server`.
//!
//! Each request carries a fresh [`RequestId`]; a background reader task
//! routes replies back to the waiting caller through a oneshot channel.
//! Several transitions may be in flight at once over one connection.
//! Timeouts, connection loss and server-side protocol errors all surface
//! as [`TransitionError::Network`] so the board rolls back.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use taskboard_proto::codec;
use taskboard_proto::task::{Task, TaskId, TaskStatus};
use taskboard_proto::transition::{BoardMessage, RequestId, TransitionRequest};

use super::{StatusGateway, TransitionError, outcome_result};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Write half of the WebSocket connection.
type WsSender = futures_util::stream::SplitSink<WsStream, Message>;

/// Read half of the WebSocket connection.
type WsReader = futures_util::stream::SplitStream<WsStream>;

/// Requests awaiting a reply, keyed by request id.
type PendingReplies = Arc<Mutex<HashMap<RequestId, oneshot::Sender<BoardMessage>>>>;

/// [`StatusGateway`] backed by a WebSocket connection to the task server.
pub struct RemoteGateway {
    url: String,
    ws_sender: tokio::sync::Mutex<WsSender>,
    pending: PendingReplies,
    connected: Arc<AtomicBool>,
    request_timeout: Duration,
    _reader_handle: tokio::task::JoinHandle<()>,
}

impl RemoteGateway {
    /// Connects to the task server at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Network`] if the connection cannot be
    /// established within `connect_timeout`.
    pub async fn connect(
        url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, TransitionError> {
        let (ws_stream, _response) = tokio::time::timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                tracing::warn!(url, "task server connect timed out");
                TransitionError::Network("connect timed out".to_string())
            })?
            .map_err(|e| {
                tracing::warn!(url, err = %e, "task server connect failed");
                map_ws_connect_error(e)
            })?;

        let (ws_sender, ws_reader) = ws_stream.split();
        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));
        let reader_handle = tokio::spawn(reader_loop(
            ws_reader,
            Arc::clone(&pending),
            Arc::clone(&connected),
        ));
        tracing::info!(url, "connected to task server");

        Ok(Self {
            url: url.to_string(),
            ws_sender: tokio::sync::Mutex::new(ws_sender),
            pending,
            connected,
            request_timeout,
            _reader_handle: reader_handle,
        })
    }

    /// Server URL this gateway talks to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the connection is still open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Sends `msg` and waits for the reply carrying the same request id.
    async fn call(&self, request_id: RequestId, msg: &BoardMessage) -> Result<BoardMessage, TransitionError> {
        if !self.is_connected() {
            return Err(TransitionError::Network("connection closed".to_string()));
        }
        let bytes = codec::encode(msg).map_err(|e| TransitionError::Network(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id, tx);

        let sent = self
            .ws_sender
            .lock()
            .await
            .send(Message::Binary(bytes.into()))
            .await;
        if let Err(e) = sent {
            tracing::warn!(%request_id, err = %e, "task server send failed");
            self.pending.lock().remove(&request_id);
            self.connected.store(false, Ordering::Relaxed);
            return Err(TransitionError::Network("connection closed".to_string()));
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(TransitionError::Network("connection closed".to_string())),
            Err(_) => {
                self.pending.lock().remove(&request_id);
                tracing::warn!(%request_id, "task server request timed out");
                Err(TransitionError::Timeout)
            }
        }
    }
}

impl StatusGateway for RemoteGateway {
    async fn request_transition(
        &self,
        task_id: &TaskId,
        old: TaskStatus,
        new: TaskStatus,
    ) -> Result<(), TransitionError> {
        assert_ne!(old, new, "gateway called for a no-op transition");
        let request_id = RequestId::new();
        let msg = BoardMessage::Transition(TransitionRequest {
            request_id,
            task_id: task_id.clone(),
            expected: old,
            target: new,
        });
        tracing::debug!(%request_id, %task_id, from = %old, to = %new, "sending transition");
        match self.call(request_id, &msg).await? {
            BoardMessage::TransitionReply { outcome, .. } => outcome_result(outcome),
            BoardMessage::Error { reason, .. } => {
                Err(TransitionError::Network(format!("server error: {reason}")))
            }
            other => {
                tracing::warn!(?other, "unexpected reply to transition");
                Err(TransitionError::Network("unexpected reply".to_string()))
            }
        }
    }

    async fn fetch_tasks(&self) -> Result<Vec<Task>, TransitionError> {
        let request_id = RequestId::new();
        match self
            .call(request_id, &BoardMessage::FetchBoard { request_id })
            .await?
        {
            BoardMessage::Board { tasks, .. } => Ok(tasks),
            BoardMessage::Error { reason, .. } => {
                Err(TransitionError::Network(format!("server error: {reason}")))
            }
            other => {
                tracing::warn!(?other, "unexpected reply to board fetch");
                Err(TransitionError::Network("unexpected reply".to_string()))
            }
        }
    }

    fn describe(&self) -> String {
        if self.is_connected() {
            format!("Online: {}", self.url)
        } else {
            "Disconnected".to_string()
        }
    }
}

/// Routes incoming replies to their waiting callers.
///
/// Malformed frames and replies nobody waits for are logged and skipped.
/// On exit every waiter is dropped, which fails its call with a network
/// error.
async fn reader_loop(mut ws_reader: WsReader, pending: PendingReplies, connected: Arc<AtomicBool>) {
    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Binary(data)) => match codec::decode(&data) {
                Ok(msg) => {
                    let waiter = msg.request_id().and_then(|id| pending.lock().remove(&id));
                    match (waiter, msg) {
                        (Some(tx), msg) => {
                            // Caller may have timed out already.
                            let _ = tx.send(msg);
                        }
                        (None, BoardMessage::Error { reason, .. }) => {
                            tracing::warn!(reason = %reason, "task server error");
                        }
                        (None, other) => {
                            tracing::debug!(?other, "reply with no waiting request");
                        }
                    }
                }
                Err(e) => tracing::warn!(err = %e, "malformed frame from task server, skipping"),
            },
            Ok(Message::Close(_)) => {
                tracing::info!("task server closed the connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(err = %e, "task server read error");
                break;
            }
        }
    }
    connected.store(false, Ordering::Relaxed);
    pending.lock().clear();
    tracing::info!("task server reader exiting");
}

fn map_ws_connect_error(err: tokio_tungstenite::tungstenite::Error) -> TransitionError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) if io_err.kind() == std::io::ErrorKind::ConnectionRefused => {
            TransitionError::Network("task server unreachable".to_string())
        }
        WsError::Http(response) => TransitionError::Network(format!(
            "task server HTTP error: status {}",
            response.status()
        )),
        other => TransitionError::Network(format!("task server connection error: {other}")),
    }
}
