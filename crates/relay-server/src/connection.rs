use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use relay_core::events::SessionEvent;
use relay_core::{ConnectionHandle, ConnectionId, ConnectionRegistry, Credentials, OutboundEvent, SendError};
use tokio::sync::{mpsc, Notify};

use crate::coordinator::SessionCoordinator;
use crate::protocol;

/// One live WebSocket connection. Owned by the [`ConnectionTable`]; the
/// registry only sees it through a weak [`ConnectionHandle`].
pub struct Connection {
    id: ConnectionId,
    credentials: Credentials,
    tx: mpsc::Sender<String>,
    connected: AtomicBool,
    last_pong: AtomicU64,
    close_signal: Notify,
}

impl Connection {
    fn new(id: ConnectionId, credentials: Credentials, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            credentials,
            tx,
            connected: AtomicBool::new(true),
            last_pong: AtomicU64::new(now_secs()),
            close_signal: Notify::new(),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    pub fn is_alive(&self, timeout: Duration) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < timeout.as_secs()
    }

    /// Stop accepting sends and ask the writer to shut the socket.
    pub fn close(&self) {
        self.connected.store(false, Ordering::Relaxed);
        self.close_signal.notify_one();
    }
}

impl ConnectionHandle for Connection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn send(&self, event: &OutboundEvent) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::Closed);
        }
        let json = event.to_json().map_err(|e| SendError::Encode(e.to_string()))?;
        match self.tx.try_send(json) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(
                    conn_id = %self.id,
                    msg_len = msg.len(),
                    "Send queue full, dropping message"
                );
                Err(SendError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    fn is_open(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// All open connections, keyed by transport id. Registry entries are weak,
/// so a connection removed here and from its socket tasks is gone.
pub struct ConnectionTable {
    connections: DashMap<ConnectionId, Arc<Connection>>,
    max_send_queue: usize,
}

impl ConnectionTable {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            connections: DashMap::new(),
            max_send_queue,
        }
    }

    /// Register a new connection and return it with its outbound queue.
    pub fn register(&self, credentials: Credentials) -> (Arc<Connection>, mpsc::Receiver<String>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let conn = Arc::new(Connection::new(id.clone(), credentials, tx));
        self.connections.insert(id, Arc::clone(&conn));
        (conn, rx)
    }

    /// Remove a connection by ID, marking it closed.
    pub fn unregister(&self, id: &ConnectionId) {
        if let Some((_, conn)) = self.connections.remove(id) {
            conn.connected.store(false, Ordering::Relaxed);
        }
    }

    /// Number of open connections.
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Close connections that haven't responded to pings within `timeout`.
    /// Their socket tasks then run the normal disconnect path.
    pub fn close_dead_connections(&self, timeout: Duration) -> usize {
        let dead: Vec<Arc<Connection>> = self
            .connections
            .iter()
            .filter(|entry| !entry.value().is_alive(timeout))
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for conn in &dead {
            conn.close();
            tracing::info!(conn_id = %conn.id, "Closing unresponsive connection");
        }
        dead.len()
    }
}

/// Drive one WebSocket connection from connect to disconnect.
///
/// Client frames are decoded and dispatched in arrival order on the reader
/// task; outbound events flow through the bounded queue to the writer task,
/// which also sends heartbeat pings.
pub async fn handle_ws_connection(
    socket: WebSocket,
    conn: Arc<Connection>,
    mut rx: mpsc::Receiver<String>,
    table: Arc<ConnectionTable>,
    coordinator: Arc<SessionCoordinator>,
    heartbeat_interval: Duration,
) {
    let handle: Arc<dyn ConnectionHandle> = Arc::clone(&conn) as Arc<dyn ConnectionHandle>;
    coordinator.dispatch(&handle, conn.credentials(), SessionEvent::Connected);

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer task: forward queued events to the WebSocket + periodic ping
    let writer_conn = Arc::clone(&conn);
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat_interval);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(conn_id = %writer_conn.id, "Sent ping");
                }
                _ = writer_conn.close_signal.notified() => {
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    break;
                }
            }
        }
        writer_conn.connected.store(false, Ordering::Relaxed);
    });

    // Reader task: decode client frames and dispatch them, track pongs
    let reader_conn = Arc::clone(&conn);
    let reader_handle = Arc::clone(&handle);
    let reader_coordinator = Arc::clone(&coordinator);
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => match protocol::decode(text.as_str()) {
                    Ok(event) => {
                        reader_coordinator.dispatch(&reader_handle, reader_conn.credentials(), event);
                    }
                    Err(e) => reader_coordinator.report_malformed(&reader_handle, &e),
                },
                WsMessage::Pong(_) => reader_conn.record_pong(),
                WsMessage::Close(_) => break,
                WsMessage::Ping(_) => {} // axum answers pings itself
                WsMessage::Binary(_) => {
                    tracing::debug!(conn_id = %reader_conn.id, "Ignoring binary frame");
                }
            }
        }
    });

    let writer_abort = writer.abort_handle();
    let reader_abort = reader.abort_handle();
    tokio::select! {
        _ = writer => reader_abort.abort(),
        _ = reader => writer_abort.abort(),
    }

    conn.connected.store(false, Ordering::Relaxed);
    coordinator.dispatch(&handle, conn.credentials(), SessionEvent::Disconnected);
    table.unregister(conn.id());
}

/// Start a background task that periodically closes unresponsive connections
/// and drops registry bindings whose connection is gone.
pub fn start_cleanup_task(
    table: Arc<ConnectionTable>,
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    timeout: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let closed = table.close_dead_connections(timeout);
            if closed > 0 {
                tracing::info!(closed = closed, "Dead connection cleanup");
            }
            let pruned = registry.prune();
            if pruned > 0 {
                tracing::info!(pruned = pruned, "Pruned stale identity bindings");
            }
        }
    })
}
