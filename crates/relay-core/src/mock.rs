use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::SendError;
use crate::events::OutboundEvent;
use crate::handle::ConnectionHandle;
use crate::ids::ConnectionId;

/// In-memory handle that records every event sent to it.
pub struct RecordingHandle {
    id: ConnectionId,
    open: AtomicBool,
    sent: Mutex<Vec<OutboundEvent>>,
}

impl RecordingHandle {
    pub fn new() -> Arc<Self> {
        Self::with_id(ConnectionId::new())
    }

    pub fn with_id(id: ConnectionId) -> Arc<Self> {
        Arc::new(Self {
            id,
            open: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Simulate the transport closing the connection.
    pub fn close(&self) {
        self.open.store(false, Ordering::Relaxed);
    }

    pub fn sent(&self) -> Vec<OutboundEvent> {
        self.sent.lock().clone()
    }

    pub fn take_sent(&self) -> Vec<OutboundEvent> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Coerce to the trait object the registry stores.
    pub fn as_dyn(self: &Arc<Self>) -> Arc<dyn ConnectionHandle> {
        Arc::clone(self) as Arc<dyn ConnectionHandle>
    }
}

impl ConnectionHandle for RecordingHandle {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn send(&self, event: &OutboundEvent) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::Closed);
        }
        self.sent.lock().push(event.clone());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }
}
