use crate::errors::SendError;
use crate::events::OutboundEvent;
use crate::ids::ConnectionId;

/// Capability to push one outbound event to one live connection.
///
/// The transport owns implementors. The registry only ever holds a weak
/// reference, so a closed connection can never be kept alive by routing.
pub trait ConnectionHandle: Send + Sync {
    fn id(&self) -> &ConnectionId;

    /// Queue `event` for delivery. Never blocks on I/O.
    fn send(&self, event: &OutboundEvent) -> Result<(), SendError>;

    fn is_open(&self) -> bool;
}
