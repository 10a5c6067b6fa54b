//! Translates connection lifecycle and client events into registry
//! operations and outbound sends.
//!
//! The coordinator keeps no per-connection state. Identity is re-derived from
//! credentials on every event, so the registry is the only mutable state.

use std::sync::Arc;

use relay_core::events::{PrivateMessage, SessionEvent};
use relay_core::{ConnectionHandle, ConnectionRegistry, Credentials, Identity, IdentityExtractor, OutboundEvent};
use relay_telemetry::{DropReason, RelayStats};

use crate::config::{CoordinatorPolicy, MissingIdentityPolicy};
use crate::protocol::ProtocolError;

/// What handling one event did. Returned for logging and tests; the sender
/// of a client event is never told.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    Bound(Identity),
    Unbound(Vec<Identity>),
    Delivered { to: Identity },
    Dropped { to: Identity, reason: DropReason },
    /// Credentials carried no identity and the policy refuses placeholders.
    Unidentified,
}

pub struct SessionCoordinator {
    registry: Arc<ConnectionRegistry>,
    extractor: Arc<dyn IdentityExtractor>,
    policy: CoordinatorPolicy,
    stats: Arc<RelayStats>,
}

impl SessionCoordinator {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        extractor: Arc<dyn IdentityExtractor>,
        policy: CoordinatorPolicy,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            registry,
            extractor,
            policy,
            stats,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &CoordinatorPolicy {
        &self.policy
    }

    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Route one event for the connection behind `handle`.
    pub fn dispatch(
        &self,
        handle: &Arc<dyn ConnectionHandle>,
        credentials: &Credentials,
        event: SessionEvent,
    ) -> EventOutcome {
        match event {
            SessionEvent::Connected => self.on_connect(handle, credentials),
            SessionEvent::Disconnected => self.on_disconnect(handle, credentials),
            SessionEvent::JoinChat(identity) => self.join_chat(handle, identity),
            SessionEvent::LeaveChat(identity) => self.leave_chat(handle, identity),
            SessionEvent::PrivateMessage(msg) => self.private_message(handle, credentials, msg),
        }
    }

    pub fn on_connect(&self, handle: &Arc<dyn ConnectionHandle>, credentials: &Credentials) -> EventOutcome {
        self.stats.record_connect();
        let Some(identity) = self.resolve_identity(handle, credentials) else {
            return EventOutcome::Unidentified;
        };
        self.registry.bind(identity.clone(), handle);
        tracing::info!(conn_id = %handle.id(), identity = %identity, "Client connected");
        EventOutcome::Bound(identity)
    }

    pub fn on_disconnect(&self, handle: &Arc<dyn ConnectionHandle>, credentials: &Credentials) -> EventOutcome {
        self.stats.record_disconnect();
        let derived = self.resolve_identity(handle, credentials);

        let removed = if self.policy.sweep_on_disconnect {
            self.registry.unbind_connection(handle.id())
        } else if let Some(identity) = derived.clone() {
            self.registry.unbind(&identity);
            vec![identity]
        } else {
            Vec::new()
        };

        tracing::info!(
            conn_id = %handle.id(),
            identity = %derived.unwrap_or_default(),
            removed = removed.len(),
            "Client disconnected"
        );
        EventOutcome::Unbound(removed)
    }

    pub fn join_chat(&self, handle: &Arc<dyn ConnectionHandle>, identity: Identity) -> EventOutcome {
        if self.policy.rebind_on_join {
            for stale in self.registry.identities_for(handle.id()) {
                if stale != identity && self.registry.unbind_if(&stale, handle.id()) {
                    tracing::debug!(conn_id = %handle.id(), identity = %stale, "Released previous identity");
                }
            }
        }
        self.registry.bind(identity.clone(), handle);
        tracing::info!(conn_id = %handle.id(), identity = %identity, "User joined the chat");
        EventOutcome::Bound(identity)
    }

    pub fn leave_chat(&self, handle: &Arc<dyn ConnectionHandle>, identity: Identity) -> EventOutcome {
        self.registry.unbind(&identity);
        tracing::info!(conn_id = %handle.id(), identity = %identity, "User left the chat");
        EventOutcome::Unbound(vec![identity])
    }

    pub fn private_message(
        &self,
        handle: &Arc<dyn ConnectionHandle>,
        credentials: &Credentials,
        msg: PrivateMessage,
    ) -> EventOutcome {
        let Some(from) = self.resolve_identity(handle, credentials) else {
            return EventOutcome::Unidentified;
        };
        let PrivateMessage { to, message } = msg;

        let Some(target) = self.registry.lookup(&to) else {
            tracing::debug!(conn_id = %handle.id(), from = %from, to = %to, "Recipient not connected, dropping message");
            self.stats.record_dropped(DropReason::RoutingMiss);
            return EventOutcome::Dropped {
                to,
                reason: DropReason::RoutingMiss,
            };
        };

        match target.send(&OutboundEvent::PrivateMessage { from, message }) {
            Ok(()) => {
                self.stats.record_delivered();
                EventOutcome::Delivered { to }
            }
            Err(e) => {
                tracing::warn!(
                    conn_id = %target.id(),
                    to = %to,
                    error = %e,
                    kind = e.error_kind(),
                    "Failed to deliver private message"
                );
                self.stats.record_dropped(DropReason::SendFailed);
                EventOutcome::Dropped {
                    to,
                    reason: DropReason::SendFailed,
                }
            }
        }
    }

    /// Account for a client frame that failed to decode. Connection and
    /// registry are left untouched.
    pub fn report_malformed(&self, handle: &Arc<dyn ConnectionHandle>, err: &ProtocolError) {
        self.stats.record_malformed();
        tracing::warn!(conn_id = %handle.id(), error = %err, kind = err.error_kind(), "Discarding malformed event");
    }

    fn resolve_identity(&self, handle: &Arc<dyn ConnectionHandle>, credentials: &Credentials) -> Option<Identity> {
        if let Some(identity) = self.extractor.extract(credentials) {
            return Some(identity);
        }
        match self.policy.missing_identity {
            MissingIdentityPolicy::Placeholder => {
                tracing::warn!(conn_id = %handle.id(), "No identity in credentials, using placeholder");
                Some(Identity::placeholder())
            }
            MissingIdentityPolicy::Reject => {
                tracing::warn!(conn_id = %handle.id(), "No identity in credentials, connection left unidentified");
                None
            }
        }
    }
}
