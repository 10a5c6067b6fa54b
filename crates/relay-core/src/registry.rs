//! Identity → connection routing table.
//!
//! One `RwLock` guards the whole map, so every `bind`/`unbind`/`lookup`
//! observes a single total order. Entries are weak: the transport owns the
//! connection, the registry only remembers where to find it.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::handle::ConnectionHandle;
use crate::identity::Identity;
use crate::ids::ConnectionId;

/// Registry of identity bindings. Create once at startup and share by `Arc`.
#[derive(Default)]
pub struct ConnectionRegistry {
    entries: RwLock<HashMap<Identity, Weak<dyn ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the binding for `identity`. The superseded handle,
    /// if any, is forgotten but not closed.
    pub fn bind(&self, identity: Identity, handle: &Arc<dyn ConnectionHandle>) {
        let previous = self
            .entries
            .write()
            .insert(identity.clone(), Arc::downgrade(handle));

        if let Some(prev) = previous.and_then(|w| w.upgrade()) {
            if prev.id() != handle.id() {
                tracing::debug!(
                    identity = %identity,
                    previous = %prev.id(),
                    conn_id = %handle.id(),
                    "Identity rebound to a newer connection"
                );
            }
        }
    }

    /// Remove the binding for `identity`. Absent identities are a no-op.
    pub fn unbind(&self, identity: &Identity) {
        self.entries.write().remove(identity);
    }

    /// Resolve `identity` to its bound handle. Bindings whose connection has
    /// been dropped resolve to `None`; a closed but still-owned handle is
    /// returned and its `send` fails.
    pub fn lookup(&self, identity: &Identity) -> Option<Arc<dyn ConnectionHandle>> {
        self.entries.read().get(identity)?.upgrade()
    }

    /// Remove `identity` only if it is still bound to `conn_id`.
    pub fn unbind_if(&self, identity: &Identity, conn_id: &ConnectionId) -> bool {
        let mut entries = self.entries.write();
        let matches = entries
            .get(identity)
            .is_some_and(|w| points_at(w, conn_id));
        if matches {
            entries.remove(identity);
        }
        matches
    }

    /// Remove every binding that points at `conn_id`, returning the
    /// identities that were removed.
    pub fn unbind_connection(&self, conn_id: &ConnectionId) -> Vec<Identity> {
        let mut entries = self.entries.write();
        let mut removed = Vec::new();
        entries.retain(|identity, weak| {
            if points_at(weak, conn_id) {
                removed.push(identity.clone());
                false
            } else {
                true
            }
        });
        removed.sort();
        removed
    }

    /// Identities currently bound to `conn_id`.
    pub fn identities_for(&self, conn_id: &ConnectionId) -> Vec<Identity> {
        let mut found: Vec<Identity> = self
            .entries
            .read()
            .iter()
            .filter(|(_, weak)| points_at(weak, conn_id))
            .map(|(identity, _)| identity.clone())
            .collect();
        found.sort();
        found
    }

    /// Drop bindings whose connection no longer exists or is closed.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, weak| weak.upgrade().is_some_and(|h| h.is_open()));
        before - entries.len()
    }

    /// Number of bindings, including any not yet pruned.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn points_at(weak: &Weak<dyn ConnectionHandle>, conn_id: &ConnectionId) -> bool {
    weak.upgrade().is_some_and(|h| h.id() == conn_id)
}
