//! Role-partitioned connection registry.
//!
//! Tracks which participant identities currently have an open WebSocket
//! connection, split into independent admin / user / guest partitions so
//! identity keys can never collide across roles. Entries are ephemeral:
//! mutated only by connect/disconnect, never persisted, and lost on restart.
//!
//! The registry is constructed once at startup and injected through
//! `AppState` — delivery is advisory, so every send is best-effort and a
//! missing entry is a silent no-op.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::events::ServerEvent;

/// Sender half of a connection's outbound channel. Any part of the system
/// can clone this to push frames to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Which partition an identity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Admin and superAdmin accounts.
    Admin,
    /// Registered users.
    User,
    /// Anonymous devices and web guests.
    Guest,
}

pub type SharedRegistry = Arc<ConnectionRegistry>;

/// Process-local directory of live connections, one entry per identity per
/// partition. Re-registering an identity overwrites the prior handle
/// (last connect wins — one live handle per identity).
pub struct ConnectionRegistry {
    admins: DashMap<String, ConnectionSender>,
    users: DashMap<String, ConnectionSender>,
    guests: DashMap<String, ConnectionSender>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            admins: DashMap::new(),
            users: DashMap::new(),
            guests: DashMap::new(),
        }
    }

    fn partition(&self, role: Role) -> &DashMap<String, ConnectionSender> {
        match role {
            Role::Admin => &self.admins,
            Role::User => &self.users,
            Role::Guest => &self.guests,
        }
    }

    /// Insert or overwrite the entry for `identity` in the partition for
    /// `role`. Overwriting a live connection is accepted behavior.
    pub fn register(&self, role: Role, identity: &str, sender: ConnectionSender) {
        self.partition(role).insert(identity.to_string(), sender);
        tracing::debug!(?role, identity, "connection registered");
    }

    /// Remove `identity`'s entry, but only if the stored handle is the one
    /// being torn down (or already closed). A connection that was evicted by
    /// a newer register must not remove its replacement. No-op if absent.
    pub fn unregister(&self, role: Role, identity: &str, sender: &ConnectionSender) {
        self.partition(role)
            .remove_if(identity, |_, stored| {
                stored.same_channel(sender) || stored.is_closed()
            });
        tracing::debug!(?role, identity, "connection unregistered");
    }

    /// Whether `identity` currently has a live entry under `role`.
    pub fn is_connected(&self, role: Role, identity: &str) -> bool {
        self.partition(role).contains_key(identity)
    }

    /// Deliver `event` to the admin-partition entries whose id is in `ids`.
    /// Absent ids are silently skipped. Returns the number of handles the
    /// frame was pushed to.
    pub fn send_to_admins(&self, ids: &[String], event: &ServerEvent) -> usize {
        self.send_to(&self.admins, ids, event)
    }

    /// Deliver `event` to every connected admin.
    pub fn broadcast_to_admins(&self, event: &ServerEvent) -> usize {
        let Some(msg) = event.to_message() else {
            return 0;
        };
        let mut delivered = 0;
        for entry in self.admins.iter() {
            if entry.value().send(msg.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn send_to_users(&self, ids: &[String], event: &ServerEvent) -> usize {
        self.send_to(&self.users, ids, event)
    }

    pub fn send_to_guests(&self, ids: &[String], event: &ServerEvent) -> usize {
        self.send_to(&self.guests, ids, event)
    }

    fn send_to(
        &self,
        partition: &DashMap<String, ConnectionSender>,
        ids: &[String],
        event: &ServerEvent,
    ) -> usize {
        let Some(msg) = event.to_message() else {
            return 0;
        };
        let mut delivered = 0;
        for id in ids {
            if let Some(sender) = partition.get(id) {
                if sender.send(msg.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn new_shared_registry() -> SharedRegistry {
    Arc::new(ConnectionRegistry::new())
}
