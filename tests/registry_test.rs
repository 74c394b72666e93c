//! Tests for the role-partitioned connection registry: partition isolation,
//! last-connect-wins, and the guarded unregister.

use axum::extract::ws::Message;
use market_server::events::ServerEvent;
use market_server::registry::{ConnectionRegistry, ConnectionSender, Role};
use tokio::sync::mpsc;

fn channel() -> (ConnectionSender, mpsc::UnboundedReceiver<Message>) {
    mpsc::unbounded_channel()
}

fn seen_event() -> ServerEvent {
    ServerEvent::Seen {
        conversation_id: "conv-1".to_string(),
    }
}

#[test]
fn partitions_do_not_collide_on_identity() {
    let registry = ConnectionRegistry::new();
    let (user_tx, mut user_rx) = channel();
    let (guest_tx, mut guest_rx) = channel();

    // Same raw identity string in two partitions
    registry.register(Role::User, "id-1", user_tx);
    registry.register(Role::Guest, "id-1", guest_tx);

    let ids = ["id-1".to_string()];
    assert_eq!(registry.send_to_users(&ids, &seen_event()), 1);
    assert!(user_rx.try_recv().is_ok());
    assert!(guest_rx.try_recv().is_err(), "guest partition untouched");

    assert_eq!(registry.send_to_guests(&ids, &seen_event()), 1);
    assert!(guest_rx.try_recv().is_ok());
}

#[test]
fn last_connect_wins() {
    let registry = ConnectionRegistry::new();
    let (old_tx, mut old_rx) = channel();
    let (new_tx, mut new_rx) = channel();

    registry.register(Role::Guest, "dev-1", old_tx);
    registry.register(Role::Guest, "dev-1", new_tx);

    let ids = ["dev-1".to_string()];
    assert_eq!(registry.send_to_guests(&ids, &seen_event()), 1);
    assert!(old_rx.try_recv().is_err(), "evicted handle gets nothing");
    assert!(new_rx.try_recv().is_ok());
}

#[test]
fn stale_unregister_cannot_evict_replacement() {
    let registry = ConnectionRegistry::new();
    let (old_tx, _old_rx) = channel();
    let (new_tx, mut new_rx) = channel();

    registry.register(Role::Guest, "dev-2", old_tx.clone());
    registry.register(Role::Guest, "dev-2", new_tx);

    // The evicted connection tears itself down after its replacement arrived
    registry.unregister(Role::Guest, "dev-2", &old_tx);

    assert!(registry.is_connected(Role::Guest, "dev-2"));
    let ids = ["dev-2".to_string()];
    assert_eq!(registry.send_to_guests(&ids, &seen_event()), 1);
    assert!(new_rx.try_recv().is_ok());
}

#[test]
fn unregister_removes_own_entry_and_is_idempotent() {
    let registry = ConnectionRegistry::new();
    let (tx, _rx) = channel();

    registry.register(Role::User, "user-1", tx.clone());
    assert!(registry.is_connected(Role::User, "user-1"));

    registry.unregister(Role::User, "user-1", &tx);
    assert!(!registry.is_connected(Role::User, "user-1"));

    // Absent entry is a no-op
    registry.unregister(Role::User, "user-1", &tx);
    assert!(!registry.is_connected(Role::User, "user-1"));
}

#[test]
fn targeted_send_skips_absent_ids() {
    let registry = ConnectionRegistry::new();
    let (tx, mut rx) = channel();
    registry.register(Role::User, "user-2", tx);

    let ids = [
        "user-2".to_string(),
        "nobody".to_string(),
        "also-nobody".to_string(),
    ];
    assert_eq!(registry.send_to_users(&ids, &seen_event()), 1);
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
}

#[test]
fn broadcast_reaches_every_admin() {
    let registry = ConnectionRegistry::new();
    let (a_tx, mut a_rx) = channel();
    let (b_tx, mut b_rx) = channel();
    let (user_tx, mut user_rx) = channel();

    registry.register(Role::Admin, "admin-1", a_tx);
    registry.register(Role::Admin, "admin-2", b_tx);
    registry.register(Role::User, "user-3", user_tx);

    assert_eq!(registry.broadcast_to_admins(&seen_event()), 2);
    assert!(a_rx.try_recv().is_ok());
    assert!(b_rx.try_recv().is_ok());
    assert!(user_rx.try_recv().is_err(), "broadcast is admin-only");
}

#[test]
fn send_to_dropped_receiver_counts_nothing() {
    let registry = ConnectionRegistry::new();
    let (tx, rx) = channel();
    registry.register(Role::Guest, "dev-3", tx);
    drop(rx);

    let ids = ["dev-3".to_string()];
    assert_eq!(registry.send_to_guests(&ids, &seen_event()), 0);
}
