//! Tests for durable conversation/message state: pagination, the greeting,
//! bulk seen flips, badges, and the owner/body invariants.

use market_server::chat::owner::{Owner, OwnerError};
use market_server::chat::store;
use market_server::db::models::{BodyError, Direction, MediaType, MessageBody};
use market_server::db::{init_memory_db, DbPool};
use proptest::prelude::*;

fn test_db() -> DbPool {
    init_memory_db().expect("in-memory DB")
}

fn seed_messages(db: &DbPool, owner: &Owner, questions: usize, answers: usize) -> String {
    let conn = db.lock().unwrap();
    let conversation = store::find_or_create_conversation(&conn, owner).unwrap();
    let body = MessageBody::new(MediaType::Text, Some("hi".into()), None).unwrap();
    for _ in 0..questions {
        store::append_message(
            &conn,
            &conversation.id,
            Direction::Question,
            None,
            MediaType::Text,
            &body,
        )
        .unwrap();
    }
    for _ in 0..answers {
        store::append_message(
            &conn,
            &conversation.id,
            Direction::Answer,
            Some("admin-1"),
            MediaType::Text,
            &body,
        )
        .unwrap();
    }
    conversation.id
}

#[test]
fn find_or_create_is_idempotent_per_owner() {
    let db = test_db();
    let conn = db.lock().unwrap();
    let owner = Owner::Device("dev-1".into());
    let a = store::find_or_create_conversation(&conn, &owner).unwrap();
    let b = store::find_or_create_conversation(&conn, &owner).unwrap();
    assert_eq!(a.id, b.id);

    // A different owner kind with the same raw id gets its own thread
    let other = store::find_or_create_conversation(&conn, &Owner::Guest("dev-1".into())).unwrap();
    assert_ne!(a.id, other.id);
}

#[test]
fn empty_thread_yields_one_synthesized_greeting() {
    let db = test_db();
    let conn = db.lock().unwrap();
    let conversation = store::find_or_create_conversation(&conn, &Owner::Device("dev-2".into()))
        .unwrap();

    let page = store::list_page(&conn, &conversation.id, 1, 50, "fr").unwrap();
    assert!(page.synthesized);
    assert_eq!(page.total, 0);
    assert!(!page.pages_left);
    assert_eq!(page.messages.len(), 1);

    let greeting = &page.messages[0];
    assert_eq!(greeting.direction, Direction::Answer);
    assert!(greeting.seen);
    assert_eq!(greeting.body.as_deref(), Some(store::greeting_text("fr")));

    // The greeting must not have been persisted
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
            rusqlite::params![conversation.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 0);

    // An unknown locale falls back to the default greeting
    assert_eq!(store::greeting_text("xx"), store::greeting_text("en"));
}

#[test]
fn empty_thread_rejects_page_two() {
    let db = test_db();
    let conn = db.lock().unwrap();
    let conversation = store::find_or_create_conversation(&conn, &Owner::Device("dev-3".into()))
        .unwrap();
    assert!(matches!(
        store::list_page(&conn, &conversation.id, 2, 50, "en"),
        Err(store::PageError::OutOfRange)
    ));
}

#[test]
fn pagination_boundaries() {
    let db = test_db();
    let cid = seed_messages(&db, &Owner::Device("dev-4".into()), 25, 0);
    let conn = db.lock().unwrap();

    // 25 messages at limit 10: pages 1 and 2 full, page 3 holds 5
    let first = store::list_page(&conn, &cid, 1, 10, "en").unwrap();
    assert_eq!(first.messages.len(), 10);
    assert_eq!(first.total, 25);
    assert!(first.pages_left);
    assert!(!first.synthesized);

    let last = store::list_page(&conn, &cid, 3, 10, "en").unwrap();
    assert_eq!(last.messages.len(), 5);
    assert!(!last.pages_left);

    assert!(matches!(
        store::list_page(&conn, &cid, 4, 10, "en"),
        Err(store::PageError::OutOfRange)
    ));

    // Page 0 is normalized to 1, oversized limits are clamped
    let normalized = store::list_page(&conn, &cid, 0, 500, "en").unwrap();
    assert_eq!(normalized.messages.len(), 25);
    assert!(!normalized.pages_left);
}

#[test]
fn listing_is_newest_first() {
    let db = test_db();
    let cid = seed_messages(&db, &Owner::Device("dev-5".into()), 3, 0);
    let conn = db.lock().unwrap();
    let page = store::list_page(&conn, &cid, 1, 50, "en").unwrap();
    for pair in page.messages.windows(2) {
        assert!(
            (&pair[0].created_at, &pair[0].id) >= (&pair[1].created_at, &pair[1].id),
            "messages must be ordered newest first"
        );
    }
}

#[test]
fn mark_seen_flips_only_the_given_direction() {
    let db = test_db();
    let cid = seed_messages(&db, &Owner::Device("dev-6".into()), 4, 3);
    let conn = db.lock().unwrap();

    assert_eq!(store::unseen_count(&conn, &cid, Direction::Question).unwrap(), 4);
    assert_eq!(store::unseen_count(&conn, &cid, Direction::Answer).unwrap(), 3);

    // Admin opens the thread: questions flip, answers untouched
    let flipped = store::mark_seen(&conn, &cid, Direction::Question).unwrap();
    assert_eq!(flipped, 4);
    assert_eq!(store::unseen_count(&conn, &cid, Direction::Question).unwrap(), 0);
    assert_eq!(store::unseen_count(&conn, &cid, Direction::Answer).unwrap(), 3);

    // Second open flips nothing
    assert_eq!(store::mark_seen(&conn, &cid, Direction::Question).unwrap(), 0);
}

#[test]
fn admin_badge_counts_conversations_not_messages() {
    let db = test_db();
    let cid_a = seed_messages(&db, &Owner::Device("dev-7".into()), 5, 0);
    let _cid_b = seed_messages(&db, &Owner::Guest("guest-7".into()), 2, 0);
    let _cid_c = seed_messages(&db, &Owner::User("user-7".into()), 0, 2);

    let conn = db.lock().unwrap();
    // Two conversations hold unseen questions; answer-only threads don't count
    assert_eq!(store::admin_unseen_conversation_count(&conn).unwrap(), 2);

    store::mark_seen(&conn, &cid_a, Direction::Question).unwrap();
    assert_eq!(store::admin_unseen_conversation_count(&conn).unwrap(), 1);
}

#[test]
fn conversation_listing_orders_by_activity_with_unseen_counts() {
    let db = test_db();
    let _older = seed_messages(&db, &Owner::Device("dev-8".into()), 1, 0);
    std::thread::sleep(std::time::Duration::from_millis(5));
    let newer = seed_messages(&db, &Owner::Guest("guest-8".into()), 3, 1);

    let conn = db.lock().unwrap();
    let rows = store::list_conversations(&conn).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0.id, newer, "most recent activity first");
    assert_eq!(rows[0].1, 3, "unseen count tracks questions only");
}

#[test]
fn append_bumps_counter_and_activity() {
    let db = test_db();
    let cid = seed_messages(&db, &Owner::Device("dev-9".into()), 2, 1);
    let conn = db.lock().unwrap();
    let conversation = store::get_conversation(&conn, &cid).unwrap().unwrap();
    assert_eq!(conversation.message_count, 3);
}

#[test]
fn exclusive_body_validation() {
    // Text media requires a non-empty body and no file
    assert!(MessageBody::new(MediaType::Text, Some("hi".into()), None).is_ok());
    assert_eq!(
        MessageBody::new(MediaType::Text, Some("  ".into()), None),
        Err(BodyError::Neither)
    );
    assert_eq!(
        MessageBody::new(MediaType::Text, None, None),
        Err(BodyError::Neither)
    );
    assert_eq!(
        MessageBody::new(MediaType::Text, Some("hi".into()), Some("f.png".into())),
        Err(BodyError::Both)
    );

    // Photo/audio require a file and no text
    assert!(MessageBody::new(MediaType::Photo, None, Some("f.png".into())).is_ok());
    assert_eq!(
        MessageBody::new(MediaType::Audio, Some("hi".into()), None),
        Err(BodyError::MediaMismatch)
    );
}

proptest! {
    // Exactly the three one-hot column patterns rebuild an owner; everything
    // else is rejected.
    #[test]
    fn owner_round_trips_through_columns(id in "[a-z0-9-]{1,16}", kind in 0..3usize) {
        let owner = match kind {
            0 => Owner::User(id.clone()),
            1 => Owner::Guest(id.clone()),
            _ => Owner::Device(id.clone()),
        };
        let (user_id, guest_id, device_id) = owner.columns();
        let rebuilt = Owner::from_columns(
            user_id.map(str::to_string),
            guest_id.map(str::to_string),
            device_id.map(str::to_string),
        ).unwrap();
        prop_assert_eq!(rebuilt, owner);
    }

    #[test]
    fn multi_owner_rows_are_rejected(
        user in proptest::option::of("[a-z]{1,8}"),
        guest in proptest::option::of("[a-z]{1,8}"),
        device in proptest::option::of("[a-z]{1,8}"),
    ) {
        let set = [user.is_some(), guest.is_some(), device.is_some()]
            .iter()
            .filter(|b| **b)
            .count();
        let result = Owner::from_columns(user, guest, device);
        match set {
            0 => prop_assert_eq!(result, Err(OwnerError::NoOwner)),
            1 => prop_assert!(result.is_ok()),
            _ => prop_assert_eq!(result, Err(OwnerError::MultipleOwners)),
        }
    }
}
