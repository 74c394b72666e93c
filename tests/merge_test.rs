//! Tests for the guest-to-user merge: counter carry-over, order
//! reassignment, conversation cascade, and upload cleanup.

use market_server::chat::owner::Owner;
use market_server::chat::store;
use market_server::db::models::{Direction, MediaType, MessageBody};
use market_server::db::{init_memory_db, DbPool};
use market_server::identity::merge;
use rusqlite::params;

fn insert_user(db: &DbPool, id: &str, email: &str) {
    let conn = db.lock().unwrap();
    conn.execute(
        "INSERT INTO users (id, email, role, language, orders_count, finished_count, canceled_count, created_at)
         VALUES (?1, ?2, 'user', 'en', 0, 0, 0, '2026-01-01T00:00:00Z')",
        params![id, email],
    )
    .unwrap();
}

fn insert_guest(db: &DbPool, id: &str, email: Option<&str>, counters: (i64, i64, i64)) {
    let conn = db.lock().unwrap();
    conn.execute(
        "INSERT INTO guests (id, email, language, orders_count, finished_count, canceled_count, created_at)
         VALUES (?1, ?2, 'en', ?3, ?4, ?5, '2026-01-01T00:00:00Z')",
        params![id, email, counters.0, counters.1, counters.2],
    )
    .unwrap();
}

fn insert_order(db: &DbPool, id: &str, guest_id: &str, status: &str) {
    let conn = db.lock().unwrap();
    conn.execute(
        "INSERT INTO orders (id, guest_id, status, created_at)
         VALUES (?1, ?2, ?3, '2026-01-01T00:00:00Z')",
        params![id, guest_id, status],
    )
    .unwrap();
}

#[test]
fn merge_carries_counters_and_reassigns_non_draft_orders() {
    let db = init_memory_db().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().to_str().unwrap().to_string();

    insert_user(&db, "user-1", "a@example.com");
    insert_guest(&db, "guest-1", Some("a@example.com"), (4, 2, 1));
    insert_order(&db, "order-1", "guest-1", "placed");
    insert_order(&db, "order-2", "guest-1", "draft");
    insert_order(&db, "order-3", "guest-1", "finished");

    let merged = merge::merge_blocking(&db, &data_dir, "a@example.com", "user-1").unwrap();
    assert!(merged);

    let conn = db.lock().unwrap();
    let (orders, finished, canceled): (i64, i64, i64) = conn
        .query_row(
            "SELECT orders_count, finished_count, canceled_count FROM users WHERE id = 'user-1'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!((orders, finished, canceled), (4, 2, 1));

    // Non-draft orders now belong to the user
    let reassigned: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM orders WHERE user_id = 'user-1' AND guest_id IS NULL",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(reassigned, 2);

    // The draft stays behind, fully detached from the deleted guest
    let (draft_user, draft_guest): (Option<String>, Option<String>) = conn
        .query_row(
            "SELECT user_id, guest_id FROM orders WHERE id = 'order-2'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(draft_user, None);
    assert_eq!(draft_guest, None, "draft must not reference the deleted guest");

    // Guest row is gone
    let guests: i64 = conn
        .query_row("SELECT COUNT(*) FROM guests", [], |row| row.get(0))
        .unwrap();
    assert_eq!(guests, 0);
}

#[test]
fn merge_deletes_conversation_messages_and_uploads() {
    let db = init_memory_db().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().to_str().unwrap().to_string();

    insert_user(&db, "user-2", "b@example.com");
    insert_guest(&db, "guest-2", Some("b@example.com"), (0, 0, 0));

    // Guest chatted and uploaded a photo
    std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
    let upload = "uploads/photo-1.jpg";
    std::fs::write(dir.path().join(upload), b"jpeg bytes").unwrap();
    let cid = {
        let conn = db.lock().unwrap();
        let conversation =
            store::find_or_create_conversation(&conn, &Owner::Guest("guest-2".into())).unwrap();
        let text = MessageBody::new(MediaType::Text, Some("hello".into()), None).unwrap();
        store::append_message(&conn, &conversation.id, Direction::Question, None, MediaType::Text, &text)
            .unwrap();
        let photo = MessageBody::new(MediaType::Photo, None, Some(upload.into())).unwrap();
        store::append_message(
            &conn,
            &conversation.id,
            Direction::Question,
            None,
            MediaType::Photo,
            &photo,
        )
        .unwrap();
        conversation.id
    };

    let merged = merge::merge_blocking(&db, &data_dir, "b@example.com", "user-2").unwrap();
    assert!(merged);

    let conn = db.lock().unwrap();
    let conversations: i64 = conn
        .query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))
        .unwrap();
    assert_eq!(conversations, 0);
    let messages: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
            params![cid],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(messages, 0, "messages cascade with the conversation");
    assert!(
        !dir.path().join(upload).exists(),
        "uploaded file is removed with the thread"
    );
}

#[test]
fn merge_without_matching_guest_is_a_no_op() {
    let db = init_memory_db().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().to_str().unwrap().to_string();

    insert_user(&db, "user-3", "c@example.com");
    insert_guest(&db, "guest-3", None, (1, 0, 0));
    insert_guest(&db, "guest-4", Some("other@example.com"), (1, 0, 0));

    let merged = merge::merge_blocking(&db, &data_dir, "c@example.com", "user-3").unwrap();
    assert!(!merged);

    let conn = db.lock().unwrap();
    let guests: i64 = conn
        .query_row("SELECT COUNT(*) FROM guests", [], |row| row.get(0))
        .unwrap();
    assert_eq!(guests, 2, "unrelated guests are untouched");
}
