use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            "-- Migration 1: accounts and transient guests

CREATE TABLE users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL DEFAULT 'user',
    language TEXT NOT NULL DEFAULT 'en',
    orders_count INTEGER NOT NULL DEFAULT 0,
    finished_count INTEGER NOT NULL DEFAULT 0,
    canceled_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE guests (
    id TEXT PRIMARY KEY,
    email TEXT,
    language TEXT NOT NULL DEFAULT 'en',
    orders_count INTEGER NOT NULL DEFAULT 0,
    finished_count INTEGER NOT NULL DEFAULT 0,
    canceled_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX idx_guests_email ON guests(email);
",
        ),
        M::up(
            "-- Migration 2: conversations and messages

-- Exactly one of user_id / guest_id / device_id is set per row. Enforced in
-- code through the Owner union, not a constraint (the find-or-create race is
-- a tolerated anomaly).
CREATE TABLE conversations (
    id TEXT PRIMARY KEY,
    user_id TEXT,
    guest_id TEXT,
    device_id TEXT,
    message_count INTEGER NOT NULL DEFAULT 0,
    last_activity_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX idx_conversations_user ON conversations(user_id);
CREATE INDEX idx_conversations_guest ON conversations(guest_id);
CREATE INDEX idx_conversations_device ON conversations(device_id);

CREATE TABLE messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    sender_id TEXT,
    direction TEXT NOT NULL,
    media_type TEXT NOT NULL DEFAULT 'text',
    body TEXT,
    file_path TEXT,
    seen INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX idx_messages_conversation_time ON messages(conversation_id, created_at);
CREATE INDEX idx_messages_conversation_seen ON messages(conversation_id, direction, seen);
",
        ),
        M::up(
            "-- Migration 3: order rows touched by the guest merge

CREATE TABLE orders (
    id TEXT PRIMARY KEY,
    user_id TEXT,
    guest_id TEXT,
    status TEXT NOT NULL DEFAULT 'draft',
    created_at TEXT NOT NULL
);

CREATE INDEX idx_orders_user ON orders(user_id);
CREATE INDEX idx_orders_guest ON orders(guest_id);
",
        ),
    ])
}
