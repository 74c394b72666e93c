//! Durable conversation/message state.
//!
//! All functions are synchronous and take a borrowed `rusqlite::Connection`;
//! callers run them inside `tokio::task::spawn_blocking` while holding the
//! pool mutex. Fan-out decisions happen after these writes return — message
//! durability never depends on delivery.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::chat::owner::Owner;
use crate::db::models::{ConversationRow, Direction, MediaType, MessageBody, MessageRow};

/// Default page size for message listings.
pub const DEFAULT_LIMIT: u32 = 50;
/// Maximum page size for message listings.
pub const MAX_LIMIT: u32 = 100;

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        guest_id: row.get(2)?,
        device_id: row.get(3)?,
        message_count: row.get(4)?,
        last_activity_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const CONVERSATION_COLUMNS: &str =
    "id, user_id, guest_id, device_id, message_count, last_activity_at, created_at";

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    let direction: String = row.get(3)?;
    let media: String = row.get(4)?;
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        direction: Direction::from_str(&direction).unwrap_or(Direction::Question),
        media_type: MediaType::from_str(&media).unwrap_or(MediaType::Text),
        body: row.get(5)?,
        file_path: row.get(6)?,
        seen: row.get::<_, i64>(7)? != 0,
        created_at: row.get(8)?,
    })
}

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, direction, media_type, body, file_path, seen, created_at";

/// Look up the conversation for the given owner variant, if one exists.
/// The owner union guarantees the filter has exactly one key set.
pub fn find_conversation_by_owner(
    conn: &Connection,
    owner: &Owner,
) -> rusqlite::Result<Option<ConversationRow>> {
    let (column, id) = match owner {
        Owner::User(id) => ("user_id", id),
        Owner::Guest(id) => ("guest_id", id),
        Owner::Device(id) => ("device_id", id),
    };
    conn.query_row(
        &format!(
            "SELECT {} FROM conversations WHERE {} = ?1",
            CONVERSATION_COLUMNS, column
        ),
        params![id],
        |row| conversation_from_row(row),
    )
    .optional()
}

/// Return the existing conversation for `owner` or create one.
/// Not atomic against a concurrent double-send; a duplicate conversation
/// only fragments the message count, so the race is tolerated.
pub fn find_or_create_conversation(
    conn: &Connection,
    owner: &Owner,
) -> rusqlite::Result<ConversationRow> {
    if let Some(existing) = find_conversation_by_owner(conn, owner)? {
        return Ok(existing);
    }

    let id = Uuid::now_v7().to_string();
    let now = Utc::now().to_rfc3339();
    let (user_id, guest_id, device_id) = owner.columns();
    conn.execute(
        "INSERT INTO conversations (id, user_id, guest_id, device_id, message_count, last_activity_at, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
        params![id, user_id, guest_id, device_id, now],
    )?;

    Ok(ConversationRow {
        id,
        user_id: user_id.map(str::to_string),
        guest_id: guest_id.map(str::to_string),
        device_id: device_id.map(str::to_string),
        message_count: 0,
        last_activity_at: now.clone(),
        created_at: now,
    })
}

pub fn get_conversation(
    conn: &Connection,
    conversation_id: &str,
) -> rusqlite::Result<Option<ConversationRow>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM conversations WHERE id = ?1",
            CONVERSATION_COLUMNS
        ),
        params![conversation_id],
        |row| conversation_from_row(row),
    )
    .optional()
}

/// Insert a message and bump the conversation's counter and last-activity
/// timestamp in the same call. The body must already have passed
/// `MessageBody::new` validation.
pub fn append_message(
    conn: &Connection,
    conversation_id: &str,
    direction: Direction,
    sender_id: Option<&str>,
    media_type: MediaType,
    body: &MessageBody,
) -> rusqlite::Result<MessageRow> {
    let id = Uuid::now_v7().to_string();
    let now = Utc::now().to_rfc3339();
    let (text, file_path) = body.columns();

    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, direction, media_type, body, file_path, seen, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
        params![
            id,
            conversation_id,
            sender_id,
            direction.as_str(),
            media_type.as_str(),
            text,
            file_path,
            now
        ],
    )?;

    conn.execute(
        "UPDATE conversations SET message_count = message_count + 1, last_activity_at = ?2 WHERE id = ?1",
        params![conversation_id, now],
    )?;

    Ok(MessageRow {
        id,
        conversation_id: conversation_id.to_string(),
        sender_id: sender_id.map(str::to_string),
        direction,
        media_type,
        body: text.map(str::to_string),
        file_path: file_path.map(str::to_string),
        seen: false,
        created_at: now,
    })
}

/// A page of messages, newest first.
#[derive(Debug)]
pub struct MessagePage {
    pub messages: Vec<MessageRow>,
    pub pages_left: bool,
    pub total: i64,
    /// True when the single returned message is the synthesized greeting.
    pub synthesized: bool,
}

#[derive(Debug)]
pub enum PageError {
    /// Requested page lies beyond the last valid page.
    OutOfRange,
    Db(rusqlite::Error),
}

impl std::fmt::Display for PageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageError::OutOfRange => write!(f, "page out of range"),
            PageError::Db(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for PageError {}

impl From<rusqlite::Error> for PageError {
    fn from(e: rusqlite::Error) -> Self {
        PageError::Db(e)
    }
}

/// List one page of a conversation's messages, newest first.
///
/// A page past `ceil(total / limit)` is a rejection, not an empty page.
/// A conversation with zero stored messages yields exactly one synthesized
/// locale greeting (never persisted) so the UI always has content.
pub fn list_page(
    conn: &Connection,
    conversation_id: &str,
    page: u32,
    limit: u32,
    lang: &str,
) -> Result<MessagePage, PageError> {
    let page = page.max(1);
    let limit = limit.clamp(1, MAX_LIMIT);

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
        params![conversation_id],
        |row| row.get(0),
    )?;

    if total == 0 {
        if page > 1 {
            return Err(PageError::OutOfRange);
        }
        return Ok(MessagePage {
            messages: vec![greeting_message(conversation_id, lang)],
            pages_left: false,
            total: 0,
            synthesized: true,
        });
    }

    let pages = (total + i64::from(limit) - 1) / i64::from(limit);
    if i64::from(page) > pages {
        return Err(PageError::OutOfRange);
    }

    let offset = i64::from(page - 1) * i64::from(limit);
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM messages WHERE conversation_id = ?1
         ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
        MESSAGE_COLUMNS
    ))?;
    let messages: Vec<MessageRow> = stmt
        .query_map(params![conversation_id, limit, offset], |row| {
            message_from_row(row)
        })?
        .collect::<Result<_, _>>()?;

    Ok(MessagePage {
        messages,
        pages_left: i64::from(page) < pages,
        total,
        synthesized: false,
    })
}

pub fn get_message(conn: &Connection, message_id: &str) -> rusqlite::Result<Option<MessageRow>> {
    conn.query_row(
        &format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS),
        params![message_id],
        |row| message_from_row(row),
    )
    .optional()
}

/// Flip every unseen message of `direction` in the conversation to seen.
/// Returns the number of rows flipped. Opening a thread calls this for the
/// counterpart's direction — there is no per-message acknowledgment.
pub fn mark_seen(
    conn: &Connection,
    conversation_id: &str,
    direction: Direction,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE messages SET seen = 1 WHERE conversation_id = ?1 AND direction = ?2 AND seen = 0",
        params![conversation_id, direction.as_str()],
    )
}

pub fn mark_message_seen(conn: &Connection, message_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE messages SET seen = 1 WHERE id = ?1 AND seen = 0",
        params![message_id],
    )
}

/// Participant badge: unseen answer-direction messages in one conversation.
pub fn unseen_count(
    conn: &Connection,
    conversation_id: &str,
    direction: Direction,
) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1 AND direction = ?2 AND seen = 0",
        params![conversation_id, direction.as_str()],
        |row| row.get(0),
    )
}

/// Admin badge: distinct conversations holding at least one unseen question.
pub fn admin_unseen_conversation_count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(DISTINCT conversation_id) FROM messages WHERE direction = 'question' AND seen = 0",
        [],
        |row| row.get(0),
    )
}

/// All conversations ordered by most recent activity, with their unseen
/// question counts. Admin dashboard listing.
pub fn list_conversations(
    conn: &Connection,
) -> rusqlite::Result<Vec<(ConversationRow, i64)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, (SELECT COUNT(*) FROM messages m
                     WHERE m.conversation_id = conversations.id
                       AND m.direction = 'question' AND m.seen = 0)
         FROM conversations ORDER BY last_activity_at DESC",
        CONVERSATION_COLUMNS
    ))?;
    let rows: Vec<(ConversationRow, i64)> = stmt
        .query_map([], |row| Ok((conversation_from_row(row)?, row.get(7)?)))?
        .collect::<Result<_, _>>()?;
    Ok(rows)
}

/// Canned greeting shown in an empty thread. Never persisted.
pub fn greeting_message(conversation_id: &str, lang: &str) -> MessageRow {
    MessageRow {
        id: Uuid::now_v7().to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: None,
        direction: Direction::Answer,
        media_type: MediaType::Text,
        body: Some(greeting_text(lang).to_string()),
        file_path: None,
        seen: true,
        created_at: Utc::now().to_rfc3339(),
    }
}

pub fn greeting_text(lang: &str) -> &'static str {
    match lang {
        "ar" => "مرحباً! كيف يمكننا مساعدتك؟",
        "fr" => "Bienvenue ! Comment pouvons-nous vous aider ?",
        _ => "Welcome! How can we help you today?",
    }
}
