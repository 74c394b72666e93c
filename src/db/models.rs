/// Row types and value enums for the SQLite schema defined in migrations.rs.
use serde::{Deserialize, Serialize};

use crate::chat::owner::{Owner, OwnerError};

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_SUPER_ADMIN: &str = "superAdmin";

pub fn is_admin_role(role: &str) -> bool {
    role == ROLE_ADMIN || role == ROLE_SUPER_ADMIN
}

/// Conversation thread between one non-admin owner and the admin pool.
#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: String,
    pub user_id: Option<String>,
    pub guest_id: Option<String>,
    pub device_id: Option<String>,
    pub message_count: i64,
    pub last_activity_at: String,
    pub created_at: String,
}

impl ConversationRow {
    /// The owner union, rejecting rows that violate the one-owner invariant.
    pub fn owner(&self) -> Result<Owner, OwnerError> {
        Owner::from_columns(
            self.user_id.clone(),
            self.guest_id.clone(),
            self.device_id.clone(),
        )
    }
}

/// Who authored a message: "question" = the conversation owner,
/// "answer" = an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Question,
    Answer,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Question => "question",
            Direction::Answer => "answer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "question" => Some(Direction::Question),
            "answer" => Some(Direction::Answer),
            _ => None,
        }
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Text,
    Photo,
    Audio,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Text => "text",
            MediaType::Photo => "photo",
            MediaType::Audio => "audio",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MediaType::Text),
            "photo" => Some(MediaType::Photo),
            "audio" => Some(MediaType::Audio),
            _ => None,
        }
    }
}

/// Message content: exactly one of a text body or an attached file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    File(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyError {
    /// Both a text body and a file were supplied.
    Both,
    /// Neither a non-empty text body nor a file was supplied.
    Neither,
    /// The body kind does not match the declared media type.
    MediaMismatch,
}

impl std::fmt::Display for BodyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodyError::Both => write!(f, "message cannot carry both text and a file"),
            BodyError::Neither => write!(f, "message needs either text or a file"),
            BodyError::MediaMismatch => {
                write!(f, "message content does not match its media type")
            }
        }
    }
}

impl std::error::Error for BodyError {}

impl MessageBody {
    /// Validate the exclusive-body invariant before anything is persisted:
    /// text media carries a non-empty body, photo/audio carry a file path.
    pub fn new(
        media: MediaType,
        text: Option<String>,
        file_path: Option<String>,
    ) -> Result<Self, BodyError> {
        let text = text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        let file_path = file_path.filter(|f| !f.is_empty());
        match (text, file_path) {
            (Some(_), Some(_)) => Err(BodyError::Both),
            (None, None) => Err(BodyError::Neither),
            (Some(t), None) if media == MediaType::Text => Ok(MessageBody::Text(t)),
            (None, Some(f)) if media != MediaType::Text => Ok(MessageBody::File(f)),
            _ => Err(BodyError::MediaMismatch),
        }
    }

    /// Column values `(body, file_path)`.
    pub fn columns(&self) -> (Option<&str>, Option<&str>) {
        match self {
            MessageBody::Text(t) => (Some(t), None),
            MessageBody::File(f) => (None, Some(f)),
        }
    }
}

/// Message record in the messages table.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: Option<String>,
    pub direction: Direction,
    pub media_type: MediaType,
    pub body: Option<String>,
    pub file_path: Option<String>,
    pub seen: bool,
    pub created_at: String,
}

