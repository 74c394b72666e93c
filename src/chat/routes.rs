//! REST endpoints for the chat core: send question/answer, paged listing
//! with the bulk seen side effect, badges, markAllSeen, typing, and the
//! admin conversation dashboard.
//!
//! Every handler persists first and fans out after — a failed or skipped
//! push is invisible here because badges are computed from durable state.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::{self, ApiResponse};
use crate::auth::middleware::{Claims, OptionalClaims};
use crate::chat::owner::Owner;
use crate::chat::{fanout, store};
use crate::db::models::{Direction, MediaType, MessageBody, MessageRow};
use crate::state::AppState;
use crate::ws::{inbound, Participant};

// --- Request / Response types ---

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub device_id: Option<String>,
    pub guest_id: Option<String>,
    pub text: Option<String>,
    pub file_path: Option<String>,
    pub media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub text: Option<String>,
    pub file_path: Option<String>,
    pub media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub lang: Option<String>,
    pub device_id: Option<String>,
    pub guest_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdentityQuery {
    pub device_id: Option<String>,
    pub guest_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkSeenRequest {
    pub conversation_id: Option<String>,
    pub device_id: Option<String>,
    pub guest_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TypingRequest {
    pub conversation_id: Option<String>,
    pub device_id: Option<String>,
    pub guest_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
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

impl From<MessageRow> for MessageResponse {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            direction: row.direction,
            media_type: row.media_type,
            body: row.body,
            file_path: row.file_path,
            seen: row.seen,
            created_at: row.created_at,
        }
    }
}

// --- Caller classification ---

/// Who is making the REST call: an admin, or one of the three owner kinds.
#[derive(Debug, Clone)]
enum Viewer {
    Admin,
    Owner(Owner),
}

enum ViewerRejection {
    Unauthorized,
    Message(&'static str),
}

/// Resolve the caller from claims first, then device id, then guest id.
/// Mirrors the WebSocket resolver's priority order.
async fn resolve_viewer(
    state: &AppState,
    claims: Option<Claims>,
    device_id: Option<String>,
    guest_id: Option<String>,
) -> Result<Viewer, ViewerRejection> {
    if let Some(claims) = claims {
        if claims.is_admin() {
            return Ok(Viewer::Admin);
        }
        return Ok(Viewer::Owner(Owner::User(claims.sub)));
    }

    if let Some(device_id) = device_id.filter(|d| !d.is_empty()) {
        return Ok(Viewer::Owner(Owner::Device(device_id)));
    }

    if let Some(guest_id) = guest_id.filter(|g| !g.is_empty()) {
        let db = state.db.clone();
        let gid = guest_id.clone();
        let exists = tokio::task::spawn_blocking(move || {
            let conn = db.lock().ok()?;
            conn.query_row(
                "SELECT COUNT(*) FROM guests WHERE id = ?1",
                rusqlite::params![gid],
                |row| row.get::<_, i64>(0),
            )
            .ok()
        })
        .await
        .ok()
        .flatten()
        .unwrap_or(0)
            > 0;

        if exists {
            return Ok(Viewer::Owner(Owner::Guest(guest_id)));
        }
        return Err(ViewerRejection::Message("Unknown guest session"));
    }

    Err(ViewerRejection::Unauthorized)
}

fn parse_media(media_type: Option<String>) -> Result<MediaType, &'static str> {
    match media_type {
        None => Ok(MediaType::Text),
        Some(s) => MediaType::from_str(&s).ok_or("Unknown media type"),
    }
}

// --- Handlers ---

/// POST /api/chat/messages — a participant sends a question-direction
/// message. The conversation is created lazily on first send.
pub async fn send_message(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let owner = match resolve_viewer(&state, claims, body.device_id, body.guest_id).await {
        Ok(Viewer::Owner(owner)) => owner,
        Ok(Viewer::Admin) => return Ok(api::fail("Admins answer inside a conversation")),
        Err(ViewerRejection::Unauthorized) => return Err(StatusCode::UNAUTHORIZED),
        Err(ViewerRejection::Message(m)) => return Ok(api::fail(m)),
    };

    let media = match parse_media(body.media_type) {
        Ok(media) => media,
        Err(m) => return Ok(api::fail(m)),
    };
    let message_body = match MessageBody::new(media, body.text, body.file_path) {
        Ok(b) => b,
        Err(e) => return Ok(api::fail(&e.to_string())),
    };

    let db = state.db.clone();
    let owner_for_write = owner.clone();
    let message: MessageRow = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        let conversation = store::find_or_create_conversation(&conn, &owner_for_write)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        // Sender is recorded only for registered-user authors
        let sender = match &owner_for_write {
            Owner::User(id) => Some(id.as_str()),
            _ => None,
        };
        store::append_message(
            &conn,
            &conversation.id,
            Direction::Question,
            sender,
            media,
            &message_body,
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    // Write is durable; push is advisory
    fanout::message_to_admins(&state.registry, &message);

    Ok(api::ok(json!({ "message": MessageResponse::from(message) })))
}

/// POST /api/chat/conversations/{id}/answer — an admin sends an
/// answer-direction message to the conversation's owner.
pub async fn send_answer(
    State(state): State<AppState>,
    claims: Claims,
    Path(conversation_id): Path<String>,
    Json(body): Json<AnswerRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    if !claims.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }

    let media = match parse_media(body.media_type) {
        Ok(media) => media,
        Err(m) => return Ok(api::fail(m)),
    };
    let message_body = match MessageBody::new(media, body.text, body.file_path) {
        Ok(b) => b,
        Err(e) => return Ok(api::fail(&e.to_string())),
    };

    let db = state.db.clone();
    let cid = conversation_id.clone();
    let sender = claims.sub.clone();
    let result: Result<(Owner, MessageRow), &'static str> =
        tokio::task::spawn_blocking(move || -> Result<Result<(Owner, MessageRow), &'static str>, StatusCode> {
            let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            let Some(conversation) = store::get_conversation(&conn, &cid)
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            else {
                return Ok(Err("Conversation not found"));
            };
            let Ok(owner) = conversation.owner() else {
                return Ok(Err("Conversation owner is invalid"));
            };
            let message = store::append_message(
                &conn,
                &conversation.id,
                Direction::Answer,
                Some(&sender),
                media,
                &message_body,
            )
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            Ok(Ok((owner, message)))
        })
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    let (owner, message) = match result {
        Ok(pair) => pair,
        Err(m) => return Ok(api::fail(m)),
    };

    fanout::message_to_owner(&state.registry, &owner, &message);

    Ok(api::ok(json!({ "message": MessageResponse::from(message) })))
}

/// GET /api/chat/conversations/{id}/messages — paged listing, newest first.
/// Listing marks the counterpart direction's unseen messages seen and tells
/// the viewer's side about the flip.
pub async fn list_messages(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Path(conversation_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let viewer = match resolve_viewer(&state, claims, query.device_id, query.guest_id).await {
        Ok(viewer) => viewer,
        Err(ViewerRejection::Unauthorized) => return Err(StatusCode::UNAUTHORIZED),
        Err(ViewerRejection::Message(m)) => return Ok(api::fail(m)),
    };

    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(store::DEFAULT_LIMIT);
    let lang = query.lang.unwrap_or_else(|| state.default_language.clone());

    let db = state.db.clone();
    let cid = conversation_id.clone();
    let viewer_for_read = viewer.clone();
    let result: Result<(Owner, usize, store::MessagePage), &'static str> =
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            let Some(conversation) = store::get_conversation(&conn, &cid)
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            else {
                return Ok(Err("Conversation not found"));
            };
            let Ok(owner) = conversation.owner() else {
                return Ok(Err("Conversation owner is invalid"));
            };

            let mark_direction = match &viewer_for_read {
                Viewer::Admin => Direction::Question,
                Viewer::Owner(caller) => {
                    if *caller != owner {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    Direction::Answer
                }
            };

            // A rejected page request must not touch seen state, so the page
            // is validated before the counterpart's unseen messages flip
            let mut listing = match store::list_page(&conn, &conversation.id, page, limit, &lang)
            {
                Ok(listing) => listing,
                Err(store::PageError::OutOfRange) => return Ok(Err("Page out of range")),
                Err(store::PageError::Db(_)) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
            };
            let flipped = store::mark_seen(&conn, &conversation.id, mark_direction)
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            if flipped > 0 {
                for message in &mut listing.messages {
                    if message.direction == mark_direction {
                        message.seen = true;
                    }
                }
            }
            Ok(Ok((owner, flipped, listing)))
        })
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    let (owner, flipped, page) = match result {
        Ok(triple) => triple,
        Err(m) => return Ok(api::fail(m)),
    };

    if flipped > 0 {
        match viewer {
            Viewer::Admin => fanout::seen_to_admins(&state.registry, &conversation_id),
            Viewer::Owner(_) => fanout::seen_to_owner(&state.registry, &owner, &conversation_id),
        };
    }

    let messages: Vec<MessageResponse> =
        page.messages.into_iter().map(MessageResponse::from).collect();
    Ok(api::ok(json!({
        "messages": messages,
        "pagesLeft": page.pages_left,
        "total": page.total,
    })))
}

/// GET /api/chat/messages — the participant view of their own thread.
/// Creates the conversation lazily so an empty thread still greets.
pub async fn list_own_messages(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let owner = match resolve_viewer(&state, claims, query.device_id, query.guest_id).await {
        Ok(Viewer::Owner(owner)) => owner,
        Ok(Viewer::Admin) => return Ok(api::fail("Admins list a conversation by id")),
        Err(ViewerRejection::Unauthorized) => return Err(StatusCode::UNAUTHORIZED),
        Err(ViewerRejection::Message(m)) => return Ok(api::fail(m)),
    };

    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(store::DEFAULT_LIMIT);
    let lang = query.lang.unwrap_or_else(|| state.default_language.clone());

    let db = state.db.clone();
    let owner_for_read = owner.clone();
    let result: Result<(String, usize, store::MessagePage), &'static str> =
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            let conversation = store::find_or_create_conversation(&conn, &owner_for_read)
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            let mut listing = match store::list_page(&conn, &conversation.id, page, limit, &lang)
            {
                Ok(listing) => listing,
                Err(store::PageError::OutOfRange) => return Ok(Err("Page out of range")),
                Err(store::PageError::Db(_)) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
            };
            let flipped = store::mark_seen(&conn, &conversation.id, Direction::Answer)
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            if flipped > 0 {
                for message in &mut listing.messages {
                    if message.direction == Direction::Answer {
                        message.seen = true;
                    }
                }
            }
            Ok(Ok((conversation.id, flipped, listing)))
        })
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    let (conversation_id, flipped, page) = match result {
        Ok(triple) => triple,
        Err(m) => return Ok(api::fail(m)),
    };

    if flipped > 0 {
        fanout::seen_to_owner(&state.registry, &owner, &conversation_id);
    }

    let messages: Vec<MessageResponse> =
        page.messages.into_iter().map(MessageResponse::from).collect();
    Ok(api::ok(json!({
        "conversationId": conversation_id,
        "messages": messages,
        "pagesLeft": page.pages_left,
        "total": page.total,
    })))
}

/// GET /api/chat/badge — unseen counts computed from durable state, never
/// from registry/connection state.
pub async fn get_badge(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Query(query): Query<IdentityQuery>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let viewer = match resolve_viewer(&state, claims, query.device_id, query.guest_id).await {
        Ok(viewer) => viewer,
        Err(ViewerRejection::Unauthorized) => return Err(StatusCode::UNAUTHORIZED),
        Err(ViewerRejection::Message(m)) => return Ok(api::fail(m)),
    };

    let db = state.db.clone();
    let badge: i64 = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        match viewer {
            Viewer::Admin => store::admin_unseen_conversation_count(&conn)
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR),
            Viewer::Owner(owner) => {
                let conversation = store::find_conversation_by_owner(&conn, &owner)
                    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
                match conversation {
                    Some(conversation) => {
                        store::unseen_count(&conn, &conversation.id, Direction::Answer)
                            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
                    }
                    None => Ok(0),
                }
            }
        }
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(api::ok(json!({ "badge": badge })))
}

/// POST /api/chat/seen — markAllSeen for the caller's perspective.
pub async fn mark_all_seen(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Json(body): Json<MarkSeenRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let viewer = match resolve_viewer(&state, claims, body.device_id, body.guest_id).await {
        Ok(viewer) => viewer,
        Err(ViewerRejection::Unauthorized) => return Err(StatusCode::UNAUTHORIZED),
        Err(ViewerRejection::Message(m)) => return Ok(api::fail(m)),
    };

    let db = state.db.clone();
    let viewer_for_write = viewer.clone();
    let conversation_id = body.conversation_id.clone();
    let result: Result<(Option<Owner>, String, usize), &'static str> =
        tokio::task::spawn_blocking(move || -> Result<Result<(Option<Owner>, String, usize), &'static str>, StatusCode> {
            let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            match viewer_for_write {
                Viewer::Admin => {
                    let Some(cid) = conversation_id else {
                        return Ok(Err("conversation_id is required"));
                    };
                    let Some(conversation) = store::get_conversation(&conn, &cid)
                        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
                    else {
                        return Ok(Err("Conversation not found"));
                    };
                    let flipped = store::mark_seen(&conn, &conversation.id, Direction::Question)
                        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
                    Ok(Ok((None, conversation.id, flipped)))
                }
                Viewer::Owner(owner) => {
                    let Some(conversation) = store::find_conversation_by_owner(&conn, &owner)
                        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
                    else {
                        return Ok(Err("No conversation yet"));
                    };
                    let flipped = store::mark_seen(&conn, &conversation.id, Direction::Answer)
                        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
                    Ok(Ok((Some(owner), conversation.id, flipped)))
                }
            }
        })
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    let (owner, conversation_id, flipped) = match result {
        Ok(triple) => triple,
        Err(m) => return Ok(api::fail(m)),
    };

    if flipped > 0 {
        match owner {
            None => fanout::seen_to_admins(&state.registry, &conversation_id),
            Some(owner) => fanout::seen_to_owner(&state.registry, &owner, &conversation_id),
        };
    }

    Ok(api::ok(json!({ "updated": flipped })))
}

/// POST /api/chat/typing — REST mirror of the realtime typing event.
pub async fn send_typing(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Json(body): Json<TypingRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let participant = match resolve_viewer(&state, claims.clone(), body.device_id, body.guest_id)
        .await
    {
        Ok(Viewer::Admin) => Participant::Admin {
            // resolve_viewer only returns Admin for authenticated claims
            user_id: claims.map(|c| c.sub).unwrap_or_default(),
        },
        Ok(Viewer::Owner(owner)) => Participant::Owner(owner),
        Err(ViewerRejection::Unauthorized) => return Err(StatusCode::UNAUTHORIZED),
        Err(ViewerRejection::Message(m)) => return Ok(api::fail(m)),
    };

    inbound::handle_typing(&state, &participant, body.conversation_id).await;

    Ok(api::ok(json!({})))
}

/// GET /api/chat/conversations — admin dashboard listing, most recent
/// activity first, with unseen question counts.
pub async fn list_conversations(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<ApiResponse>, StatusCode> {
    if !claims.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }

    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        store::list_conversations(&conn).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    let conversations: Vec<serde_json::Value> = rows
        .into_iter()
        .filter_map(|(row, unseen)| match row.owner() {
            Ok(owner) => Some(json!({
                "id": row.id,
                "ownerKind": owner.kind(),
                "ownerId": owner.id(),
                "messageCount": row.message_count,
                "lastActivityAt": row.last_activity_at,
                "unseenQuestions": unseen,
            })),
            Err(e) => {
                tracing::warn!(conversation = %row.id, error = %e, "skipping invalid conversation row");
                None
            }
        })
        .collect();

    Ok(api::ok(json!({ "conversations": conversations })))
}
