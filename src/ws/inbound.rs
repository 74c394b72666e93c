//! Dispatch for client-originated realtime events (typing, seen).
//!
//! Frames that fail to parse are logged and dropped; every fan-out here is
//! best-effort against whatever registry entries happen to be live.

use crate::chat::{fanout, owner::Owner, store};
use crate::db::models::{ConversationRow, MessageRow};
use crate::events::ClientEvent;
use crate::state::AppState;
use crate::ws::Participant;

pub async fn handle_client_frame(text: &str, state: &AppState, who: &Participant) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable client frame");
            return;
        }
    };

    match event {
        ClientEvent::Typing {
            conversation_id, ..
        } => handle_typing(state, who, conversation_id).await,
        ClientEvent::Seen { message_id } => handle_seen(state, who, &message_id).await,
    }
}

async fn load_conversation(state: &AppState, conversation_id: &str) -> Option<ConversationRow> {
    let db = state.db.clone();
    let cid = conversation_id.to_string();
    tokio::task::spawn_blocking(move || {
        let conn = db.lock().ok()?;
        store::get_conversation(&conn, &cid).ok().flatten()
    })
    .await
    .ok()
    .flatten()
}

async fn find_own_conversation(state: &AppState, owner: &Owner) -> Option<ConversationRow> {
    let db = state.db.clone();
    let owner = owner.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db.lock().ok()?;
        store::find_conversation_by_owner(&conn, &owner).ok().flatten()
    })
    .await
    .ok()
    .flatten()
}

/// Typing from an admin reaches the conversation's owner; typing from a
/// participant reaches every connected admin. Also backs the REST typing
/// endpoint.
pub async fn handle_typing(
    state: &AppState,
    who: &Participant,
    conversation_id: Option<String>,
) {
    match who {
        Participant::Admin { .. } => {
            let Some(cid) = conversation_id else { return };
            let Some(conversation) = load_conversation(state, &cid).await else {
                return;
            };
            match conversation.owner() {
                Ok(owner) => {
                    fanout::typing_to_owner(&state.registry, &owner);
                }
                Err(e) => {
                    tracing::warn!(conversation = %conversation.id, error = %e, "owner invariant violated");
                }
            }
        }
        Participant::Owner(owner) => {
            let conversation = match conversation_id {
                Some(cid) => load_conversation(state, &cid).await,
                None => find_own_conversation(state, owner).await,
            };
            if let Some(conversation) = conversation {
                fanout::typing_to_admins(&state.registry, &conversation.id);
            }
        }
    }
}

/// Seen acknowledgment for a single message: flip the flag and tell the
/// seer's own side so its other connections clear their badge state.
async fn handle_seen(state: &AppState, who: &Participant, message_id: &str) {
    let db = state.db.clone();
    let mid = message_id.to_string();
    let message: Option<MessageRow> = tokio::task::spawn_blocking(move || {
        let conn = db.lock().ok()?;
        let message = store::get_message(&conn, &mid).ok().flatten()?;
        store::mark_message_seen(&conn, &mid).ok()?;
        Some(message)
    })
    .await
    .ok()
    .flatten();

    let Some(message) = message else { return };

    match who {
        Participant::Admin { .. } => {
            fanout::seen_to_admins(&state.registry, &message.conversation_id);
        }
        Participant::Owner(owner) => {
            fanout::seen_to_owner(&state.registry, owner, &message.conversation_id);
        }
    }
}
