//! Recipient selection for realtime chat events.
//!
//! Wraps message/typing/seen state changes in `ServerEvent`s and pushes them
//! to the right registry partition. Every send here is fire-and-forget and
//! happens only after the durable write has succeeded.

use crate::chat::owner::Owner;
use crate::db::models::MessageRow;
use crate::events::ServerEvent;
use crate::registry::ConnectionRegistry;

fn new_message_event(message: &MessageRow, include_conversation: bool) -> ServerEvent {
    ServerEvent::NewMessage {
        message_id: message.id.clone(),
        conversation_id: include_conversation.then(|| message.conversation_id.clone()),
        media_type: message.media_type.as_str().to_string(),
        text: message.body.clone(),
        file_path: message.file_path.clone(),
        direction: message.direction.as_str().to_string(),
        created_at: message.created_at.clone(),
    }
}

/// Dispatch an event to the conversation owner's partition: registered users
/// live in the user partition, guests and anonymous devices in the guest one.
pub fn send_to_owner(registry: &ConnectionRegistry, owner: &Owner, event: &ServerEvent) -> usize {
    let ids = [owner.id().to_string()];
    match owner {
        Owner::User(_) => registry.send_to_users(&ids, event),
        Owner::Guest(_) | Owner::Device(_) => registry.send_to_guests(&ids, event),
    }
}

/// A question-direction message reaches every connected admin, tagged with
/// its conversation id so dashboards can attribute it.
pub fn message_to_admins(registry: &ConnectionRegistry, message: &MessageRow) -> usize {
    registry.broadcast_to_admins(&new_message_event(message, true))
}

/// An answer-direction message reaches only the conversation's owner.
pub fn message_to_owner(
    registry: &ConnectionRegistry,
    owner: &Owner,
    message: &MessageRow,
) -> usize {
    send_to_owner(registry, owner, &new_message_event(message, false))
}

pub fn typing_to_admins(registry: &ConnectionRegistry, conversation_id: &str) -> usize {
    registry.broadcast_to_admins(&ServerEvent::Typing {
        conversation_id: Some(conversation_id.to_string()),
    })
}

pub fn typing_to_owner(registry: &ConnectionRegistry, owner: &Owner) -> usize {
    send_to_owner(
        registry,
        owner,
        &ServerEvent::Typing {
            conversation_id: None,
        },
    )
}

/// Seen events go to the side that did the seeing, clearing badge state on
/// that side's other connections (admin colleagues, the owner's other tabs).
pub fn seen_to_admins(registry: &ConnectionRegistry, conversation_id: &str) -> usize {
    registry.broadcast_to_admins(&ServerEvent::Seen {
        conversation_id: conversation_id.to_string(),
    })
}

pub fn seen_to_owner(
    registry: &ConnectionRegistry,
    owner: &Owner,
    conversation_id: &str,
) -> usize {
    send_to_owner(
        registry,
        owner,
        &ServerEvent::Seen {
            conversation_id: conversation_id.to_string(),
        },
    )
}
