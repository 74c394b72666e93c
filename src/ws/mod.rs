pub mod actor;
pub mod handler;
pub mod inbound;

use crate::chat::owner::Owner;
use crate::registry::Role;

/// Identity bound to a live connection by the participant resolver.
/// Admins are counterparts to every conversation; everyone else maps to a
/// conversation owner variant.
#[derive(Debug, Clone)]
pub enum Participant {
    Admin { user_id: String },
    Owner(Owner),
}

impl Participant {
    pub fn role(&self) -> Role {
        match self {
            Participant::Admin { .. } => Role::Admin,
            Participant::Owner(Owner::User(_)) => Role::User,
            Participant::Owner(_) => Role::Guest,
        }
    }

    pub fn identity(&self) -> &str {
        match self {
            Participant::Admin { user_id } => user_id,
            Participant::Owner(owner) => owner.id(),
        }
    }
}
