//! The non-admin side of a conversation, as a tagged union.
//!
//! A conversation is owned by exactly one of: a registered user, a transient
//! web guest, or an anonymous device. Representing the owner this way makes
//! it impossible to build a lookup filter with more than one key set.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    User(String),
    Guest(String),
    Device(String),
}

impl Owner {
    /// The identity string used as the connection-registry key.
    pub fn id(&self) -> &str {
        match self {
            Owner::User(id) | Owner::Guest(id) | Owner::Device(id) => id,
        }
    }

    /// Column values `(user_id, guest_id, device_id)` for inserts and
    /// filters — exactly one is `Some` by construction.
    pub fn columns(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        match self {
            Owner::User(id) => (Some(id), None, None),
            Owner::Guest(id) => (None, Some(id), None),
            Owner::Device(id) => (None, None, Some(id)),
        }
    }

    /// Rebuild the owner from stored columns, rejecting rows that violate
    /// the at-most-one-owner invariant.
    pub fn from_columns(
        user_id: Option<String>,
        guest_id: Option<String>,
        device_id: Option<String>,
    ) -> Result<Self, OwnerError> {
        match (user_id, guest_id, device_id) {
            (Some(id), None, None) => Ok(Owner::User(id)),
            (None, Some(id), None) => Ok(Owner::Guest(id)),
            (None, None, Some(id)) => Ok(Owner::Device(id)),
            (None, None, None) => Err(OwnerError::NoOwner),
            _ => Err(OwnerError::MultipleOwners),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Owner::User(_) => "user",
            Owner::Guest(_) => "guest",
            Owner::Device(_) => "device",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerError {
    NoOwner,
    MultipleOwners,
}

impl fmt::Display for OwnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerError::NoOwner => write!(f, "conversation row has no owner reference"),
            OwnerError::MultipleOwners => {
                write!(f, "conversation row has more than one owner reference")
            }
        }
    }
}

impl std::error::Error for OwnerError {}
