//! Actor and request context models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of the staff member issuing a command
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    #[default]
    Staff,
    Manager,
    Admin,
}

impl ActorRole {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "staff" => Some(ActorRole::Staff),
            "manager" => Some(ActorRole::Manager),
            "admin" => Some(ActorRole::Admin),
            _ => None,
        }
    }

    /// Managers and admins may override deposit checks and apply discounts. They
    /// also run the overdue sweep.
    pub fn can_override(&self) -> bool {
        matches!(self, ActorRole::Manager | ActorRole::Admin)
    }
}

/// Who is calling the engine. Passed explicitly with every command; the
/// engine keeps no session state of its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestContext {
    pub actor_id: Uuid,
    pub actor_name: String,
    pub role: ActorRole,
}

impl RequestContext {
    pub fn new(actor_id: Uuid, actor_name: impl Into<String>, role: ActorRole) -> Self {
        Self {
            actor_id,
            actor_name: actor_name.into(),
            role,
        }
    }

    /// Context used by scheduled jobs such as the overdue sweep
    pub fn system() -> Self {
        Self::new(Uuid::nil(), "system", ActorRole::Admin)
    }
}
