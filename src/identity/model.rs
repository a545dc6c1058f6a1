use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable provider-issued account record. Immutable from this subsystem's
/// view except for the verification flag, which flips when the user follows
/// the emailed link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Short-lived access/refresh token pair. Replaced wholesale on
/// sign-in/refresh/sign-out, never field-mutated; equality is structural so
/// the session store can detect and drop duplicate applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Uuid,
}

/// Session lifecycle states. `Unknown` lasts until the first listener or
/// fetch event lands; after that the store only moves between `Anonymous`
/// and `Authenticated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unknown,
    Anonymous,
    Authenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }
}
