//! User profile records with an append-only change history. Every update
//! pushes the pre-update snapshot before applying new values, so the history
//! never shrinks and reads back in write order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthResult;
use crate::storage::RelationalStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub full_name: String,
    pub company: String,
    pub phone_number: Option<String>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub full_name: String,
    pub company: String,
    pub phone_number: Option<String>,
    /// `None` until the first update; the sign-up saga inserts it null.
    pub history: Option<Vec<ProfileSnapshot>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Fresh row as inserted by the sign-up saga: no phone, no history.
    pub fn new(user_id: Uuid, full_name: impl Into<String>, company: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            full_name: full_name.into(),
            company: company.into(),
            phone_number: None,
            history: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            full_name: self.full_name.clone(),
            company: self.company.clone(),
            phone_number: self.phone_number.clone(),
            saved_at: Utc::now(),
        }
    }
}

/// Fields a settings edit may change. `None` leaves the current value.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub company: Option<String>,
    pub phone_number: Option<String>,
}

pub struct ProfileService {
    store: Arc<dyn RelationalStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self { store }
    }

    /// Absent is not an error; the account may be mid-provisioning.
    pub async fn get_profile(&self, user_id: Uuid) -> AuthResult<Option<Profile>> {
        self.store.get_profile(user_id).await
    }

    /// Apply a settings edit. When a row exists, its pre-update state is
    /// pushed onto the history (exactly one snapshot per call) before the
    /// new values land; when it does not, the row is created fresh with an
    /// empty history.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        changes: ProfileChanges,
    ) -> AuthResult<Profile> {
        let updated = match self.store.get_profile(user_id).await? {
            Some(old) => {
                let mut history = old.history.clone().unwrap_or_default();
                history.push(old.snapshot());
                Profile {
                    user_id,
                    full_name: changes.full_name.unwrap_or(old.full_name),
                    company: changes.company.unwrap_or(old.company),
                    phone_number: changes.phone_number.or(old.phone_number),
                    history: Some(history),
                    created_at: old.created_at,
                    updated_at: Utc::now(),
                }
            }
            None => {
                let mut p = Profile::new(
                    user_id,
                    changes.full_name.unwrap_or_default(),
                    changes.company.unwrap_or_default(),
                );
                p.phone_number = changes.phone_number;
                p
            }
        };
        self.store.upsert_profile(&updated).await?;
        Ok(updated)
    }
}
