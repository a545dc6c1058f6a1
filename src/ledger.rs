//! Per-user credit ledger: the balance record every other surface reads,
//! plus the settings snapshot that seeds it at sign-up.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::storage::RelationalStore;

/// Singleton policy row, read-only from this subsystem. The value sampled
/// at sign-up seeds the new ledger; later settings edits do not back-apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub free_credits_enabled: bool,
    pub free_credit_amount: i64,
}

impl Settings {
    pub fn initial_credits(&self) -> i64 {
        if self.free_credits_enabled {
            self.free_credit_amount.max(0)
        } else {
            0
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self { free_credits_enabled: false, free_credit_amount: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLedger {
    pub user_id: Uuid,
    pub total_credits: i64,
    pub used_credits: i64,
    pub remaining_credits: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CreditLedger {
    /// Checked constructor: all fields non-negative and
    /// `remaining == total - used`. The only way ledgers are built here.
    pub fn new(user_id: Uuid, total_credits: i64, used_credits: i64) -> AuthResult<Self> {
        if total_credits < 0 || used_credits < 0 {
            return Err(AuthError::validation("negative_credits", "credit fields must be >= 0"));
        }
        if used_credits > total_credits {
            return Err(AuthError::validation(
                "overdrawn_ledger",
                "used credits exceed total credits",
            ));
        }
        let now = Utc::now();
        Ok(Self {
            user_id,
            total_credits,
            used_credits,
            remaining_credits: total_credits - used_credits,
            created_at: now,
            updated_at: now,
        })
    }

    /// Zero ledger used whenever the row has not been created yet (the
    /// window between identity creation and ledger insert).
    pub fn empty(user_id: Uuid) -> Self {
        // new() cannot fail for (0, 0)
        Self::new(user_id, 0, 0).expect("zero ledger is always valid")
    }
}

/// Read path shared by every surface that displays credits. No caching or
/// locking: all mutation happens server-side and reads are eventually
/// consistent.
pub struct CreditLedgerReader {
    store: Arc<dyn RelationalStore>,
}

impl CreditLedgerReader {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self { store }
    }

    /// A missing row is not an error: callers get a zero ledger.
    pub async fn get_credits(&self, user_id: Uuid) -> AuthResult<CreditLedger> {
        Ok(self
            .store
            .get_ledger(user_id)
            .await?
            .unwrap_or_else(|| CreditLedger::empty(user_id)))
    }
}
