//! Account-creation saga: identity, profile row, credit-ledger seed.
//!
//! The steps run strictly in order and are not transactional. Identity
//! creation is the only failure surfaced to the caller; profile and ledger
//! failures are logged and swallowed, leaving an authenticated-but-
//! incomplete account. To make that state repairable instead of silent, the
//! saga records a per-user `ProvisioningStatus` row and `repair` re-runs
//! only the missing steps. All inserts are insert-if-absent, so retries
//! never duplicate identity, profile or ledger rows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::identity::{Identity, IdentityProvider, SignUpRequest};
use crate::ledger::CreditLedger;
use crate::storage::RelationalStore;

use super::profile::Profile;

#[derive(Debug, Clone)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub company: String,
}

/// Workflow record for one account. Step flags flip as inserts land; a row
/// with any flag still false marks an account eligible for `repair`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningStatus {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub company: String,
    pub identity_created: bool,
    pub profile_created: bool,
    pub ledger_created: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProvisioningStatus {
    fn started(identity: &Identity, form: &SignUpForm) -> Self {
        let now = Utc::now();
        Self {
            user_id: identity.id,
            email: identity.email.clone(),
            full_name: form.full_name.clone(),
            company: form.company.clone(),
            identity_created: true,
            profile_created: false,
            ledger_created: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.identity_created && self.profile_created && self.ledger_created
    }
}

pub struct ProvisioningSaga {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn RelationalStore>,
    /// Post-verification landing target embedded at identity creation.
    verify_redirect: String,
}

impl ProvisioningSaga {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn RelationalStore>,
        verify_redirect: impl Into<String>,
    ) -> Self {
        Self { provider, store, verify_redirect: verify_redirect.into() }
    }

    /// Run the full sign-up workflow. A successful return only proves the
    /// identity exists; profile and ledger are best-effort and downstream
    /// readers treat their absence as zero/default.
    pub async fn sign_up(&self, form: &SignUpForm) -> AuthResult<Identity> {
        // Step 1: identity. The only step whose failure aborts the call.
        let req = SignUpRequest {
            email: form.email.clone(),
            password: form.password.clone(),
            metadata: json!({ "full_name": form.full_name, "company": form.company }),
            redirect_to: self.verify_redirect.clone(),
        };
        let identity = self.provider.sign_up(&req).await?;
        info!(user_id = %identity.id, email = %identity.email, "identity created");

        let mut status = ProvisioningStatus::started(&identity, form);
        self.run_remaining_steps(&mut status).await;
        self.persist_status(&status).await;
        Ok(identity)
    }

    /// Re-run the steps a previous sign-up (or repair) left undone.
    /// Step failures keep the logged-and-swallowed policy; callers inspect
    /// the returned status for completeness.
    pub async fn repair(&self, user_id: Uuid) -> AuthResult<ProvisioningStatus> {
        let mut status = self.store.get_status(user_id).await?.ok_or_else(|| {
            AuthError::provisioning("unknown_account", "no provisioning record for user")
        })?;
        if status.is_complete() {
            return Ok(status);
        }
        self.run_remaining_steps(&mut status).await;
        self.persist_status(&status).await;
        Ok(status)
    }

    async fn run_remaining_steps(&self, status: &mut ProvisioningStatus) {
        if !status.profile_created {
            self.provision_profile(status).await;
        }
        if !status.ledger_created {
            self.provision_ledger(status).await;
        }
        status.updated_at = Utc::now();
    }

    /// Step 2: profile row (`phone_number` null, `history` null).
    async fn provision_profile(&self, status: &mut ProvisioningStatus) {
        let profile = Profile::new(status.user_id, &status.full_name, &status.company);
        match self.store.insert_profile(&profile).await {
            // false means the row already existed; either way the step is done
            Ok(_) => status.profile_created = true,
            Err(e) => warn!(user_id = %status.user_id, error = %e, "profile creation failed"),
        }
    }

    /// Steps 3 and 4: settings snapshot, then the ledger seed. The settings
    /// value is policy sampled now, not live-linked.
    async fn provision_ledger(&self, status: &mut ProvisioningStatus) {
        let settings = match self.store.get_settings().await {
            Ok(s) => s,
            Err(e) => {
                warn!(user_id = %status.user_id, error = %e, "settings read failed");
                return;
            }
        };
        let initial = settings.initial_credits();
        let ledger = match CreditLedger::new(status.user_id, initial, 0) {
            Ok(l) => l,
            Err(e) => {
                warn!(user_id = %status.user_id, error = %e, "ledger seed rejected");
                return;
            }
        };
        match self.store.insert_ledger(&ledger).await {
            Ok(inserted) => {
                status.ledger_created = true;
                if inserted {
                    info!(user_id = %status.user_id, credits = initial, "credit ledger seeded");
                }
            }
            Err(e) => warn!(user_id = %status.user_id, error = %e, "credit initialization failed"),
        }
    }

    async fn persist_status(&self, status: &ProvisioningStatus) {
        if let Err(e) = self.store.put_status(status).await {
            warn!(user_id = %status.user_id, error = %e, "provisioning status write failed");
        }
    }
}
