//! Password lifecycle: forgot, reset, change.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AuthError, AuthResult};

use super::provider::{IdentityProvider, MIN_PASSWORD_LEN};
use super::session_store::SessionStore;

pub struct PasswordLifecycleManager {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<SessionStore>,
    /// Landing target embedded in reset emails.
    reset_redirect: String,
}

impl PasswordLifecycleManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<SessionStore>,
        reset_redirect: impl Into<String>,
    ) -> Self {
        Self { provider, store, reset_redirect: reset_redirect.into() }
    }

    /// Trigger the provider's reset-email flow. The result is uniform: the
    /// caller cannot distinguish "email sent" from "no such account", so
    /// this path does not leak account existence. Only transport failures
    /// propagate.
    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        match self.provider.reset_password_for_email(email, &self.reset_redirect).await {
            Ok(()) => Ok(()),
            Err(e @ AuthError::Network { .. }) => Err(e),
            Err(e) => {
                warn!(error = %e, "reset-email request swallowed");
                Ok(())
            }
        }
    }

    /// Update the password on the active recovery session. The reset
    /// landing page installs that session from the URL-fragment tokens
    /// before calling this; without one there is nothing to update.
    pub async fn reset_password(&self, new_password: &str) -> AuthResult<()> {
        validate_password(new_password)?;
        let Some(session) = self.store.current() else {
            return Err(AuthError::identity("no_recovery_session", "no active recovery session"));
        };
        self.provider.update_password(&session, new_password).await?;
        info!(user_id = %session.user_id, "password reset via recovery session");
        Ok(())
    }

    /// Verify the old password with an interactive sign-in, then update.
    /// Fails closed: a bad old password performs no update. The
    /// verification sign-in replaces the caller's active session with a
    /// newly issued one for the same user.
    pub async fn change_password(
        &self,
        email: &str,
        old_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        validate_password(new_password)?;
        let session = self
            .provider
            .sign_in_with_password(email, old_password)
            .await
            .map_err(|_| AuthError::identity("old_password_incorrect", "Old password is incorrect."))?;
        self.store.apply(Some(session.clone()));
        self.provider.update_password(&session, new_password).await?;
        info!(user_id = %session.user_id, "password changed");
        Ok(())
    }
}

fn validate_password(password: &str) -> AuthResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::validation(
            "password_too_short",
            "password must be at least 6 characters",
        ));
    }
    Ok(())
}
