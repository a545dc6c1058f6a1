//! Seam to the external identity provider. The provider's internals
//! (password storage, token signing, email delivery) are opaque to this
//! subsystem; everything goes through the `IdentityProvider` trait.
//!
//! `MemoryIdentityProvider` is the in-process implementation used by tests
//! and local development. Its access tokens carry the user id as a prefix
//! (`{user_id}.{nonce}`) so `set_session` can recover the owner without a
//! token-introspection call.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

use super::model::{Identity, Session};

/// Minimum password length accepted by the provider.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    /// Free-form user metadata attached at account creation
    /// (`full_name`, `company`).
    pub metadata: Value,
    /// Post-verification landing target embedded in the confirmation email.
    pub redirect_to: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, req: &SignUpRequest) -> AuthResult<Identity>;
    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Session>;
    /// Install a session from externally-minted tokens (the exchange
    /// backend or a recovery-link fragment).
    async fn set_session(&self, access_token: &str, refresh_token: &str) -> AuthResult<Session>;
    async fn update_password(&self, session: &Session, new_password: &str) -> AuthResult<()>;
    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> AuthResult<()>;
    async fn sign_out(&self, session: &Session) -> AuthResult<()>;
    async fn get_session(&self) -> AuthResult<Option<Session>>;
    /// Provider-level auth-state feed. Every session install, replacement
    /// and sign-out is published here; `None` means signed out.
    fn subscribe_changes(&self) -> mpsc::UnboundedReceiver<Option<Session>>;
}

struct UserRec {
    id: Uuid,
    password: String,
    email_verified: bool,
    verify_redirect: String,
}

/// In-process provider keyed by normalized (lowercase) email.
#[derive(Default)]
pub struct MemoryIdentityProvider {
    users: RwLock<HashMap<String, UserRec>>,
    current: RwLock<Option<Session>>,
    listeners: RwLock<Vec<mpsc::UnboundedSender<Option<Session>>>>,
    reset_requests: RwLock<Vec<(String, String)>>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint(user_id: Uuid) -> Session {
        Session {
            access_token: format!("{user_id}.{}", Uuid::new_v4()),
            refresh_token: format!("{user_id}.{}", Uuid::new_v4()),
            user_id,
        }
    }

    fn user_id_from_token(token: &str) -> AuthResult<Uuid> {
        token
            .split('.')
            .next()
            .and_then(|p| Uuid::parse_str(p).ok())
            .ok_or_else(|| AuthError::identity("invalid_token", "invalid access token"))
    }

    fn notify(&self, session: Option<Session>) {
        self.listeners.write().retain(|tx| tx.send(session.clone()).is_ok());
    }

    fn install(&self, session: Session) -> Session {
        *self.current.write() = Some(session.clone());
        self.notify(Some(session.clone()));
        session
    }

    /// Reset-email requests recorded as `(email, redirect_to)` pairs, in
    /// order. Lets callers assert delivery without a mail transport.
    pub fn reset_requests(&self) -> Vec<(String, String)> {
        self.reset_requests.read().clone()
    }

    /// Redirect target embedded at sign-up for the given account.
    pub fn verify_redirect_for(&self, email: &str) -> Option<String> {
        self.users.read().get(&email.to_lowercase()).map(|u| u.verify_redirect.clone())
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_up(&self, req: &SignUpRequest) -> AuthResult<Identity> {
        if req.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::validation(
                "password_too_short",
                "password must be at least 6 characters",
            ));
        }
        let key = req.email.trim().to_lowercase();
        let mut users = self.users.write();
        if users.contains_key(&key) {
            return Err(AuthError::identity("duplicate_account", "User already registered"));
        }
        let id = Uuid::new_v4();
        users.insert(
            key.clone(),
            UserRec {
                id,
                password: req.password.clone(),
                email_verified: false,
                verify_redirect: req.redirect_to.clone(),
            },
        );
        Ok(Identity { id, email: key, email_verified: false, created_at: Utc::now() })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Session> {
        let user_id = {
            let users = self.users.read();
            match users.get(&email.trim().to_lowercase()) {
                Some(u) if u.password == password => u.id,
                _ => {
                    return Err(AuthError::identity(
                        "invalid_credentials",
                        "Invalid login credentials",
                    ))
                }
            }
        };
        Ok(self.install(Self::mint(user_id)))
    }

    async fn set_session(&self, access_token: &str, refresh_token: &str) -> AuthResult<Session> {
        let user_id = Self::user_id_from_token(access_token)?;
        Ok(self.install(Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            user_id,
        }))
    }

    async fn update_password(&self, session: &Session, new_password: &str) -> AuthResult<()> {
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::validation(
                "password_too_short",
                "password must be at least 6 characters",
            ));
        }
        let mut users = self.users.write();
        let Some(user) = users.values_mut().find(|u| u.id == session.user_id) else {
            return Err(AuthError::identity("unknown_user", "no account for session"));
        };
        user.password = new_password.to_string();
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> AuthResult<()> {
        // Recorded regardless of account existence; the caller sees a
        // uniform result either way.
        self.reset_requests.write().push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }

    async fn sign_out(&self, _session: &Session) -> AuthResult<()> {
        *self.current.write() = None;
        self.notify(None);
        Ok(())
    }

    async fn get_session(&self) -> AuthResult<Option<Session>> {
        Ok(self.current.read().clone())
    }

    fn subscribe_changes(&self) -> mpsc::UnboundedReceiver<Option<Session>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.write().push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(email: &str, password: &str) -> SignUpRequest {
        SignUpRequest {
            email: email.into(),
            password: password.into(),
            metadata: serde_json::json!({}),
            redirect_to: "http://localhost:8080/".into(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let p = MemoryIdentityProvider::new();
        p.sign_up(&req("a@example.com", "secret1")).await.unwrap();
        let err = p.sign_up(&req("A@Example.com", "secret2")).await.unwrap_err();
        assert_eq!(err.code_str(), "duplicate_account");
    }

    #[tokio::test]
    async fn set_session_recovers_user_id_from_token() {
        let p = MemoryIdentityProvider::new();
        let id = p.sign_up(&req("b@example.com", "secret1")).await.unwrap().id;
        let sess = p.set_session(&format!("{id}.nonce"), &format!("{id}.r")).await.unwrap();
        assert_eq!(sess.user_id, id);
        assert!(p.set_session("garbage", "r").await.is_err());
    }
}
