//! Credential exchange against the external auth backend.
//!
//! Two wire operations: interactive sign-in (credentials for a session pair
//! plus an internal JWT) and token exchange (internal JWT for a fresh
//! session pair, used by out-of-band surfaces). The client performs no
//! local validation of the internal JWT; freshness and scope are the
//! server's responsibility.

use std::sync::Arc;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{AuthError, AuthResult};
use crate::storage::{TokenVault, INTERNAL_JWT_KEY};

use super::model::Session;
use super::provider::IdentityProvider;
use super::session_store::SessionStore;

pub const LOGIN_PATH: &str = "/api/auth_app/login/";
pub const EXCHANGE_PATH: &str = "/api/auth_app/get_temp_session/";

#[derive(Debug, Clone, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Interactive-login response: provider session tokens plus the internal
/// JWT reused later by out-of-band surfaces.
#[derive(Debug, Deserialize)]
pub struct LoginExchange {
    #[serde(rename = "supabase_session")]
    pub session: SessionTokens,
    pub jwt: String,
}

#[derive(Debug, Deserialize)]
struct TempSessionResponse {
    #[serde(rename = "supabase_session")]
    session: SessionTokens,
}

/// Thin HTTP client over the two exchange endpoints. Shared by the
/// in-process service and the out-of-band CLI.
#[derive(Clone)]
pub struct ExchangeClient {
    client: reqwest::Client,
    base: Url,
}

impl ExchangeClient {
    pub fn new(base: &str) -> AuthResult<Self> {
        let base = Url::parse(base).map_err(|e| AuthError::internal("bad_backend_url", e.to_string()))?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, base })
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginExchange> {
        let url = self.join(LOGIN_PATH)?;
        let resp = self
            .client
            .post(url)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        Self::read(resp, "Login failed").await
    }

    pub async fn exchange(&self, internal_jwt: &str) -> AuthResult<SessionTokens> {
        let url = self.join(EXCHANGE_PATH)?;
        let resp = self.client.post(url).json(&json!({ "jwt": internal_jwt })).send().await?;
        let body: TempSessionResponse = Self::read(resp, "Failed to retrieve session").await?;
        Ok(body.session)
    }

    fn join(&self, path: &str) -> AuthResult<Url> {
        self.base.join(path).map_err(|e| AuthError::internal("bad_endpoint", e.to_string()))
    }

    /// Non-2xx responses surface the server's `error` string verbatim;
    /// a 2xx with an unparseable body is treated as a malformed response.
    async fn read<T: DeserializeOwned>(resp: reqwest::Response, fallback: &str) -> AuthResult<T> {
        let status = resp.status();
        if !status.is_success() {
            let body: Value = resp.json().await.unwrap_or_else(|_| json!({}));
            let msg = body
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or(fallback)
                .to_string();
            return Err(AuthError::identity("exchange_rejected", msg));
        }
        resp.json::<T>()
            .await
            .map_err(|e| AuthError::internal("bad_response", e.to_string()))
    }
}

/// Sign-in and token-exchange flows wired into the session store, provider
/// and token vault.
pub struct CredentialExchangeService {
    client: ExchangeClient,
    provider: Arc<dyn IdentityProvider>,
    store: Arc<SessionStore>,
    vault: Arc<dyn TokenVault>,
}

impl CredentialExchangeService {
    pub fn new(
        client: ExchangeClient,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<SessionStore>,
        vault: Arc<dyn TokenVault>,
    ) -> Self {
        Self { client, provider, store, vault }
    }

    /// Interactive sign-in. On success the internal JWT lands in durable
    /// storage and the fresh session is installed; on failure the session
    /// store is left untouched.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        info!(email, "interactive sign-in");
        let body = self.client.login(email, password).await?;
        self.vault.put(INTERNAL_JWT_KEY, &body.jwt).await?;
        self.install(&body.session).await
    }

    /// Token exchange ("auto sign-in"): trade a stored internal JWT for a
    /// fresh session pair.
    pub async fn auto_sign_in(&self, internal_jwt: &str) -> AuthResult<Session> {
        info!("token exchange");
        let tokens = self.client.exchange(internal_jwt).await?;
        self.install(&tokens).await
    }

    /// Exchange using the vault-held JWT, if any.
    pub async fn auto_sign_in_from_vault(&self) -> AuthResult<Session> {
        let Some(jwt) = self.vault.get(INTERNAL_JWT_KEY).await? else {
            return Err(AuthError::identity("no_internal_jwt", "no stored credential to exchange"));
        };
        self.auto_sign_in(&jwt).await
    }

    async fn install(&self, tokens: &SessionTokens) -> AuthResult<Session> {
        let session = match self
            .provider
            .set_session(&tokens.access_token, &tokens.refresh_token)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "installing exchanged session failed");
                return Err(e);
            }
        };
        self.store.apply(Some(session.clone()));
        Ok(session)
    }
}
