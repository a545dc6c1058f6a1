//! Environment-driven configuration, read once at startup.

use std::path::PathBuf;

use reqwest::Url;

use crate::error::{AuthError, AuthResult};

/// Default exchange backend; overridable via `ECHO_BACKEND_URL`.
pub const DEFAULT_BACKEND_URL: &str = "https://socialinsightbackend.onrender.com";
/// Default redirect origin embedded in verification/reset emails.
pub const DEFAULT_REDIRECT_URL: &str = "http://localhost:8080";
/// Default on-disk location of the token vault.
pub const DEFAULT_VAULT_PATH: &str = "echo_vault.json";

#[derive(Debug, Clone)]
pub struct EchoConfig {
    /// Base URL of the credential-exchange backend.
    pub backend_url: String,
    /// Origin used to build `emailRedirectTo`-style targets (sign-up
    /// verification lands on `{redirect_url}/`, password reset on
    /// `{redirect_url}/reset-password`).
    pub redirect_url: String,
    /// Durable client storage for the internal JWT.
    pub vault_path: PathBuf,
}

impl EchoConfig {
    pub fn from_env() -> AuthResult<Self> {
        let backend_url =
            std::env::var("ECHO_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
        let redirect_url =
            std::env::var("ECHO_REDIRECT_URL").unwrap_or_else(|_| DEFAULT_REDIRECT_URL.to_string());
        let vault_path = std::env::var("ECHO_VAULT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_VAULT_PATH));
        Self::new(backend_url, redirect_url, vault_path)
    }

    pub fn new(
        backend_url: impl Into<String>,
        redirect_url: impl Into<String>,
        vault_path: impl Into<PathBuf>,
    ) -> AuthResult<Self> {
        let backend_url = backend_url.into();
        let redirect_url = redirect_url.into();
        // Validate both origins at load time so bad config fails fast
        // instead of at the first network call.
        Url::parse(&backend_url)
            .map_err(|e| AuthError::internal("bad_backend_url", e.to_string()))?;
        Url::parse(&redirect_url)
            .map_err(|e| AuthError::internal("bad_redirect_url", e.to_string()))?;
        Ok(Self { backend_url, redirect_url, vault_path: vault_path.into() })
    }

    /// Redirect target embedded at sign-up (post-verification landing).
    pub fn verify_redirect(&self) -> String {
        format!("{}/", self.redirect_url.trim_end_matches('/'))
    }

    /// Redirect target embedded in reset-password emails.
    pub fn reset_redirect(&self) -> String {
        format!("{}/reset-password", self.redirect_url.trim_end_matches('/'))
    }
}
