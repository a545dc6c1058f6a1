//! Unified error model for the identity/provisioning core.
//! One tagged enum covers every failure surfaced to callers: provider
//! rejections, transport failures, best-effort provisioning errors and
//! local input validation. UI surfaces render `message()` as a short notice.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthError {
    /// Provider-side identity failures: invalid credentials, duplicate
    /// account, rejected token. The message is the provider/server text
    /// passed through verbatim.
    Identity { code: String, message: String },
    /// Transport-level failure; message is generic, never the raw cause.
    Network { code: String, message: String },
    /// Profile/ledger step failures. Logged and swallowed by the sign-up
    /// saga; surfaced only from explicit repair paths.
    Provisioning { code: String, message: String },
    /// Local input validation (password length, mismatch).
    Validation { code: String, message: String },
    /// Everything else: bad config, IO on the token vault, malformed
    /// responses.
    Internal { code: String, message: String },
}

impl AuthError {
    pub fn code_str(&self) -> &str {
        match self {
            AuthError::Identity { code, .. }
            | AuthError::Network { code, .. }
            | AuthError::Provisioning { code, .. }
            | AuthError::Validation { code, .. }
            | AuthError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AuthError::Identity { message, .. }
            | AuthError::Network { message, .. }
            | AuthError::Provisioning { message, .. }
            | AuthError::Validation { message, .. }
            | AuthError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn identity<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AuthError::Identity { code: code.into(), message: msg.into() }
    }
    pub fn network<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AuthError::Network { code: code.into(), message: msg.into() }
    }
    pub fn provisioning<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AuthError::Provisioning { code: code.into(), message: msg.into() }
    }
    pub fn validation<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AuthError::Validation { code: code.into(), message: msg.into() }
    }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AuthError::Internal { code: code.into(), message: msg.into() }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, AuthError::Identity { .. })
    }
    pub fn is_network(&self) -> bool {
        matches!(self, AuthError::Network { .. })
    }
    pub fn is_validation(&self) -> bool {
        matches!(self, AuthError::Validation { .. })
    }
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AuthError {}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(_err: reqwest::Error) -> Self {
        // Callers log the transport detail; the surfaced notice stays generic.
        AuthError::Network { code: "network_error".into(), message: "network request failed".into() }
    }
}
