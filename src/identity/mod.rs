//! Central identity and session management for the analytics dashboard core.
//! Keep the public surface thin and split implementation across sub-modules.

mod exchange;
mod model;
mod password;
mod provider;
mod service;
mod session_store;

pub use exchange::{CredentialExchangeService, ExchangeClient, LoginExchange, SessionTokens};
pub use model::{AuthState, Identity, Session};
pub use password::PasswordLifecycleManager;
pub use provider::{IdentityProvider, MemoryIdentityProvider, SignUpRequest, MIN_PASSWORD_LEN};
pub use service::AuthService;
pub use session_store::SessionStore;
