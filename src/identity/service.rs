//! `AuthService` — the explicit composition root for the subsystem.
//! Constructed once with its collaborators, initialized and torn down
//! deliberately; consumers receive it by reference instead of looking an
//! auth context up ambiently.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::EchoConfig;
use crate::error::AuthResult;
use crate::ledger::CreditLedgerReader;
use crate::provisioning::{ProfileService, ProvisioningSaga, ProvisioningStatus, SignUpForm};
use crate::storage::{RelationalStore, TokenVault};

use super::exchange::{CredentialExchangeService, ExchangeClient};
use super::model::{Identity, Session};
use super::password::PasswordLifecycleManager;
use super::provider::IdentityProvider;
use super::session_store::SessionStore;

pub struct AuthService {
    store: Arc<SessionStore>,
    provider: Arc<dyn IdentityProvider>,
    exchange: CredentialExchangeService,
    saga: ProvisioningSaga,
    passwords: PasswordLifecycleManager,
    credits: CreditLedgerReader,
    profiles: ProfileService,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl AuthService {
    pub fn new(
        config: &EchoConfig,
        provider: Arc<dyn IdentityProvider>,
        relational: Arc<dyn RelationalStore>,
        vault: Arc<dyn TokenVault>,
    ) -> AuthResult<Self> {
        let store = Arc::new(SessionStore::new());
        let client = ExchangeClient::new(&config.backend_url)?;
        let exchange = CredentialExchangeService::new(
            client,
            provider.clone(),
            store.clone(),
            vault,
        );
        let saga =
            ProvisioningSaga::new(provider.clone(), relational.clone(), config.verify_redirect());
        let passwords = PasswordLifecycleManager::new(
            provider.clone(),
            store.clone(),
            config.reset_redirect(),
        );
        let credits = CreditLedgerReader::new(relational.clone());
        let profiles = ProfileService::new(relational);
        Ok(Self {
            store,
            provider,
            exchange,
            saga,
            passwords,
            credits,
            profiles,
            listener: Mutex::new(None),
        })
    }

    /// Start session tracking. The provider change listener is registered
    /// first, then the explicit current-session fetch runs; the store's
    /// idempotent apply makes the two racing sources converge, and
    /// `sessions().ready()` resolves on whichever lands first.
    pub async fn init(&self) -> AuthResult<()> {
        let mut rx = self.provider.subscribe_changes();
        let store = self.store.clone();
        let handle = tokio::spawn(async move {
            while let Some(session) = rx.recv().await {
                store.apply(session);
            }
        });
        *self.listener.lock() = Some(handle);

        let current = self.provider.get_session().await?;
        self.store.apply(current);
        Ok(())
    }

    /// Unregister the change listener. Terminal state of the session
    /// lifecycle; the store keeps its last value.
    pub fn shutdown(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
            info!("auth listener unregistered");
        }
    }

    pub async fn sign_up(&self, form: &SignUpForm) -> AuthResult<Identity> {
        self.saga.sign_up(form).await
    }

    /// Re-run any provisioning steps a previous sign-up left undone.
    pub async fn repair_provisioning(&self, user_id: uuid::Uuid) -> AuthResult<ProvisioningStatus> {
        self.saga.repair(user_id).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.exchange.sign_in(email, password).await
    }

    pub async fn auto_sign_in(&self, internal_jwt: &str) -> AuthResult<Session> {
        self.exchange.auto_sign_in(internal_jwt).await
    }

    /// Clear the session. The vault-held internal JWT is deliberately left
    /// in place; retiring it is a separate, explicit operation.
    pub async fn sign_out(&self) -> AuthResult<()> {
        if let Some(session) = self.store.current() {
            self.provider.sign_out(&session).await?;
        }
        self.store.clear();
        Ok(())
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.store
    }

    pub fn exchange(&self) -> &CredentialExchangeService {
        &self.exchange
    }

    pub fn passwords(&self) -> &PasswordLifecycleManager {
        &self.passwords
    }

    pub fn credits(&self) -> &CreditLedgerReader {
        &self.credits
    }

    pub fn profiles(&self) -> &ProfileService {
        &self.profiles
    }
}

impl Drop for AuthService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
