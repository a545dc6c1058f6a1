//! Storage seams: the relational tables this subsystem touches
//! (`profiles`, `credits`, `settings`, plus the provisioning-status
//! workflow rows) and the durable client-side token vault.
//!
//! The managed backend's internals are out of scope; `MemoryStore` is the
//! in-process implementation used by tests and local development, with
//! failure injection so the saga's logged-and-swallowed policy can be
//! exercised. `FileTokenVault` persists the vault as a small JSON map,
//! parse-or-default on open.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::ledger::{CreditLedger, Settings};
use crate::provisioning::{Profile, ProvisioningStatus};

/// Vault key holding the opaque bearer token minted at interactive sign-in
/// and consumed by out-of-band token exchange.
pub const INTERNAL_JWT_KEY: &str = "internal_jwt";

#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Insert-if-absent. Returns `false` when a row already existed for the
    /// user; an existing row is never overwritten.
    async fn insert_profile(&self, profile: &Profile) -> AuthResult<bool>;
    async fn get_profile(&self, user_id: Uuid) -> AuthResult<Option<Profile>>;
    async fn upsert_profile(&self, profile: &Profile) -> AuthResult<()>;

    /// Insert-if-absent, same contract as `insert_profile`.
    async fn insert_ledger(&self, ledger: &CreditLedger) -> AuthResult<bool>;
    async fn get_ledger(&self, user_id: Uuid) -> AuthResult<Option<CreditLedger>>;

    async fn get_settings(&self) -> AuthResult<Settings>;

    async fn get_status(&self, user_id: Uuid) -> AuthResult<Option<ProvisioningStatus>>;
    async fn put_status(&self, status: &ProvisioningStatus) -> AuthResult<()>;
}

/// Durable client storage for opaque tokens.
#[async_trait]
pub trait TokenVault: Send + Sync {
    async fn get(&self, key: &str) -> AuthResult<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> AuthResult<()>;
    async fn remove(&self, key: &str) -> AuthResult<()>;
}

#[derive(Default)]
pub struct MemoryStore {
    profiles: RwLock<HashMap<Uuid, Profile>>,
    ledgers: RwLock<HashMap<Uuid, CreditLedger>>,
    statuses: RwLock<HashMap<Uuid, ProvisioningStatus>>,
    settings: RwLock<Settings>,
    fail_profile_inserts: AtomicBool,
    fail_ledger_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new(settings: Settings) -> Self {
        Self { settings: RwLock::new(settings), ..Self::default() }
    }

    pub fn set_settings(&self, settings: Settings) {
        *self.settings.write() = settings;
    }

    /// Make subsequent profile inserts fail, to exercise the saga's
    /// partial-failure path.
    pub fn set_profile_insert_failure(&self, fail: bool) {
        self.fail_profile_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn set_ledger_insert_failure(&self, fail: bool) {
        self.fail_ledger_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn ledger_count(&self) -> usize {
        self.ledgers.read().len()
    }
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn insert_profile(&self, profile: &Profile) -> AuthResult<bool> {
        if self.fail_profile_inserts.load(Ordering::SeqCst) {
            return Err(AuthError::provisioning("profile_insert_failed", "profiles insert rejected"));
        }
        let mut profiles = self.profiles.write();
        if profiles.contains_key(&profile.user_id) {
            return Ok(false);
        }
        profiles.insert(profile.user_id, profile.clone());
        Ok(true)
    }

    async fn get_profile(&self, user_id: Uuid) -> AuthResult<Option<Profile>> {
        Ok(self.profiles.read().get(&user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> AuthResult<()> {
        self.profiles.write().insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn insert_ledger(&self, ledger: &CreditLedger) -> AuthResult<bool> {
        if self.fail_ledger_inserts.load(Ordering::SeqCst) {
            return Err(AuthError::provisioning("ledger_insert_failed", "credits insert rejected"));
        }
        let mut ledgers = self.ledgers.write();
        if ledgers.contains_key(&ledger.user_id) {
            return Ok(false);
        }
        ledgers.insert(ledger.user_id, ledger.clone());
        Ok(true)
    }

    async fn get_ledger(&self, user_id: Uuid) -> AuthResult<Option<CreditLedger>> {
        Ok(self.ledgers.read().get(&user_id).cloned())
    }

    async fn get_settings(&self) -> AuthResult<Settings> {
        Ok(self.settings.read().clone())
    }

    async fn get_status(&self, user_id: Uuid) -> AuthResult<Option<ProvisioningStatus>> {
        Ok(self.statuses.read().get(&user_id).cloned())
    }

    async fn put_status(&self, status: &ProvisioningStatus) -> AuthResult<()> {
        self.statuses.write().insert(status.user_id, status.clone());
        Ok(())
    }
}

/// In-memory vault for tests and short-lived processes.
#[derive(Default)]
pub struct MemoryTokenVault {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryTokenVault {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenVault for MemoryTokenVault {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> AuthResult<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> AuthResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// File-backed vault. The whole map is loaded on open and rewritten on every
/// mutation; a missing or malformed file starts empty rather than failing.
pub struct FileTokenVault {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileTokenVault {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => HashMap::new(),
        };
        Self { path, entries: RwLock::new(entries) }
    }

    fn flush(&self, entries: &HashMap<String, String>) -> AuthResult<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .map_err(|e| AuthError::internal("vault_io", e.to_string()))?;
            }
        }
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| AuthError::internal("vault_encode", e.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|e| AuthError::internal("vault_io", e.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenVault for FileTokenVault {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> AuthResult<()> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    async fn remove(&self, key: &str) -> AuthResult<()> {
        let mut entries = self.entries.write();
        entries.remove(key);
        self.flush(&entries)
    }
}

/// Convenience for sharing a store across the saga, readers and services.
pub type SharedRelationalStore = Arc<dyn RelationalStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn insert_if_absent_never_overwrites() {
        let store = MemoryStore::new(Settings::default());
        let uid = Uuid::new_v4();
        let first = Profile::new(uid, "Ada", "Echo Ltd");
        assert!(store.insert_profile(&first).await.unwrap());

        let second = Profile::new(uid, "Someone Else", "Other Co");
        assert!(!store.insert_profile(&second).await.unwrap());
        let kept = store.get_profile(uid).await.unwrap().unwrap();
        assert_eq!(kept.full_name, "Ada");
    }

    #[tokio::test]
    async fn file_vault_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault.json");

        let vault = FileTokenVault::open(&path);
        vault.put(INTERNAL_JWT_KEY, "tok-123").await.unwrap();
        drop(vault);

        let reopened = FileTokenVault::open(&path);
        assert_eq!(reopened.get(INTERNAL_JWT_KEY).await.unwrap().as_deref(), Some("tok-123"));

        reopened.remove(INTERNAL_JWT_KEY).await.unwrap();
        let again = FileTokenVault::open(&path);
        assert_eq!(again.get(INTERNAL_JWT_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_vault_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault.json");
        std::fs::write(&path, "not json").unwrap();
        let vault = FileTokenVault::open(&path);
        assert_eq!(vault.get(INTERNAL_JWT_KEY).await.unwrap(), None);
    }
}
