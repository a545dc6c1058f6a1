//! The only shared mutable state in the subsystem: the current session
//! snapshot plus its change-notification channel.
//!
//! Two independent producers feed the store at startup: the provider-level
//! change listener (registered first) and the explicit get-session fetch
//! issued right after. Arrival order is not guaranteed, so `apply` is
//! idempotent (equal payloads produce no second notification) and the
//! `ready` latch resolves exactly once on whichever event lands first.

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use super::model::{AuthState, Session};

struct Inner {
    session: Option<Session>,
    initialized: bool,
}

pub struct SessionStore {
    inner: RwLock<Inner>,
    changes: watch::Sender<Option<Session>>,
    ready: watch::Sender<bool>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(None);
        let (ready, _) = watch::channel(false);
        Self { inner: RwLock::new(Inner { session: None, initialized: false }), changes, ready }
    }

    /// Current session, or `None` when anonymous (or not yet initialized).
    pub fn current(&self) -> Option<Session> {
        self.inner.read().session.clone()
    }

    pub fn state(&self) -> AuthState {
        let inner = self.inner.read();
        if !inner.initialized {
            AuthState::Unknown
        } else if inner.session.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Anonymous
        }
    }

    /// Change channel. Receivers observe the full session snapshot; a `None`
    /// value means the store moved to `Anonymous`.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.changes.subscribe()
    }

    /// Resolves once the first listener/fetch event has been applied,
    /// regardless of which source won the race.
    pub async fn ready(&self) {
        let mut rx = self.ready.subscribe();
        let _ = rx.wait_for(|resolved| *resolved).await;
    }

    /// Install a session snapshot. Returns `true` when the value actually
    /// changed (and a notification was sent). Re-applying an identical
    /// session is a no-op apart from resolving the ready latch on the very
    /// first call.
    pub fn apply(&self, next: Option<Session>) -> bool {
        let (first, changed) = {
            let mut inner = self.inner.write();
            let first = !inner.initialized;
            let changed = first || inner.session != next;
            inner.initialized = true;
            if changed {
                inner.session = next.clone();
            }
            (first, changed)
        };
        if changed {
            debug!(
                authenticated = next.is_some(),
                user_id = next.as_ref().map(|s| s.user_id.to_string()).unwrap_or_default(),
                "session store updated"
            );
            self.changes.send_replace(next);
        }
        if first {
            self.ready.send_replace(true);
        }
        changed
    }

    /// Sign-out path: drop the session. The internal JWT held in the token
    /// vault is not touched here; retiring it is an explicit operation.
    pub fn clear(&self) -> bool {
        self.apply(None)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
