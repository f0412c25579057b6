use std::sync::Arc;

use super::store::KeyValueStore;
use crate::errors::CoreError;
use crate::models::session::{Audience, SessionState, AUTHENTICATED_SENTINEL};

/// Reads and writes one audience's session keys.
///
/// Reading is infallible by contract: a store error or garbage in the store
/// reads as "not authenticated".
#[derive(Clone)]
pub struct SessionStore {
    audience: Audience,
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(audience: Audience, store: Arc<dyn KeyValueStore>) -> Self {
        Self { audience, store }
    }

    pub fn audience(&self) -> Audience {
        self.audience
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{} session: failed to read '{key}': {e}", self.audience);
                None
            }
        }
    }

    /// Persisted state, lenient.
    pub fn load(&self) -> SessionState {
        let keys = self.audience.keys();
        let flag = self.read(keys.authenticated);
        let expires_at = self.read(keys.expires_at);
        let state = SessionState::from_raw(flag.as_deref(), expires_at.as_deref());
        if state.authenticated && state.expires_at.is_none() {
            log::warn!("{} session flag set without a readable expiry", self.audience);
        }
        state
    }

    /// Third key: the client code version, or the raw admin code.
    pub fn load_extra(&self) -> Option<String> {
        self.read(self.audience.keys().extra)
            .filter(|v| !v.trim().is_empty())
    }

    /// Persist an opened session. `extra` goes under the audience's third key.
    ///
    /// The flag is written last. If any write fails, all keys are removed so a
    /// later load never sees a half-written session.
    pub fn save(&self, state: &SessionState, extra: Option<&str>) -> Result<(), CoreError> {
        let expires_at = state.expires_at.ok_or_else(|| {
            CoreError::ValidationError("cannot persist a session without an expiry".into())
        })?;

        if let Err(e) = self.write(state.authenticated, expires_at, extra) {
            if let Err(clear_err) = self.clear() {
                log::error!(
                    "{} session: rollback after failed save also failed: {clear_err}",
                    self.audience
                );
            }
            return Err(e);
        }
        Ok(())
    }

    fn write(
        &self,
        authenticated: bool,
        expires_at: i64,
        extra: Option<&str>,
    ) -> Result<(), CoreError> {
        let keys = self.audience.keys();
        match extra {
            Some(value) => self.store.set(keys.extra, value)?,
            None => self.store.remove(keys.extra)?,
        }
        self.store.set(keys.expires_at, &expires_at.to_string())?;
        if authenticated {
            self.store.set(keys.authenticated, AUTHENTICATED_SENTINEL)
        } else {
            self.store.remove(keys.authenticated)
        }
    }

    /// Remove all three keys.
    pub fn clear(&self) -> Result<(), CoreError> {
        for key in self.audience.keys().all() {
            self.store.remove(key)?;
        }
        Ok(())
    }
}
