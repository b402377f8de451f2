//! Durable authentication session
//!
//! Stores the session as a single JSON value. Reads are schema-checked and
//! self-healing: an undecodable or structurally invalid entry is purged and
//! reported as absent, so a corrupted store degrades to logged-out.

use std::sync::Arc;

use chrono::Utc;

use crate::error::AuthError;
use crate::store::{KeyValueStore, keys};

use super::types::OauthSession;

/// Current time in epoch milliseconds
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persist a session all-or-nothing
    pub fn store_session(&self, session: &OauthSession) -> Result<(), AuthError> {
        let raw = serde_json::to_string(session).map_err(crate::error::StorageError::from)?;
        self.store.set(keys::AUTH_SESSION, &raw)?;
        Ok(())
    }

    /// Read the stored session, purging anything that fails the schema check
    pub fn get(&self) -> Result<Option<OauthSession>, AuthError> {
        let Some(raw) = self.store.get(keys::AUTH_SESSION)? else {
            return Ok(None);
        };

        match serde_json::from_str::<OauthSession>(&raw) {
            Ok(session) if !session.access_token.is_empty() && session.expires_at > 0 => {
                Ok(Some(session))
            }
            Ok(_) => {
                tracing::warn!("Stored session failed schema check, purging");
                self.clear()?;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("Stored session is undecodable ({}), purging", e);
                self.clear()?;
                Ok(None)
            }
        }
    }

    /// Remove the stored session
    pub fn clear(&self) -> Result<(), AuthError> {
        self.store.remove(keys::AUTH_SESSION)?;
        Ok(())
    }

    /// Session present and not expired; an expired session is purged as a
    /// side effect of the check
    pub fn is_valid(&self) -> Result<bool, AuthError> {
        self.is_valid_at(now_ms())
    }

    pub(crate) fn is_valid_at(&self, now: i64) -> Result<bool, AuthError> {
        let Some(session) = self.get()? else {
            return Ok(false);
        };

        if now < session.expires_at {
            Ok(true)
        } else {
            tracing::info!("Session expired, purging");
            self.clear()?;
            Ok(false)
        }
    }
}
