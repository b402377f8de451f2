//! OIDC endpoint discovery
//!
//! Resolves `{authority}/.well-known/openid-configuration` and caches the
//! normalized endpoint set per authority for 24 hours. An entry past its
//! TTL is treated as absent: discovery failure is surfaced, never masked
//! by stale metadata.

use std::sync::Arc;

use chrono::Utc;

use crate::error::AuthError;
use crate::store::{KeyValueStore, keys};

use super::types::{CachedEndpoints, DiscoveryDocument, OidcEndpoints};

/// Cache entries older than this are never used
pub(crate) const DISCOVERY_TTL_MS: i64 = 24 * 60 * 60 * 1000;

pub struct DiscoveryClient {
    http: reqwest::Client,
    store: Arc<dyn KeyValueStore>,
}

impl DiscoveryClient {
    pub fn new(http: reqwest::Client, store: Arc<dyn KeyValueStore>) -> Self {
        Self { http, store }
    }

    /// Resolve the endpoint set for an authority, consulting the cache first
    pub async fn discover(&self, authority: &str) -> Result<OidcEndpoints, AuthError> {
        let authority = authority.trim_end_matches('/');
        let cache_key = keys::discovery(authority);

        if let Some(cached) = self.read_cache(&cache_key)? {
            tracing::debug!("Discovery cache hit for {}", authority);
            return Ok(cached);
        }

        let url = format!("{authority}/.well-known/openid-configuration");
        tracing::info!("Fetching OIDC metadata: {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthError::Discovery(format!("metadata fetch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Discovery(format!(
                "metadata endpoint returned status {status}"
            )));
        }

        let document: DiscoveryDocument = response
            .json()
            .await
            .map_err(|e| AuthError::Discovery(format!("malformed metadata document: {e}")))?;

        let endpoints = normalize(document)?;

        let entry = CachedEndpoints {
            endpoints: endpoints.clone(),
            fetched_at: Utc::now().timestamp_millis(),
        };
        self.store.set(
            &cache_key,
            &serde_json::to_string(&entry).map_err(crate::error::StorageError::from)?,
        )?;

        Ok(endpoints)
    }

    /// Read a cache entry, ignoring anything undecodable or past the TTL
    fn read_cache(&self, cache_key: &str) -> Result<Option<OidcEndpoints>, AuthError> {
        let Some(raw) = self.store.get(cache_key)? else {
            return Ok(None);
        };

        let Ok(entry) = serde_json::from_str::<CachedEndpoints>(&raw) else {
            self.store.remove(cache_key)?;
            return Ok(None);
        };

        let age = Utc::now().timestamp_millis() - entry.fetched_at;
        if age >= DISCOVERY_TTL_MS {
            return Ok(None);
        }

        Ok(Some(entry.endpoints))
    }
}

/// Validate required endpoints and build the normalized set
fn normalize(document: DiscoveryDocument) -> Result<OidcEndpoints, AuthError> {
    let authorization_endpoint = document
        .authorization_endpoint
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AuthError::Discovery("metadata has no authorization_endpoint".to_string()))?;

    let token_endpoint = document
        .token_endpoint
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AuthError::Discovery("metadata has no token_endpoint".to_string()))?;

    Ok(OidcEndpoints {
        authorization_endpoint,
        token_endpoint,
        userinfo_endpoint: document.userinfo_endpoint.filter(|e| !e.is_empty()),
        end_session_endpoint: document.end_session_endpoint.filter(|e| !e.is_empty()),
        scopes_supported: document.scopes_supported,
        response_types_supported: document.response_types_supported,
        code_challenge_methods_supported: document.code_challenge_methods_supported,
    })
}
