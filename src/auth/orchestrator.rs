//! OAuth2 Authorization-Code-with-PKCE flow orchestrator
//!
//! Explicit client object carrying configuration and discovered endpoints.
//! Randomness, navigation and persistence are injected as capability
//! traits, so every transition is testable in memory.
//!
//! State machine:
//! `Uninitialized -> Initializing -> Ready -> LoggingIn`;
//! `Ready + callback -> ExchangingCode -> Authenticated | Failed`.
//! A failed callback leaves the flow ready for another login attempt.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use parking_lot::Mutex;
use subtle::ConstantTimeEq;
use urlencoding::encode;

use crate::error::AuthError;
use crate::model::config::Config;
use crate::platform::{Navigator, RandomSource};
use crate::store::{KeyValueStore, keys};

use super::discovery::DiscoveryClient;
use super::pkce;
use super::session::{SessionStore, now_ms};
use super::types::{
    CallbackParams, OauthErrorResponse, OauthSession, OidcEndpoints, TokenResponse, UserInfo,
};

/// Default token lifetime when the provider omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Uninitialized,
    Initializing,
    Ready,
    LoggingIn,
    ExchangingCode,
    Authenticated,
    Failed,
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::Uninitialized => "uninitialized",
            FlowState::Initializing => "initializing",
            FlowState::Ready => "ready",
            FlowState::LoggingIn => "logging_in",
            FlowState::ExchangingCode => "exchanging_code",
            FlowState::Authenticated => "authenticated",
            FlowState::Failed => "failed",
        }
    }
}

pub struct FlowOrchestrator {
    config: Config,
    http: reqwest::Client,
    store: Arc<dyn KeyValueStore>,
    rng: Arc<dyn RandomSource>,
    navigator: Arc<dyn Navigator>,
    discovery: DiscoveryClient,
    sessions: SessionStore,
    state: Mutex<FlowState>,
    endpoints: Mutex<Option<OidcEndpoints>>,
}

impl FlowOrchestrator {
    pub fn new(
        config: Config,
        http: reqwest::Client,
        store: Arc<dyn KeyValueStore>,
        rng: Arc<dyn RandomSource>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let discovery = DiscoveryClient::new(http.clone(), store.clone());
        let sessions = SessionStore::new(store.clone());
        Self {
            config,
            http,
            store,
            rng,
            navigator,
            discovery,
            sessions,
            state: Mutex::new(FlowState::Uninitialized),
            endpoints: Mutex::new(None),
        }
    }

    pub fn flow_state(&self) -> FlowState {
        *self.state.lock()
    }

    fn set_state(&self, state: FlowState) {
        *self.state.lock() = state;
    }

    fn endpoints(&self) -> Result<OidcEndpoints, AuthError> {
        self.endpoints
            .lock()
            .clone()
            .ok_or(AuthError::InvalidState("uninitialized"))
    }

    /// Validate configuration and run endpoint discovery.
    /// Configuration errors are raised before any network call; discovery
    /// failure is fatal and leaves the flow uninitialized.
    pub async fn initialize(&self) -> Result<(), AuthError> {
        match self.flow_state() {
            FlowState::Initializing | FlowState::ExchangingCode => {
                return Err(AuthError::InvalidState(self.flow_state().name()));
            }
            _ => {}
        }

        self.config.validate()?;
        self.set_state(FlowState::Initializing);

        match self.discovery.discover(&self.config.authority).await {
            Ok(endpoints) => {
                *self.endpoints.lock() = Some(endpoints);
                self.set_state(FlowState::Ready);
                Ok(())
            }
            Err(e) => {
                self.set_state(FlowState::Uninitialized);
                Err(e)
            }
        }
    }

    /// Begin a login attempt: generate a fresh PKCE triple, persist the
    /// verifier/state pair (overwriting any pending pair; login is
    /// single-flight) and return the authorization URL.
    pub fn authorization_url(&self) -> Result<String, AuthError> {
        match self.flow_state() {
            FlowState::Uninitialized | FlowState::Initializing | FlowState::ExchangingCode => {
                return Err(AuthError::InvalidState(self.flow_state().name()));
            }
            _ => {}
        }
        let endpoints = self.endpoints()?;

        let params = pkce::generate_pkce(self.rng.as_ref())?;
        self.store.set(keys::PKCE_VERIFIER, &params.verifier)?;
        self.store.set(keys::OAUTH_STATE, &params.state)?;

        let url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&code_challenge={}&code_challenge_method=S256&state={}",
            endpoints.authorization_endpoint,
            encode(&self.config.client_id),
            encode(&self.config.redirect_uri),
            encode(&self.config.scope),
            params.challenge,
            params.state,
        );

        self.set_state(FlowState::LoggingIn);
        Ok(url)
    }

    /// Full login: build the authorization URL and hand the user agent to
    /// the provider. Control only comes back through the redirect URI.
    pub fn login(&self) -> Result<(), AuthError> {
        let url = self.authorization_url()?;
        tracing::info!("Redirecting to authorization endpoint");
        self.navigator.navigate(&url)
    }

    /// Dispatch the query parameters found on the redirect URI.
    ///
    /// A provider `error` is fatal and purges the pending artifacts; a
    /// `code`/`state` pair goes through the token exchange; anything else
    /// is a no-op and the caller should separately check session validity.
    pub async fn handle_page_load(
        &self,
        params: &CallbackParams,
    ) -> Result<Option<(UserInfo, OauthSession)>, AuthError> {
        if let Some(error) = &params.error {
            self.store.remove(keys::PKCE_VERIFIER)?;
            self.store.remove(keys::OAUTH_STATE)?;
            self.set_state(FlowState::Failed);
            return Err(AuthError::Provider {
                error: error.clone(),
                description: params.error_description.clone().unwrap_or_default(),
            });
        }

        match (&params.code, &params.state) {
            (Some(code), Some(state)) => self.handle_callback(code, state).await.map(Some),
            _ => Ok(None),
        }
    }

    /// Complete the authorization-code exchange for a callback
    pub async fn handle_callback(
        &self,
        code: &str,
        state: &str,
    ) -> Result<(UserInfo, OauthSession), AuthError> {
        let endpoints = self.endpoints()?;
        self.set_state(FlowState::ExchangingCode);

        let result = self.exchange_code(&endpoints, code, state).await;
        match &result {
            Ok((user, _)) => {
                tracing::info!("Authentication successful for subject {}", user.sub);
                self.set_state(FlowState::Authenticated);
            }
            Err(e) => {
                tracing::warn!("Authorization callback failed: {}", e);
                self.set_state(FlowState::Failed);
            }
        }
        result
    }

    async fn exchange_code(
        &self,
        endpoints: &OidcEndpoints,
        code: &str,
        state: &str,
    ) -> Result<(UserInfo, OauthSession), AuthError> {
        let stored_state = self.store.get(keys::OAUTH_STATE)?;
        let stored_verifier = self.store.get(keys::PKCE_VERIFIER)?;

        // Single use: both artifacts are consumed regardless of outcome,
        // so a replayed or stale callback always fails closed.
        self.store.remove(keys::OAUTH_STATE)?;
        self.store.remove(keys::PKCE_VERIFIER)?;

        let stored_state = stored_state.ok_or(AuthError::Csrf)?;
        if !constant_time_eq(&stored_state, state) {
            return Err(AuthError::Csrf);
        }
        let verifier = stored_verifier.ok_or(AuthError::VerifierNotFound)?;

        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("code", code),
            ("code_verifier", verifier.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(&endpoints.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("unreadable token response: {e}")))?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<OauthErrorResponse>(&body) {
                return Err(AuthError::TokenExchange(format!(
                    "{}: {}",
                    err.error,
                    err.error_description.unwrap_or_default()
                )));
            }
            return Err(AuthError::TokenExchange(format!(
                "token endpoint returned status {status}: {body}"
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::TokenExchange(format!("malformed token response: {e}")))?;
        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AuthError::TokenExchange("response contained no access_token".to_string())
            })?;

        let user = self
            .fetch_user_info(endpoints, &access_token, token.id_token.as_deref())
            .await;

        let created_at = now_ms();
        let expires_at =
            created_at + token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS) * 1000;

        let session = OauthSession {
            access_token,
            refresh_token: token.refresh_token,
            id_token: token.id_token,
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: token.scope,
            expires_at,
            created_at,
            user: user.clone(),
        };
        self.sessions.store_session(&session)?;

        Ok((user, session))
    }

    /// Fetch identity claims, degrading to ID-token claims and finally to a
    /// minimal identity. A userinfo failure never fails the flow.
    async fn fetch_user_info(
        &self,
        endpoints: &OidcEndpoints,
        access_token: &str,
        id_token: Option<&str>,
    ) -> UserInfo {
        match self.request_user_info(endpoints, access_token).await {
            Ok(user) => return user,
            Err(e) => {
                tracing::warn!("Userinfo unavailable, degrading to minimal identity: {}", e)
            }
        }
        id_token
            .and_then(id_token_claims)
            .unwrap_or_else(UserInfo::unknown)
    }

    async fn request_user_info(
        &self,
        endpoints: &OidcEndpoints,
        access_token: &str,
    ) -> Result<UserInfo, AuthError> {
        let endpoint = endpoints
            .userinfo_endpoint
            .as_ref()
            .ok_or_else(|| AuthError::Userinfo("provider exposes no userinfo endpoint".to_string()))?;

        let response = self
            .http
            .get(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Userinfo(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Userinfo(format!(
                "userinfo endpoint returned status {status}"
            )));
        }

        response
            .json::<UserInfo>()
            .await
            .map_err(|e| AuthError::Userinfo(format!("malformed claims: {e}")))
    }

    /// Re-fetch identity claims for the live session and re-persist it.
    /// Unlike the callback path, failures surface here so the caller-owned
    /// backoff wrapper has something to retry.
    pub async fn refresh_user_info(&self) -> Result<UserInfo, AuthError> {
        if !self.sessions.is_valid()? {
            return Err(AuthError::InvalidState("unauthenticated"));
        }
        let mut session = self
            .sessions
            .get()?
            .ok_or(AuthError::InvalidState("unauthenticated"))?;

        let endpoints = self.endpoints()?;
        let user = self
            .request_user_info(&endpoints, &session.access_token)
            .await?;

        session.user = user.clone();
        self.sessions.store_session(&session)?;
        Ok(user)
    }

    /// Purge the session, pending PKCE artifacts and the authority's
    /// discovery cache entry. Returns the provider end-session URL when
    /// requested and known, for the caller to navigate to.
    pub fn logout(&self, redirect_to_provider: bool) -> Result<Option<String>, AuthError> {
        let end_session_url = if redirect_to_provider {
            self.end_session_url()?
        } else {
            None
        };

        self.sessions.clear()?;
        self.store.remove(keys::PKCE_VERIFIER)?;
        self.store.remove(keys::OAUTH_STATE)?;
        self.store
            .remove(&keys::discovery(self.config.authority.trim_end_matches('/')))?;

        if self.endpoints.lock().is_some() {
            self.set_state(FlowState::Ready);
        } else {
            self.set_state(FlowState::Uninitialized);
        }
        tracing::info!("Session cleared");

        Ok(end_session_url)
    }

    /// Provider end-session URL with `id_token_hint` (when available) and
    /// `post_logout_redirect_uri`, or None if the provider has none
    pub fn end_session_url(&self) -> Result<Option<String>, AuthError> {
        let Some(endpoints) = self.endpoints.lock().clone() else {
            return Ok(None);
        };
        let Some(end_session) = endpoints.end_session_endpoint else {
            return Ok(None);
        };

        let mut query = Vec::new();
        if let Some(session) = self.sessions.get()? {
            if let Some(id_token) = &session.id_token {
                query.push(format!("id_token_hint={}", encode(id_token)));
            }
        }
        query.push(format!(
            "post_logout_redirect_uri={}",
            encode(&self.config.effective_post_logout_redirect_uri())
        ));

        Ok(Some(format!("{end_session}?{}", query.join("&"))))
    }

    /// The authenticated user, or None when no valid session exists
    pub fn current_user(&self) -> Result<Option<UserInfo>, AuthError> {
        if !self.sessions.is_valid()? {
            return Ok(None);
        }
        Ok(self.sessions.get()?.map(|s| s.user))
    }

    /// The live session, or None when absent or expired
    pub fn session(&self) -> Result<Option<OauthSession>, AuthError> {
        if !self.sessions.is_valid()? {
            return Ok(None);
        }
        self.sessions.get()
    }
}

/// Constant-time string comparison for the CSRF state check
fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Best-effort claim extraction from an ID token payload.
/// Display fallback only; the token was just issued to us over TLS, no
/// signature verification happens here.
pub(crate) fn id_token_claims(id_token: &str) -> Option<UserInfo> {
    let payload = id_token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}
