//! Error taxonomy for the authentication core
//!
//! Every fatal outcome of the OAuth flow maps to exactly one variant here,
//! so callers can branch on the failure class instead of parsing messages.
//! Userinfo failures are the single non-fatal class: the orchestrator
//! absorbs them and degrades to a minimal identity.

use thiserror::Error;

/// Durable store failure (I/O or serialization)
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Authentication flow errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Required configuration field missing or empty. Raised before any
    /// network activity.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Provider metadata unreachable, malformed or incomplete. Fatal to
    /// initialize; a cache entry past its TTL is never substituted.
    #[error("OIDC discovery failed: {0}")]
    Discovery(String),

    /// Callback `state` did not match the stored value.
    #[error("state parameter mismatch in authorization callback")]
    Csrf,

    /// Callback arrived but no pending code verifier exists (stale or
    /// already-consumed login attempt).
    #[error("no pending code verifier for this callback")]
    VerifierNotFound,

    /// The provider redirected back with an explicit `error` parameter.
    #[error("provider returned '{error}': {description}")]
    Provider { error: String, description: String },

    /// Token endpoint rejected the exchange or returned no access token.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// Userinfo endpoint failure. Absorbed inside the callback flow,
    /// surfaced only from the explicit refresh operation.
    #[error("userinfo fetch failed: {0}")]
    Userinfo(String),

    /// Operation invoked while the flow is in a state that forbids it.
    #[error("operation not allowed in flow state '{0}'")]
    InvalidState(&'static str),

    /// No secure randomness source is available.
    #[error("secure randomness unavailable: {0}")]
    Random(String),

    /// The navigator could not perform the redirect.
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
