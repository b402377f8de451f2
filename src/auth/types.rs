//! OAuth2 / OIDC wire and persistence types

use serde::{Deserialize, Serialize};

/// Raw provider metadata document from `.well-known/openid-configuration`
///
/// Endpoint fields are optional here so presence can be validated explicitly
/// instead of surfacing as a deserialization error.
#[derive(Debug, Deserialize)]
pub struct DiscoveryDocument {
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub userinfo_endpoint: Option<String>,
    pub end_session_endpoint: Option<String>,
    #[serde(default)]
    pub scopes_supported: Vec<String>,
    #[serde(default)]
    pub response_types_supported: Vec<String>,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

/// Normalized endpoint set, immutable once discovered
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OidcEndpoints {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: Option<String>,
    pub end_session_endpoint: Option<String>,
    #[serde(default)]
    pub scopes_supported: Vec<String>,
    #[serde(default)]
    pub response_types_supported: Vec<String>,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

/// Discovery cache entry, replaced wholesale on re-discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEndpoints {
    pub endpoints: OidcEndpoints,
    /// Fetch time in epoch milliseconds
    pub fetched_at: i64,
}

/// One login attempt's PKCE artifacts
///
/// Each verifier/state pair is single-use; a later login overwrites any
/// pending pair.
#[derive(Debug, Clone)]
pub struct PkceParams {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
}

/// Token endpoint success response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub scope: Option<String>,
}

/// OAuth2 error response body
#[derive(Debug, Deserialize)]
pub struct OauthErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

/// Identity claims attached to the session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    #[serde(default = "unknown_sub")]
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

fn unknown_sub() -> String {
    "unknown".to_string()
}

impl UserInfo {
    /// Minimal identity used when the userinfo endpoint is unreachable
    pub fn unknown() -> Self {
        Self {
            sub: unknown_sub(),
            email: None,
            name: None,
            preferred_username: None,
            picture: None,
        }
    }
}

/// Persisted authentication session
///
/// Valid iff `now < expires_at`. Always written all-or-nothing as a single
/// store entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OauthSession {
    pub access_token: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    pub token_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Expiration time (epoch milliseconds)
    pub expires_at: i64,

    /// Creation time (epoch milliseconds)
    pub created_at: i64,

    pub user: UserInfo,
}

/// Query parameters arriving on the redirect URI
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}
