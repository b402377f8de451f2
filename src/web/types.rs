//! Web API request/response types

use serde::{Deserialize, Serialize};

use crate::auth::types::UserInfo;
use crate::aws::federation::ConsoleSession;

/// Session status for the landing page
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub authenticated: bool,
    pub flow_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

/// Logout request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub redirect_to_provider: bool,
}

/// Logout response; `redirect_url` is the provider end-session URL when
/// one is known and requested
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

/// Identity refresh response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Console-open request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenConsoleRequest {
    pub role_arn: String,
    #[serde(default)]
    pub destination: Option<String>,
}

/// Console-open response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenConsoleResponse {
    pub console_url: String,
    pub session: ConsoleSession,
}

/// History removal query
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub arn: String,
}

/// History removal response
#[derive(Debug, Serialize)]
pub struct RemoveHistoryResponse {
    pub removed: bool,
}

/// History import response
#[derive(Debug, Serialize)]
pub struct ImportHistoryResponse {
    pub merged: usize,
}

/// Uniform error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
