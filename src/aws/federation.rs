//! AWS console federation
//!
//! Exchanges the OIDC ID token for temporary credentials via
//! AssumeRoleWithWebIdentity, then trades those for a one-time console
//! signin URL at the federation endpoint.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use urlencoding::encode;

use crate::auth::types::UserInfo;
use crate::model::config::Config;

use super::errors::FederationError;
use super::history::RoleHistory;
use super::sts::{AwsCredentials, StsClient};

/// AWS role session name constraints: 2..=64 chars of [\w+=,.@-]
const SESSION_NAME_MAX: usize = 64;

/// Identity subset attached to console session metadata. Claims like
/// `picture` never leave the auth session.
#[derive(Debug, Clone, Serialize)]
pub struct RedactedIdentity {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
}

impl From<&UserInfo> for RedactedIdentity {
    fn from(user: &UserInfo) -> Self {
        Self {
            sub: user.sub.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            preferred_username: user.preferred_username.clone(),
        }
    }
}

/// Metadata for one federated console session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleSession {
    pub role_arn: String,
    pub session_name: String,
    pub credentials: AwsCredentials,
    pub created_at: DateTime<Utc>,
    pub user: RedactedIdentity,
}

#[derive(Debug, Deserialize)]
struct SigninTokenResponse {
    #[serde(rename = "SigninToken")]
    signin_token: Option<String>,
}

fn is_session_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '=' | ',' | '.' | '@' | '-')
}

fn sanitize_session_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if is_session_name_char(c) { c } else { '-' })
        .collect()
}

fn is_valid_session_name(name: &str) -> bool {
    (2..=SESSION_NAME_MAX).contains(&name.len()) && name.chars().all(is_session_name_char)
}

/// Derive a role session name from the identity: first usable of
/// preferred_username, email local part and sanitized subject, with a
/// timestamp appended for uniqueness. Never fails; an unusable identity
/// falls back to a generated name.
pub fn generate_session_name(user: &UserInfo) -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();

    let candidates = [
        user.preferred_username.clone().unwrap_or_default(),
        user.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .unwrap_or_default()
            .to_string(),
        sanitize_session_name(&user.sub),
    ];
    let base = candidates
        .iter()
        .map(|c| sanitize_session_name(c.trim()))
        .find(|c| c.chars().any(|ch| ch.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "oidc-user".to_string());

    let mut name = format!("{base}-{timestamp}");
    name.truncate(SESSION_NAME_MAX);

    if is_valid_session_name(&name) {
        name
    } else {
        let digest = hex::encode(Sha256::digest(user.sub.as_bytes()));
        let mut fallback = format!("oidc-user-{}-{timestamp}", &digest[..8]);
        fallback.truncate(SESSION_NAME_MAX);
        fallback
    }
}

/// `Expiration` must be comfortably in the future: a 5 minute buffer
/// absorbs clock skew and in-flight use
pub fn is_credentials_valid(credentials: &AwsCredentials) -> bool {
    credentials.expiration > Utc::now() + Duration::minutes(5)
}

pub struct FederationService {
    config: Config,
    http: reqwest::Client,
    sts: StsClient,
    history: Arc<RoleHistory>,
}

impl FederationService {
    pub fn new(config: Config, http: reqwest::Client, history: Arc<RoleHistory>) -> Self {
        let sts = StsClient::new(http.clone(), config.effective_sts_endpoint());
        Self {
            config,
            http,
            sts,
            history,
        }
    }

    pub fn history(&self) -> &RoleHistory {
        &self.history
    }

    /// Trade temporary credentials for a one-time console signin URL
    pub async fn generate_console_url(
        &self,
        credentials: &AwsCredentials,
        destination: Option<&str>,
    ) -> Result<String, FederationError> {
        let session = serde_json::json!({
            "sessionId": credentials.access_key_id,
            "sessionKey": credentials.secret_access_key,
            "sessionToken": credentials.session_token,
        })
        .to_string();

        let signin_url = format!(
            "{}?Action=getSigninToken&Session={}",
            self.config.federation_endpoint,
            encode(&session)
        );

        let response = self
            .http
            .get(&signin_url)
            .send()
            .await
            .map_err(|e| FederationError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FederationError::Http(format!(
                "federation endpoint returned status {status}"
            )));
        }

        let token: SigninTokenResponse = response
            .json()
            .await
            .map_err(|e| FederationError::Http(format!("malformed signin token response: {e}")))?;
        let signin_token = token
            .signin_token
            .filter(|t| !t.is_empty())
            .ok_or(FederationError::MissingSigninToken)?;

        let destination = destination.unwrap_or(&self.config.console_destination);
        Ok(format!(
            "{}?Action=login&Issuer={}&Destination={}&SigninToken={}",
            self.config.federation_endpoint,
            encode(&self.config.issuer),
            encode(destination),
            encode(&signin_token)
        ))
    }

    /// Full console-open: record the role, assume it with the web-identity
    /// token and build the signin URL
    pub async fn assume_role_and_open_console(
        &self,
        role_arn: &str,
        user: &UserInfo,
        id_token: &str,
        destination: Option<&str>,
    ) -> Result<(ConsoleSession, String), FederationError> {
        // Validates the ARN and records the attempt
        self.history.add_role_arn(role_arn)?;

        let session_name = generate_session_name(user);
        let (credentials, _assumed) = self
            .sts
            .assume_role_with_web_identity(
                role_arn,
                id_token,
                &session_name,
                self.config.session_duration,
            )
            .await?;

        if !is_credentials_valid(&credentials) {
            tracing::warn!("STS returned credentials expiring in under 5 minutes");
        }

        let console_url = self.generate_console_url(&credentials, destination).await?;
        tracing::info!("Console session ready for {} as {}", role_arn, session_name);

        let session = ConsoleSession {
            role_arn: role_arn.to_string(),
            session_name,
            credentials,
            created_at: Utc::now(),
            user: RedactedIdentity::from(user),
        };
        Ok((session, console_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::history::DEFAULT_HISTORY_MAX;
    use crate::store::MemoryStore;

    const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/MyRole";

    fn user(preferred: Option<&str>, email: Option<&str>, sub: &str) -> UserInfo {
        UserInfo {
            sub: sub.to_string(),
            email: email.map(String::from),
            name: None,
            preferred_username: preferred.map(String::from),
            picture: None,
        }
    }

    fn credentials() -> AwsCredentials {
        AwsCredentials {
            access_key_id: "ASIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expiration: Utc::now() + Duration::hours(1),
        }
    }

    fn service(config: Config) -> FederationService {
        let history = Arc::new(RoleHistory::new(MemoryStore::shared(), DEFAULT_HISTORY_MAX));
        FederationService::new(config, reqwest::Client::new(), history)
    }

    #[test]
    fn test_session_name_prefers_preferred_username() {
        let name = generate_session_name(&user(Some("jdoe"), Some("j@x.io"), "sub-1"));
        assert!(name.starts_with("jdoe-"));
        assert!(is_valid_session_name(&name));
    }

    #[test]
    fn test_session_name_falls_back_to_email_local_part() {
        let name = generate_session_name(&user(None, Some("jane.doe@example.com"), "sub-1"));
        assert!(name.starts_with("jane.doe-"));
    }

    #[test]
    fn test_session_name_sanitizes_subject() {
        let name = generate_session_name(&user(None, None, "auth0|user:42"));
        assert!(name.starts_with("auth0-user-42-"));
        assert!(is_valid_session_name(&name));
    }

    #[test]
    fn test_session_name_fallback_for_unusable_identity() {
        let name = generate_session_name(&user(None, None, "|||"));
        assert!(name.starts_with("oidc-user-"));
        assert!(is_valid_session_name(&name));
    }

    #[test]
    fn test_session_name_truncated_to_64() {
        let long = "x".repeat(200);
        let name = generate_session_name(&user(Some(&long), None, "s"));
        assert_eq!(name.len(), 64);
        assert!(is_valid_session_name(&name));
    }

    #[test]
    fn test_is_valid_session_name() {
        assert!(is_valid_session_name("user@example.com-20260101"));
        assert!(!is_valid_session_name("a"));
        assert!(!is_valid_session_name("has space"));
        assert!(!is_valid_session_name(&"x".repeat(65)));
    }

    #[test]
    fn test_credentials_validity_buffer() {
        let mut creds = credentials();
        creds.expiration = Utc::now() + Duration::minutes(10);
        assert!(is_credentials_valid(&creds));

        creds.expiration = Utc::now() + Duration::minutes(4);
        assert!(!is_credentials_valid(&creds));

        creds.expiration = Utc::now() - Duration::minutes(1);
        assert!(!is_credentials_valid(&creds));
    }

    #[tokio::test]
    async fn test_generate_console_url() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .match_query(mockito::Matcher::UrlEncoded(
                "Action".into(),
                "getSigninToken".into(),
            ))
            .with_status(200)
            .with_body(r#"{"SigninToken":"SIGNIN123"}"#)
            .create_async()
            .await;

        let mut config = Config::default();
        config.federation_endpoint = format!("{}/federation", server.url());
        config.issuer = "consolefed".to_string();

        let url = service(config)
            .generate_console_url(&credentials(), None)
            .await
            .unwrap();

        assert!(url.starts_with(&format!("{}/federation?Action=login", server.url())));
        assert!(url.contains("Issuer=consolefed"));
        assert!(url.contains(&format!(
            "Destination={}",
            encode("https://console.aws.amazon.com/")
        )));
        assert!(url.contains("SigninToken=SIGNIN123"));
    }

    #[tokio::test]
    async fn test_generate_console_url_custom_destination() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"SigninToken":"T"}"#)
            .create_async()
            .await;

        let mut config = Config::default();
        config.federation_endpoint = format!("{}/federation", server.url());

        let url = service(config)
            .generate_console_url(&credentials(), Some("https://console.aws.amazon.com/s3/"))
            .await
            .unwrap();
        assert!(url.contains(&format!(
            "Destination={}",
            encode("https://console.aws.amazon.com/s3/")
        )));
    }

    #[tokio::test]
    async fn test_missing_signin_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"Unexpected":"shape"}"#)
            .create_async()
            .await;

        let mut config = Config::default();
        config.federation_endpoint = format!("{}/federation", server.url());

        let err = service(config)
            .generate_console_url(&credentials(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FederationError::MissingSigninToken));
    }

    #[tokio::test]
    async fn test_assume_role_and_open_console() {
        let mut sts_server = mockito::Server::new_async().await;
        sts_server
            .mock("POST", "/")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "AssumeRoleWithWebIdentityResponse": {
                        "AssumeRoleWithWebIdentityResult": {
                            "Credentials": {
                                "AccessKeyId": "ASIAEXAMPLE",
                                "SecretAccessKey": "secret",
                                "SessionToken": "token",
                                "Expiration": 1_893_456_000.0
                            }
                        }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut fed_server = mockito::Server::new_async().await;
        fed_server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"SigninToken":"T"}"#)
            .create_async()
            .await;

        let mut config = Config::default();
        config.sts_endpoint = Some(sts_server.url());
        config.federation_endpoint = format!("{}/federation", fed_server.url());

        let service = service(config);
        let user = user(Some("jdoe"), Some("j@example.com"), "sub-1");
        let (session, url) = service
            .assume_role_and_open_console(ROLE_ARN, &user, "id-token", None)
            .await
            .unwrap();

        assert_eq!(session.role_arn, ROLE_ARN);
        assert!(session.session_name.starts_with("jdoe-"));
        assert_eq!(session.credentials.access_key_id, "ASIAEXAMPLE");
        assert_eq!(session.user.sub, "sub-1");
        assert!(url.contains("Action=login"));

        // The role landed in history
        let items = service.history().list().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].arn, ROLE_ARN);
    }

    #[tokio::test]
    async fn test_open_console_rejects_invalid_arn_before_network() {
        let mut sts_server = mockito::Server::new_async().await;
        let mock = sts_server.mock("POST", "/").expect(0).create_async().await;

        let mut config = Config::default();
        config.sts_endpoint = Some(sts_server.url());

        let service = service(config);
        let err = service
            .assume_role_and_open_console("not-an-arn", &user(None, None, "s"), "t", None)
            .await
            .unwrap_err();
        assert!(matches!(err, FederationError::InvalidRoleArn(_)));
        assert!(service.history().list().unwrap().is_empty());
        mock.assert_async().await;
    }
}
