//! AssumeRoleWithWebIdentity client
//!
//! Calls the STS Query API directly with `Accept: application/json`, so the
//! response arrives as JSON instead of the default XML envelope.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{FederationError, enhance_sts_error};

const STS_API_VERSION: &str = "2011-06-15";

/// Role session duration bounds in seconds
pub const MIN_DURATION_SECS: i64 = 900;
pub const MAX_DURATION_SECS: i64 = 43200;

/// Temporary AWS credentials
///
/// The exchange is rejected unless all four fields are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

/// Identity of the assumed role, as reported by STS
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssumedRoleUser {
    pub arn: String,
    pub assumed_role_id: String,
}

#[derive(Debug, Deserialize)]
struct AssumeRoleEnvelope {
    #[serde(rename = "AssumeRoleWithWebIdentityResponse")]
    response: AssumeRoleResponse,
}

#[derive(Debug, Deserialize)]
struct AssumeRoleResponse {
    #[serde(rename = "AssumeRoleWithWebIdentityResult")]
    result: AssumeRoleResult,
}

#[derive(Debug, Deserialize)]
struct AssumeRoleResult {
    #[serde(rename = "Credentials")]
    credentials: Option<RawCredentials>,
    #[serde(rename = "AssumedRoleUser")]
    assumed_role_user: Option<AssumedRoleUser>,
}

/// Credentials with every field optional, so completeness can be enforced
/// explicitly instead of surfacing as a deserialization error
#[derive(Debug, Deserialize)]
struct RawCredentials {
    #[serde(rename = "AccessKeyId")]
    access_key_id: Option<String>,
    #[serde(rename = "SecretAccessKey")]
    secret_access_key: Option<String>,
    #[serde(rename = "SessionToken")]
    session_token: Option<String>,
    #[serde(rename = "Expiration")]
    expiration: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StsErrorEnvelope {
    #[serde(rename = "Error")]
    error: StsErrorBody,
}

#[derive(Debug, Deserialize)]
struct StsErrorBody {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

pub struct StsClient {
    http: reqwest::Client,
    endpoint: String,
}

impl StsClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Exchange a web-identity token for temporary credentials
    ///
    /// `duration_seconds` outside [900, 43200] is rejected before any
    /// network call.
    pub async fn assume_role_with_web_identity(
        &self,
        role_arn: &str,
        web_identity_token: &str,
        session_name: &str,
        duration_seconds: i64,
    ) -> Result<(AwsCredentials, Option<AssumedRoleUser>), FederationError> {
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&duration_seconds) {
            return Err(FederationError::InvalidDuration(duration_seconds));
        }

        let duration = duration_seconds.to_string();
        let form = [
            ("Action", "AssumeRoleWithWebIdentity"),
            ("Version", STS_API_VERSION),
            ("RoleArn", role_arn),
            ("RoleSessionName", session_name),
            ("WebIdentityToken", web_identity_token),
            ("DurationSeconds", duration.as_str()),
        ];

        tracing::info!("AssumeRoleWithWebIdentity: {} as {}", role_arn, session_name);

        let response = self
            .http
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| FederationError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FederationError::Http(e.to_string()))?;

        if !status.is_success() {
            if let Ok(envelope) = serde_json::from_str::<StsErrorEnvelope>(&body) {
                let info = enhance_sts_error(&envelope.error.code, &envelope.error.message);
                tracing::warn!(
                    "STS rejected AssumeRoleWithWebIdentity ({}): {}",
                    info.code,
                    info.original_message
                );
                return Err(info.into());
            }
            return Err(FederationError::Http(format!(
                "STS returned status {status}: {body}"
            )));
        }

        let envelope: AssumeRoleEnvelope = serde_json::from_str(&body)
            .map_err(|e| FederationError::Http(format!("malformed STS response: {e}")))?;

        let raw = envelope
            .response
            .result
            .credentials
            .ok_or(FederationError::IncompleteCredentials)?;
        let credentials = validate_credentials(raw)?;

        Ok((credentials, envelope.response.result.assumed_role_user))
    }
}

/// Enforce the full credential quadruple
fn validate_credentials(raw: RawCredentials) -> Result<AwsCredentials, FederationError> {
    let access_key_id = raw
        .access_key_id
        .filter(|v| !v.is_empty())
        .ok_or(FederationError::IncompleteCredentials)?;
    let secret_access_key = raw
        .secret_access_key
        .filter(|v| !v.is_empty())
        .ok_or(FederationError::IncompleteCredentials)?;
    let session_token = raw
        .session_token
        .filter(|v| !v.is_empty())
        .ok_or(FederationError::IncompleteCredentials)?;
    let expiration = raw
        .expiration
        .as_ref()
        .and_then(parse_expiration)
        .ok_or(FederationError::IncompleteCredentials)?;

    Ok(AwsCredentials {
        access_key_id,
        secret_access_key,
        session_token,
        expiration,
    })
}

/// The JSON rendering of the Query API encodes `Expiration` as fractional
/// epoch seconds; RFC3339 strings are accepted as well for compatibility.
fn parse_expiration(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::Number(n) => {
            let secs = n.as_f64()?;
            Utc.timestamp_millis_opt((secs * 1000.0) as i64).single()
        }
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/MyRole";

    fn success_body(expiration: serde_json::Value) -> String {
        serde_json::json!({
            "AssumeRoleWithWebIdentityResponse": {
                "AssumeRoleWithWebIdentityResult": {
                    "Credentials": {
                        "AccessKeyId": "ASIAEXAMPLE",
                        "SecretAccessKey": "secret",
                        "SessionToken": "token",
                        "Expiration": expiration
                    },
                    "AssumedRoleUser": {
                        "Arn": "arn:aws:sts::123456789012:assumed-role/MyRole/session",
                        "AssumedRoleId": "AROEXAMPLE:session"
                    }
                },
                "ResponseMetadata": {"RequestId": "req-1"}
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_duration_below_minimum_rejected_without_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/").expect(0).create_async().await;

        let client = StsClient::new(reqwest::Client::new(), server.url());
        let err = client
            .assume_role_with_web_identity(ROLE_ARN, "idtoken", "session", 899)
            .await
            .unwrap_err();
        assert!(matches!(err, FederationError::InvalidDuration(899)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_duration_above_maximum_rejected_without_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/").expect(0).create_async().await;

        let client = StsClient::new(reqwest::Client::new(), server.url());
        let err = client
            .assume_role_with_web_identity(ROLE_ARN, "idtoken", "session", 43201)
            .await
            .unwrap_err();
        assert!(matches!(err, FederationError::InvalidDuration(43201)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_successful_exchange_with_epoch_expiration() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("Action".into(), "AssumeRoleWithWebIdentity".into()),
                mockito::Matcher::UrlEncoded("RoleArn".into(), ROLE_ARN.into()),
                mockito::Matcher::UrlEncoded("DurationSeconds".into(), "3600".into()),
            ]))
            .with_status(200)
            .with_body(success_body(serde_json::json!(1_893_456_000.0)))
            .create_async()
            .await;

        let client = StsClient::new(reqwest::Client::new(), server.url());
        let (credentials, assumed) = client
            .assume_role_with_web_identity(ROLE_ARN, "idtoken", "session", 3600)
            .await
            .unwrap();

        assert_eq!(credentials.access_key_id, "ASIAEXAMPLE");
        assert_eq!(credentials.expiration.timestamp(), 1_893_456_000);
        assert_eq!(
            assumed.unwrap().assumed_role_id,
            "AROEXAMPLE:session"
        );
    }

    #[tokio::test]
    async fn test_successful_exchange_with_rfc3339_expiration() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(success_body(serde_json::json!("2030-01-01T00:00:00Z")))
            .create_async()
            .await;

        let client = StsClient::new(reqwest::Client::new(), server.url());
        let (credentials, _) = client
            .assume_role_with_web_identity(ROLE_ARN, "idtoken", "session", 3600)
            .await
            .unwrap();
        assert_eq!(
            credentials.expiration,
            Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_session_token_is_incomplete() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "AssumeRoleWithWebIdentityResponse": {
                        "AssumeRoleWithWebIdentityResult": {
                            "Credentials": {
                                "AccessKeyId": "ASIAEXAMPLE",
                                "SecretAccessKey": "secret",
                                "Expiration": 1_893_456_000.0
                            }
                        }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = StsClient::new(reqwest::Client::new(), server.url());
        let err = client
            .assume_role_with_web_identity(ROLE_ARN, "idtoken", "session", 3600)
            .await
            .unwrap_err();
        assert!(matches!(err, FederationError::IncompleteCredentials));
    }

    #[tokio::test]
    async fn test_sts_error_is_typed_and_enhanced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(403)
            .with_body(
                r#"{"Error":{"Code":"InvalidIdentityToken","Message":"Token rejected","Type":"Sender"},"RequestId":"r"}"#,
            )
            .create_async()
            .await;

        let client = StsClient::new(reqwest::Client::new(), server.url());
        let err = client
            .assume_role_with_web_identity(ROLE_ARN, "idtoken", "session", 3600)
            .await
            .unwrap_err();
        match err {
            FederationError::Sts {
                code,
                user_message,
                original_message,
            } => {
                assert_eq!(code, "InvalidIdentityToken");
                assert!(user_message.contains("Sign in again"));
                assert_eq!(original_message, "Token rejected");
            }
            other => panic!("expected Sts error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_expiration_rejects_other_shapes() {
        assert!(parse_expiration(&serde_json::json!(null)).is_none());
        assert!(parse_expiration(&serde_json::json!({"at": 1})).is_none());
        assert!(parse_expiration(&serde_json::json!("not-a-date")).is_none());
    }
}
