//! STS error enhancement module
//!
//! Transforms STS error codes into user-friendly messages and defines the
//! federation error taxonomy.

use thiserror::Error;

use crate::error::StorageError;

/// Federation and role-history errors
#[derive(Debug, Error)]
pub enum FederationError {
    /// Rejected before any network call
    #[error("session duration {0}s is outside the allowed range 900..=43200")]
    InvalidDuration(i64),

    #[error("'{0}' is not a valid IAM role ARN")]
    InvalidRoleArn(String),

    /// STS response lacked part of the credential quadruple
    #[error("STS response is missing part of the credential set")]
    IncompleteCredentials,

    /// Federation endpoint answered without a SigninToken
    #[error("federation endpoint returned no signin token")]
    MissingSigninToken,

    /// Typed STS failure with an actionable message
    #[error("{user_message}")]
    Sts {
        code: String,
        user_message: String,
        original_message: String,
    },

    #[error("request failed: {0}")]
    Http(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Structured information about an STS error
#[derive(Debug, Clone)]
pub struct StsErrorInfo {
    /// Error code from STS
    pub code: String,
    /// Enhanced, user-friendly message for end users
    pub user_message: String,
    /// Original message from STS (for logging)
    pub original_message: String,
}

/// Enhances an STS error code with a user-friendly message
pub fn enhance_sts_error(code: &str, message: &str) -> StsErrorInfo {
    let user_message = match code {
        "InvalidIdentityToken" => {
            "AWS rejected the identity token. Sign in again and retry.".to_string()
        }
        "ExpiredTokenException" | "ExpiredToken" => {
            "The identity token has expired. Sign in again to obtain a fresh one.".to_string()
        }
        "AccessDenied" | "AccessDeniedException" => {
            "Access denied. Check that the role trusts your identity provider and your account."
                .to_string()
        }
        "AssumeRoleUnauthorizedOperation" => {
            "You are not authorized to assume this role.".to_string()
        }
        "InvalidParameterValue" => {
            format!("Invalid request parameter: {message}")
        }
        "IDPCommunicationError" => {
            "AWS could not reach the identity provider. Please try again later.".to_string()
        }
        "" => message.to_string(),
        _ => {
            // Unknown code - keep original message with code suffix
            format!("{message} (code: {code})")
        }
    };

    StsErrorInfo {
        code: code.to_string(),
        user_message,
        original_message: message.to_string(),
    }
}

impl From<StsErrorInfo> for FederationError {
    fn from(info: StsErrorInfo) -> Self {
        FederationError::Sts {
            code: info.code,
            user_message: info.user_message,
            original_message: info.original_message,
        }
    }
}
