use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AuthError;

/// Application configuration
///
/// The OIDC fields (`authority`, `clientId`, `scope`, `redirectUri`) are
/// required and validated once at initialize, before any network call.
/// Everything else carries a usable default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// OIDC authority base URL, e.g. https://idp.example
    #[serde(default)]
    pub authority: String,

    /// OAuth2 client identifier registered at the authority
    #[serde(default)]
    pub client_id: String,

    /// Space-separated scope list requested at login
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Redirect URI registered for the authorization-code flow
    #[serde(default)]
    pub redirect_uri: String,

    /// Where the provider should send the browser after a provider-side
    /// logout; falls back to the local root page
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_logout_redirect_uri: Option<String>,

    /// AWS region used to derive the STS endpoint
    #[serde(default = "default_aws_region")]
    pub aws_region: String,

    /// Explicit STS endpoint override (testing / private endpoints)
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sts_endpoint: Option<String>,

    /// AWS console federation endpoint
    #[serde(default = "default_federation_endpoint")]
    pub federation_endpoint: String,

    /// Issuer string embedded in the console login URL
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Default console destination after federated signin
    #[serde(default = "default_console_destination")]
    pub console_destination: String,

    /// Requested role session duration in seconds
    #[serde(default = "default_session_duration")]
    pub session_duration: i64,

    /// Maximum number of remembered role ARNs
    #[serde(default = "default_history_max")]
    pub history_max: usize,

    /// Maximum attempts for the opt-in session refresh backoff
    #[serde(default = "default_refresh_max_attempts")]
    pub refresh_max_attempts: u32,

    /// Base delay in milliseconds for the refresh backoff
    #[serde(default = "default_refresh_base_delay_ms")]
    pub refresh_base_delay_ms: u64,

    /// HTTP proxy URL (optional)
    /// Supported formats: http://host:port, https://host:port, socks5://host:port
    #[serde(default)]
    pub proxy_url: Option<String>,

    /// Proxy authentication username (optional)
    #[serde(default)]
    pub proxy_username: Option<String>,

    /// Proxy authentication password (optional)
    #[serde(default)]
    pub proxy_password: Option<String>,

    /// Durable store file path
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Config file path (runtime metadata, not written to JSON)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_scope() -> String {
    "openid profile email".to_string()
}

fn default_aws_region() -> String {
    "us-east-1".to_string()
}

fn default_federation_endpoint() -> String {
    "https://signin.aws.amazon.com/federation".to_string()
}

fn default_issuer() -> String {
    "consolefed".to_string()
}

fn default_console_destination() -> String {
    "https://console.aws.amazon.com/".to_string()
}

fn default_session_duration() -> i64 {
    3600
}

fn default_history_max() -> usize {
    crate::aws::history::DEFAULT_HISTORY_MAX
}

fn default_refresh_max_attempts() -> u32 {
    3
}

fn default_refresh_base_delay_ms() -> u64 {
    500
}

fn default_store_path() -> String {
    "store.json".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            authority: String::new(),
            client_id: String::new(),
            scope: default_scope(),
            redirect_uri: String::new(),
            post_logout_redirect_uri: None,
            aws_region: default_aws_region(),
            sts_endpoint: None,
            federation_endpoint: default_federation_endpoint(),
            issuer: default_issuer(),
            console_destination: default_console_destination(),
            session_duration: default_session_duration(),
            history_max: default_history_max(),
            refresh_max_attempts: default_refresh_max_attempts(),
            refresh_base_delay_ms: default_refresh_base_delay_ms(),
            proxy_url: None,
            proxy_username: None,
            proxy_password: None,
            store_path: default_store_path(),
            config_path: None,
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            // Config file doesn't exist, return default config
            let mut config = Self::default();
            config.config_path = Some(path.to_path_buf());
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Validate required OIDC fields; raised before any network call
    pub fn validate(&self) -> Result<(), AuthError> {
        let mut missing = Vec::new();
        if self.authority.trim().is_empty() {
            missing.push("authority");
        }
        if self.client_id.trim().is_empty() {
            missing.push("clientId");
        }
        if self.scope.trim().is_empty() {
            missing.push("scope");
        }
        if self.redirect_uri.trim().is_empty() {
            missing.push("redirectUri");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthError::Configuration(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Effective STS endpoint
    /// Prefers the explicit override, otherwise derives from the region
    pub fn effective_sts_endpoint(&self) -> String {
        self.sts_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://sts.{}.amazonaws.com", self.aws_region))
    }

    /// Effective post-logout redirect target
    /// Falls back to the local root page
    pub fn effective_post_logout_redirect_uri(&self) -> String {
        self.post_logout_redirect_uri
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}/", self.host, self.port))
    }

    /// Get config file path (if available)
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Write current config back to original config file
    pub fn save(&self) -> anyhow::Result<()> {
        let path = self
            .config_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Config file path unknown, cannot save config"))?;

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}
