//! Configuration management for relaysync.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cidr::NormalizeOptions;
use crate::error::SyncError;
use crate::transport::RetryPolicy;
use crate::validation::{parse_interval, validate_https_url, validate_list_name};

pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Cloudflare caps list item pages at 500
pub const MAX_PAGE_SIZE: usize = 500;

pub const DEFAULT_MAX_LIST_ITEMS: usize = 20_000;

const ENV_ACCOUNT_ID: &str = "RELAYSYNC_ACCOUNT_ID";
const ENV_API_TOKEN: &str = "RELAYSYNC_API_TOKEN";
const ENV_LIST_NAME: &str = "RELAYSYNC_LIST_NAME";

/// Secure string type that zeroizes memory on drop
/// Used for the API token
#[derive(Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cloudflare account identifier
    pub account_id: String,

    /// API token; `RELAYSYNC_API_TOKEN` or `api_token_env` take precedence
    pub api_token: SecureString,

    /// Environment variable name to read the token from (optional)
    pub api_token_env: Option<String>,

    /// Name of the managed IP list
    pub list_name: String,

    /// Description used when the list has to be created
    pub list_description: String,

    /// Upstream feeds
    pub sources: SourcesConfig,

    /// Total attempts per HTTP request
    pub retry_attempts: u32,

    /// Delay before the first retry, doubled on each further retry
    pub retry_base_delay_ms: u64,

    /// Promote bare IPv6 addresses to /64 instead of dropping them
    pub promote_ipv6_to_slash64: bool,

    /// List store API root
    pub api_base: String,

    /// Items requested per page when reading the list
    pub page_size: usize,

    /// Upper bound on items read back from the list
    pub max_list_items: usize,

    /// Trigger interval for `serve` (e.g. "1h", "30m")
    pub schedule: String,

    /// Address of the informational endpoint
    pub listen: SocketAddr,

    /// Lock file guarding one-shot runs
    pub lock_file: PathBuf,

    /// Alert destinations
    pub alerts: AlertsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            api_token: SecureString::default(),
            api_token_env: None,
            list_name: String::new(),
            list_description: "iCloud Private Relay egress ranges (managed by relaysync)"
                .to_string(),
            sources: SourcesConfig::default(),
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            promote_ipv6_to_slash64: false,
            api_base: DEFAULT_API_BASE.to_string(),
            page_size: MAX_PAGE_SIZE,
            max_list_items: DEFAULT_MAX_LIST_ITEMS,
            schedule: "1h".to_string(),
            listen: SocketAddr::from(([127, 0, 0, 1], 8787)),
            lock_file: env::temp_dir().join("relaysync.lock"),
            alerts: AlertsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SourcesConfig {
    pub ipv4_url: String,
    pub ipv6_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AlertsConfig {
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
    #[serde(deserialize_with = "deserialize_headers")]
    pub headers: HashMap<String, String>,
    /// Also alert when the list contents were replaced
    pub notify_on_change: bool,
}

/// Deserialize and validate HTTP headers (reject injection attempts)
fn deserialize_headers<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let headers: HashMap<String, String> = HashMap::deserialize(deserializer)?;

    for (key, value) in &headers {
        if key.contains('\r') || key.contains('\n') {
            return Err(serde::de::Error::custom(format!(
                "Invalid header name '{}': contains newline characters",
                key
            )));
        }
        if value.contains('\r') || value.contains('\n') {
            return Err(serde::de::Error::custom(format!(
                "Invalid header value for '{}': contains newline characters",
                key
            )));
        }
        // RFC 7230 token subset
        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_".contains(c))
        {
            return Err(serde::de::Error::custom(format!(
                "Invalid header name '{}': contains invalid characters",
                key
            )));
        }
    }

    Ok(headers)
}

/// Immutable per-run settings derived from a validated [`Config`].
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub account_id: String,
    pub api_token: SecureString,
    pub list_name: String,
    pub list_description: String,
    pub ipv4_url: String,
    pub ipv6_url: String,
    pub retry: RetryPolicy,
    pub normalize: NormalizeOptions,
    pub api_base: String,
    pub page_size: usize,
    pub max_list_items: usize,
    /// Compute the diff but never write
    pub dry_run: bool,
}

impl Config {
    /// Load configuration from a YAML file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from file if it exists, otherwise start from defaults + environment
    pub fn load_or_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            let mut config = Config::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var(ENV_ACCOUNT_ID) {
            if !val.is_empty() {
                self.account_id = val;
            }
        }
        if let Ok(val) = env::var(ENV_LIST_NAME) {
            if !val.is_empty() {
                self.list_name = val;
            }
        }
    }

    /// Get the effective token, checking env vars first
    /// Returns a SecureString that will be zeroed when dropped
    pub fn get_token(&self) -> SecureString {
        if let Some(ref env_name) = self.api_token_env {
            if let Ok(val) = env::var(env_name) {
                return SecureString::new(val);
            }
        }
        if let Ok(val) = env::var(ENV_API_TOKEN) {
            return SecureString::new(val);
        }
        self.api_token.clone()
    }

    /// Trigger interval as a duration
    pub fn schedule_interval(&self) -> Result<Duration, SyncError> {
        parse_interval(&self.schedule)
            .map_err(|e| SyncError::Config(format!("schedule: {}", e)))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), SyncError> {
        let config_err = |e: anyhow::Error| SyncError::Config(e.to_string());

        if self.account_id.trim().is_empty() {
            return Err(SyncError::Config(format!(
                "account_id is not set (config file or {})",
                ENV_ACCOUNT_ID
            )));
        }
        if self.get_token().is_empty() {
            return Err(SyncError::Config(format!(
                "API token is not set (config file, api_token_env or {})",
                ENV_API_TOKEN
            )));
        }
        if self.list_name.is_empty() {
            return Err(SyncError::Config(format!(
                "list_name is not set (config file or {})",
                ENV_LIST_NAME
            )));
        }
        validate_list_name(&self.list_name).map_err(config_err)?;

        validate_https_url("IPv4 source", &self.sources.ipv4_url).map_err(config_err)?;
        validate_https_url("IPv6 source", &self.sources.ipv6_url).map_err(config_err)?;
        validate_https_url("API base", &self.api_base).map_err(config_err)?;

        if self.retry_attempts == 0 {
            return Err(SyncError::Config(
                "retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(SyncError::Config(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if self.max_list_items == 0 {
            return Err(SyncError::Config(
                "max_list_items must be at least 1".to_string(),
            ));
        }
        self.schedule_interval()?;

        if self.alerts.webhook.enabled {
            validate_https_url("Webhook", &self.alerts.webhook.url).map_err(config_err)?;
        }

        Ok(())
    }

    /// Validate and build the immutable settings for one run
    pub fn settings(&self) -> Result<SyncSettings, SyncError> {
        self.validate()?;

        Ok(SyncSettings {
            account_id: self.account_id.trim().to_string(),
            api_token: self.get_token(),
            list_name: self.list_name.clone(),
            list_description: self.list_description.clone(),
            ipv4_url: self.sources.ipv4_url.clone(),
            ipv6_url: self.sources.ipv6_url.clone(),
            retry: RetryPolicy {
                attempts: self.retry_attempts,
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
            },
            normalize: NormalizeOptions {
                promote_ipv6_to_slash64: self.promote_ipv6_to_slash64,
            },
            api_base: self.api_base.trim_end_matches('/').to_string(),
            page_size: self.page_size,
            max_list_items: self.max_list_items,
            dry_run: false,
        })
    }

    /// Save configuration to YAML file atomically
    ///
    /// Uses tempfile + rename so a crash never leaves a half-written file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_atomic(path.as_ref(), &serde_yaml::to_string(self).context("Failed to serialize config")?)
    }

    /// Commented default configuration
    pub fn generate_default_yaml() -> String {
        include_str!("../templates/config.yaml").to_string()
    }
}

/// Write a file via tempfile + rename in the same directory
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    use std::io::Write;
    use tempfile::NamedTempFile;

    let parent_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("Failed to create directory {:?}", parent_dir))?;

    let mut temp_file = NamedTempFile::new_in(parent_dir)
        .context("Failed to create temporary file for config")?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.as_file().sync_all()?;
    temp_file
        .persist(path)
        .with_context(|| format!("Failed to persist config file: {:?}", path))?;

    Ok(())
}
