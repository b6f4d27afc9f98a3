//! Client configuration for the backend endpoint, credential storage and guard
//! paths. Values come from CLI flags with `TRADERDASH_*` environment fallbacks;
//! the obfuscation key is public configuration, not a secret.

use crate::errors::AppError;
use std::{path::PathBuf, time::Duration};
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_STORAGE_NAMESPACE: &str = "trader";
pub const DEFAULT_OBFUSCATION_KEY: &str = "trader_app_secret_key";
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_HOME_PATH: &str = "/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Minutes before expiry at which the token status reports "near expiry".
pub const DEFAULT_WARNING_THRESHOLD_MINUTES: i64 = 5;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub state_file: Option<PathBuf>,
    pub storage_namespace: String,
    pub obfuscation_key: String,
    pub login_path: String,
    pub default_path: String,
    pub warning_threshold_minutes: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            state_file: None,
            storage_namespace: DEFAULT_STORAGE_NAMESPACE.to_string(),
            obfuscation_key: DEFAULT_OBFUSCATION_KEY.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            default_path: DEFAULT_HOME_PATH.to_string(),
            warning_threshold_minutes: DEFAULT_WARNING_THRESHOLD_MINUTES,
        }
    }
}

impl AppConfig {
    #[must_use]
    pub fn new(api_base_url: String) -> Self {
        Self {
            api_base_url,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.state_file = Some(path);
        self
    }

    #[must_use]
    pub fn with_storage_namespace(mut self, namespace: String) -> Self {
        self.storage_namespace = namespace;
        self
    }

    #[must_use]
    pub fn with_obfuscation_key(mut self, key: String) -> Self {
        self.obfuscation_key = key;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_paths(mut self, login_path: String, default_path: String) -> Self {
        self.login_path = login_path;
        self.default_path = default_path;
        self
    }

    #[must_use]
    pub fn with_warning_threshold_minutes(mut self, minutes: i64) -> Self {
        self.warning_threshold_minutes = minutes;
        self
    }

    /// Checks the values that would otherwise fail later at request time.
    ///
    /// # Errors
    /// Returns `AppError::Config` when the base URL is not http(s), the
    /// obfuscation key or namespace is empty, or the timeout is zero.
    pub fn validate(&self) -> Result<(), AppError> {
        let url = Url::parse(self.api_base_url.trim())
            .map_err(|err| AppError::Config(format!("Invalid API base URL: {err}")))?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(AppError::Config(format!(
                    "Unsupported API base URL scheme: {scheme}"
                )))
            }
        }

        if self.obfuscation_key.is_empty() {
            return Err(AppError::Config(
                "Obfuscation key must not be empty.".to_string(),
            ));
        }

        if self.storage_namespace.trim().is_empty() {
            return Err(AppError::Config(
                "Storage namespace must not be empty.".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(AppError::Config(
                "Request timeout must be greater than zero.".to_string(),
            ));
        }

        Ok(())
    }
}
