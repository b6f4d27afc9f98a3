use crate::{
    cli::commands::backend,
    config::{AppConfig, DEFAULT_WARNING_THRESHOLD_MINUTES},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{path::PathBuf, time::Duration};

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_url: String,
    pub timeout_secs: u64,
    pub state_file: PathBuf,
    pub storage_namespace: String,
    pub obfuscation_key: SecretString,
    pub login_path: String,
    pub home_path: String,
    pub warning_minutes: i64,
}

impl GlobalArgs {
    /// # Errors
    /// Returns an error if a required global argument is missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let string = |id: &str| -> Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .with_context(|| format!("missing required argument: --{id}"))
        };

        Ok(Self {
            api_url: string(backend::ARG_API_URL)?,
            timeout_secs: matches
                .get_one::<u64>(backend::ARG_TIMEOUT)
                .copied()
                .context("missing required argument: --timeout")?,
            state_file: PathBuf::from(string(backend::ARG_STATE_FILE)?),
            storage_namespace: string(backend::ARG_STORAGE_NAMESPACE)?,
            obfuscation_key: SecretString::from(string(backend::ARG_OBFUSCATION_KEY)?),
            login_path: string(backend::ARG_LOGIN_PATH)?,
            home_path: string(backend::ARG_HOME_PATH)?,
            warning_minutes: matches
                .get_one::<i64>(backend::ARG_WARNING_MINUTES)
                .copied()
                .unwrap_or(DEFAULT_WARNING_THRESHOLD_MINUTES),
        })
    }

    /// # Errors
    /// Returns an error if the resulting configuration is invalid.
    pub fn to_config(&self) -> Result<AppConfig> {
        let config = AppConfig::new(self.api_url.clone())
            .with_request_timeout(Duration::from_secs(self.timeout_secs))
            .with_state_file(self.state_file.clone())
            .with_storage_namespace(self.storage_namespace.clone())
            .with_obfuscation_key(self.obfuscation_key.expose_secret().to_string())
            .with_paths(self.login_path.clone(), self.home_path.clone())
            .with_warning_threshold_minutes(self.warning_minutes);

        config.validate()?;

        Ok(config)
    }
}
