//! Broker and logging configuration.

use crate::{BrokerError, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location.
pub const CONFIG_FILE_ENV: &str = "AWS_CONFIG_FILE";
/// Environment variable overriding the credentials file location.
pub const CREDENTIALS_FILE_ENV: &str = "AWS_SHARED_CREDENTIALS_FILE";
/// Environment variable providing the fallback region.
pub const DEFAULT_REGION_ENV: &str = "AWS_DEFAULT_REGION";
/// Region used when neither the profile nor the environment names one.
pub const FALLBACK_REGION: &str = "us-east-1";

/// Locations and behaviour of a broker run.
///
/// Use the builder pattern to adjust the defaults:
///
/// ```
/// use ssobroker::BrokerConfig;
///
/// let config = BrokerConfig::from_lookup("/home/me", |_| None)
///     .with_credentials_file("/tmp/credentials")
///     .with_clone_to_default(false);
///
/// assert_eq!(config.config_file.to_str(), Some("/home/me/.aws/config"));
/// assert_eq!(config.default_region, "us-east-1");
/// assert!(!config.clone_to_default);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Configuration file holding profiles and sso-session blocks
    pub config_file: PathBuf,

    /// Shared credentials file receiving role credentials
    pub credentials_file: PathBuf,

    /// Directory of cached session tokens written by the login program
    pub sso_cache_dir: PathBuf,

    /// Region written when the profile has none
    pub default_region: String,

    /// Login program (default: "aws")
    pub login_program: String,

    /// Copy non-default profiles into `[default]` after storing credentials
    pub clone_to_default: bool,

    /// Role-credential service endpoint override
    pub endpoint_url: Option<String>,
}

impl BrokerConfig {
    /// Builds a configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Other`] if the home directory cannot be
    /// determined.
    pub fn from_env() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            BrokerError::Other(anyhow::anyhow!("could not determine home directory"))
        })?;
        Ok(Self::from_lookup(home, |key| std::env::var(key).ok()))
    }

    /// Builds a configuration from `home` and an environment lookup.
    ///
    /// Empty variables are treated as unset. A leading `~/` in a path
    /// variable is expanded against `home`.
    pub fn from_lookup<F>(home: impl AsRef<Path>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = home.as_ref();
        let aws_dir = home.join(".aws");
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Self {
            config_file: var(CONFIG_FILE_ENV)
                .map(|v| expand_home(&v, home))
                .unwrap_or_else(|| aws_dir.join("config")),
            credentials_file: var(CREDENTIALS_FILE_ENV)
                .map(|v| expand_home(&v, home))
                .unwrap_or_else(|| aws_dir.join("credentials")),
            sso_cache_dir: aws_dir.join("sso").join("cache"),
            default_region: var(DEFAULT_REGION_ENV)
                .unwrap_or_else(|| FALLBACK_REGION.to_string()),
            login_program: "aws".to_string(),
            clone_to_default: true,
            endpoint_url: None,
        }
    }

    /// Sets the config file location.
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = path.into();
        self
    }

    /// Sets the credentials file location.
    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = path.into();
        self
    }

    /// Sets the session token cache directory.
    pub fn with_sso_cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sso_cache_dir = path.into();
        self
    }

    /// Sets the fallback region.
    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = region.into();
        self
    }

    /// Sets the login program.
    pub fn with_login_program(mut self, program: impl Into<String>) -> Self {
        self.login_program = program.into();
        self
    }

    /// Enables or disables cloning into `[default]`.
    pub fn with_clone_to_default(mut self, enabled: bool) -> Self {
        self.clone_to_default = enabled;
        self
    }

    /// Sets the role-credential service endpoint.
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }
}

fn expand_home(value: &str, home: &Path) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(value),
    }
}

/// Output settings for the log subscriber.
///
/// Built once at the process boundary and handed to the subscriber
/// initialisation; nothing else reads verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    /// Report per-stage progress, not only warnings and errors
    pub verbose: bool,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
    /// Use ANSI colors
    pub ansi: bool,
}

impl LogConfig {
    /// Creates a log configuration; colors are disabled when `NO_COLOR` or
    /// `CLI_NO_COLOR` is set in `lookup`.
    pub fn from_lookup<F>(verbose: bool, json: bool, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let no_color = ["NO_COLOR", "CLI_NO_COLOR"]
            .iter()
            .any(|key| lookup(key).is_some_and(|v| !v.is_empty()));

        Self {
            verbose,
            json,
            ansi: !no_color,
        }
    }

    /// Filter directive used when `RUST_LOG` is unset.
    pub fn default_filter(&self) -> &'static str {
        if self.verbose {
            "info"
        } else {
            "warn"
        }
    }
}
