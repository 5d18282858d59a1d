//! Error types for broker operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`BrokerError`].
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors that can occur while producing role credentials.
///
/// All errors implement `std::error::Error` and can be chained with `source()`.
/// A profile that is not an SSO profile is not an error; see
/// [`Resolution::NotSso`](crate::profile::Resolution::NotSso).
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The qualified profile section is absent from the configuration file.
    #[error("profile [{0}] not found in AWS CLI configuration")]
    ProfileNotFound(String),

    /// The profile references an `sso-session` block that does not exist.
    #[error("profile [{profile}] references missing sso-session [{session}]")]
    SessionNotFound {
        /// Profile name
        profile: String,
        /// Referenced session name
        session: String,
    },

    /// A required SSO attribute is missing after merging the session block.
    #[error("profile [{profile}] is missing required key `{key}`")]
    MissingProfileKey {
        /// Profile name
        profile: String,
        /// Missing key
        key: String,
    },

    /// Profile name contains characters that cannot be used safely.
    #[error("invalid profile name: {0}")]
    InvalidProfileName(String),

    /// No usable session token could be produced.
    #[error("could not retrieve SSO token for [{profile}]: {reason}")]
    TokenRetrieval {
        /// Profile name
        profile: String,
        /// Why the token was unusable
        reason: String,
    },

    /// The external login program exited unsuccessfully.
    #[error("{program} login failed with exit code {}", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    AuthenticatorFailure {
        /// Program that was invoked
        program: String,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
    },

    /// The role-credential service rejected or failed the request.
    #[error("role credential exchange failed for role {role} in account {account}: {message}")]
    Exchange {
        /// Account id
        account: String,
        /// Role name
        role: String,
        /// Full upstream error context
        message: String,
        /// Underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Reading a configuration or credentials file failed.
    #[error("failed to read {}: {source}", .path.display())]
    ConfigRead {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Writing a configuration or credentials file failed.
    #[error("failed to write {}: {source}", .path.display())]
    ConfigWrite {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A configuration or credentials file is not valid INI.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        /// File path
        path: PathBuf,
        /// Syntax error
        #[source]
        source: crate::ini::ParseError,
    },

    /// A required external tool is not installed or is the wrong version.
    #[error("required tool missing: {0}")]
    ExternalToolMissing(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error (catch-all).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BrokerError {
    /// Returns guidance for the user, if there is an obvious next step.
    ///
    /// # Example
    ///
    /// ```
    /// use ssobroker::BrokerError;
    ///
    /// let err = BrokerError::ProfileNotFound("work".to_string());
    /// assert!(err.hint().unwrap().contains("aws configure sso"));
    /// ```
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ProfileNotFound(_) => {
                Some("You can create a new profile using the following command: aws configure sso")
            }
            Self::SessionNotFound { .. } | Self::MissingProfileKey { .. } => {
                Some("Re-run `aws configure sso` to repair the profile")
            }
            Self::ExternalToolMissing(_) => Some(
                "Install AWS CLI version 2: https://docs.aws.amazon.com/cli/latest/userguide/getting-started-install.html",
            ),
            Self::TokenRetrieval { .. } | Self::AuthenticatorFailure { .. } => {
                Some("Try logging in manually with: aws sso login --profile <name>")
            }
            _ => None,
        }
    }
}
