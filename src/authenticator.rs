//! Delegation to the external interactive login.
//!
//! The broker never speaks the federated login protocol itself. When no
//! usable session token exists it hands the profile to an [`Authenticator`]
//! and waits for it to populate the token cache.

use crate::cli::{find_command, run_command, run_interactive};
use crate::profile::bare_profile_name;
use crate::{BrokerError, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Marker `aws --version` prints for the only supported major version.
const AWS_CLI_V2_MARKER: &str = "aws-cli/2";

/// Interactive login capability.
///
/// Implementations must be `Send + Sync` so they can be boxed into the
/// pipeline.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns the authenticator name (e.g., "aws-cli", "mock").
    fn name(&self) -> &str;

    /// Verifies prerequisites before any pipeline work starts.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ExternalToolMissing`] if the login tool is not
    /// usable.
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Performs an interactive login for `profile_name`.
    ///
    /// Blocks until the login completes; there is no timeout or cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::AuthenticatorFailure`] if the login does not
    /// succeed.
    async fn login(&self, profile_name: &str) -> Result<()>;
}

/// Authenticator that shells out to `aws sso login`.
#[derive(Debug, Clone)]
pub struct AwsCliAuthenticator {
    program: String,
    search_path: Option<OsString>,
}

impl AwsCliAuthenticator {
    /// Creates an authenticator invoking `program` (normally `aws`).
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            search_path: None,
        }
    }

    /// Looks the program up in `paths` (`PATH` syntax) instead of `PATH`.
    pub fn with_search_path(mut self, paths: impl Into<OsString>) -> Self {
        self.search_path = Some(paths.into());
        self
    }

    /// Program that will be invoked.
    pub fn program(&self) -> &str {
        &self.program
    }

    fn resolve(&self) -> Result<PathBuf> {
        find_command(&self.program, self.search_path.as_deref()).ok_or_else(|| {
            BrokerError::ExternalToolMissing(format!(
                "{} command not found - do you have AWS CLI version 2 installed?",
                self.program
            ))
        })
    }
}

impl Default for AwsCliAuthenticator {
    fn default() -> Self {
        Self::new("aws")
    }
}

#[async_trait]
impl Authenticator for AwsCliAuthenticator {
    fn name(&self) -> &str {
        "aws-cli"
    }

    async fn init(&self) -> Result<()> {
        let program = self.resolve()?;

        let version = run_command(&program.to_string_lossy(), &["--version"])
            .await
            .map_err(|e| match e {
                BrokerError::AuthenticatorFailure { .. } => BrokerError::ExternalToolMissing(
                    format!("{} --version failed", self.program),
                ),
                other => other,
            })?;
        debug!(version = %version.trim(), "found login program");

        if !version.contains(AWS_CLI_V2_MARKER) {
            return Err(BrokerError::ExternalToolMissing(format!(
                "AWS CLI version 2 not found ({} reports {:?})",
                self.program,
                version.trim()
            )));
        }

        Ok(())
    }

    async fn login(&self, profile_name: &str) -> Result<()> {
        let profile = bare_profile_name(profile_name);
        warn!(profile = %profile, "invoking session login");

        let program = self.resolve()?;
        run_interactive(&program.to_string_lossy(), &["sso", "login", "--profile", profile]).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    /// Writes an executable shell script standing in for the login program.
    fn fake_cli(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-aws");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_init_accepts_v2() {
        let dir = tempdir().unwrap();
        let cli = fake_cli(
            dir.path(),
            "echo 'aws-cli/2.15.30 Python/3.11.8 Linux/6.5.0 exe/x86_64.ubuntu.22'",
        );

        let auth = AwsCliAuthenticator::new(cli.to_string_lossy());
        auth.init().await.unwrap();
    }

    #[tokio::test]
    async fn test_init_rejects_v1() {
        let dir = tempdir().unwrap();
        let cli = fake_cli(dir.path(), "echo 'aws-cli/1.29.0 Python/3.8.10'");

        let auth = AwsCliAuthenticator::new(cli.to_string_lossy());
        let err = auth.init().await.unwrap_err();
        assert!(matches!(err, BrokerError::ExternalToolMissing(ref m) if m.contains("version 2")));
    }

    #[tokio::test]
    async fn test_init_finds_program_on_search_path() {
        let dir = tempdir().unwrap();
        fake_cli(dir.path(), "echo 'aws-cli/2.15.30 Python/3.11.8'");

        // only the fake lives on the search path, no `which` executable
        let auth = AwsCliAuthenticator::new("fake-aws").with_search_path(dir.path());
        auth.init().await.unwrap();
    }

    #[tokio::test]
    async fn test_init_program_absent_from_search_path() {
        let dir = tempdir().unwrap();
        let auth = AwsCliAuthenticator::new("aws").with_search_path(dir.path());

        let err = auth.init().await.unwrap_err();
        assert!(matches!(err, BrokerError::ExternalToolMissing(_)));
        assert!(err.hint().is_some());
    }

    #[tokio::test]
    async fn test_init_missing_program() {
        let auth = AwsCliAuthenticator::new("nonexistent-command-12345");
        let err = auth.init().await.unwrap_err();
        assert!(matches!(err, BrokerError::ExternalToolMissing(_)));
    }

    #[tokio::test]
    async fn test_login_passes_bare_profile_name() {
        let dir = tempdir().unwrap();
        let args_file = dir.path().join("args");
        let cli = fake_cli(
            dir.path(),
            &format!("echo \"$@\" > '{}'", args_file.display()),
        );

        let auth = AwsCliAuthenticator::new(cli.to_string_lossy());
        auth.login("profile work").await.unwrap();

        let args = std::fs::read_to_string(&args_file).unwrap();
        assert_eq!(args.trim(), "sso login --profile work");
    }

    #[tokio::test]
    async fn test_login_failure_is_hard_error() {
        let dir = tempdir().unwrap();
        let cli = fake_cli(dir.path(), "exit 255");

        let auth = AwsCliAuthenticator::new(cli.to_string_lossy());
        let err = auth.login("work").await.unwrap_err();
        assert!(matches!(
            err,
            BrokerError::AuthenticatorFailure { code: Some(255), .. }
        ));
    }
}
