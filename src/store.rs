//! Credential persistence and the default-profile alias.

use crate::exchange::RoleCredentials;
use crate::ini::{IniFile, Section};
use crate::profile::{bare_profile_name, qualified_section, DEFAULT_PROFILE};
use crate::{BrokerError, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Region key in a credentials section.
pub const REGION_KEY: &str = "region";
/// Access key id key in a credentials section.
pub const ACCESS_KEY_ID_KEY: &str = "aws_access_key_id";
/// Secret access key key in a credentials section.
pub const SECRET_ACCESS_KEY_KEY: &str = "aws_secret_access_key";
/// Session token key in a credentials section.
pub const SESSION_TOKEN_KEY: &str = "aws_session_token";

/// Writes role credentials into the shared credentials file.
///
/// # Example
///
/// ```no_run
/// use ssobroker::exchange::RoleCredentials;
/// use ssobroker::store::CredentialStore;
///
/// # async fn demo(creds: RoleCredentials) -> ssobroker::Result<()> {
/// let store = CredentialStore::new("/home/me/.aws/credentials");
/// store.upsert("work", "eu-west-1", &creds).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Creates a store over the credentials file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the credentials file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces `section_name` with exactly the four credential keys.
    ///
    /// Nothing from a previous section of the same name survives. Every other
    /// section is written back unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConfigRead`], [`BrokerError::Parse`], or
    /// [`BrokerError::ConfigWrite`] carrying the credentials file path.
    pub async fn upsert(
        &self,
        section_name: &str,
        region: &str,
        credentials: &RoleCredentials,
    ) -> Result<()> {
        let mut file = IniFile::load(&self.path).await?;

        let section: Section = [
            (REGION_KEY, region),
            (ACCESS_KEY_ID_KEY, credentials.access_key_id.as_str()),
            (SECRET_ACCESS_KEY_KEY, credentials.secret_access_key.as_str()),
            (SESSION_TOKEN_KEY, credentials.session_token.as_str()),
        ]
        .into_iter()
        .collect();
        file.replace_section(section_name, section);

        file.save(&self.path).await?;

        info!(
            section = %section_name,
            region = %region,
            access_key_id = %credentials.access_key_id,
            path = %self.path.display(),
            "stored credentials"
        );
        Ok(())
    }
}

/// Copies a profile's configuration into the `default` slot.
#[derive(Debug, Clone)]
pub struct ProfileCloner {
    path: PathBuf,
}

impl ProfileCloner {
    /// Creates a cloner over the config file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Replaces `[default]` with a verbatim copy of the source profile section.
    ///
    /// The copy is a snapshot; later edits to the source are not mirrored.
    /// Cloning `default` onto itself is a no-op.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::ProfileNotFound`] if the source section is absent
    /// - [`BrokerError::ConfigRead`], [`BrokerError::Parse`], or
    ///   [`BrokerError::ConfigWrite`] for file failures
    pub async fn clone_to_default(&self, source_profile: &str) -> Result<()> {
        let name = bare_profile_name(source_profile);
        if name == DEFAULT_PROFILE {
            return Ok(());
        }

        let mut file = IniFile::load(&self.path).await?;
        let section = file
            .section(&qualified_section(name))
            .cloned()
            .ok_or_else(|| BrokerError::ProfileNotFound(name.to_string()))?;

        file.replace_section(DEFAULT_PROFILE, section);
        file.save(&self.path).await?;

        info!(profile = %name, "cloned profile to default");
        Ok(())
    }
}
