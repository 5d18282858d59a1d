//! Profile resolution against the AWS config file.
//!
//! A profile lives in `[profile <name>]` (or `[default]`). SSO profiles point
//! at an `[sso-session <ref>]` block through their `sso_session` key; the
//! resolver merges that block into the profile, with the profile's own keys
//! taking precedence.

use crate::ini::{IniFile, Section};
use crate::{BrokerError, Result};
use tracing::info;

/// Name of the default profile slot.
pub const DEFAULT_PROFILE: &str = "default";

const PROFILE_PREFIX: &str = "profile ";
const SSO_SESSION_PREFIX: &str = "sso-session ";

/// Returns the config file section name for a profile.
///
/// ```
/// use ssobroker::profile::qualified_section;
///
/// assert_eq!(qualified_section("work"), "profile work");
/// assert_eq!(qualified_section("default"), "default");
/// ```
pub fn qualified_section(profile_name: &str) -> String {
    if profile_name == DEFAULT_PROFILE {
        DEFAULT_PROFILE.to_string()
    } else {
        format!("{}{}", PROFILE_PREFIX, profile_name)
    }
}

/// Strips a leading `profile ` qualifier, if present.
pub fn bare_profile_name(name: &str) -> &str {
    name.strip_prefix(PROFILE_PREFIX).unwrap_or(name)
}

/// Returns the config file section name for an `sso-session` block.
pub fn session_section(session_name: &str) -> String {
    format!("{}{}", SSO_SESSION_PREFIX, session_name)
}

/// An `sso-session` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBlock {
    /// Session name
    pub name: String,
    /// Every key in the block, in file order
    pub attributes: Section,
}

impl SessionBlock {
    fn from_section(name: &str, section: &Section) -> Self {
        Self {
            name: name.to_string(),
            attributes: section.clone(),
        }
    }
}

/// A resolved SSO profile.
///
/// The merged attributes are kept as-is; typed accessors check for the
/// SSO keys when a caller actually needs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Profile name, without any `profile ` qualifier
    pub name: String,
    /// Referenced `sso-session` block
    pub sso_session: String,
    /// Merged attributes: profile keys first, then session keys not already set
    pub attributes: Section,
}

impl Profile {
    /// Default region for tools using these credentials.
    pub fn region(&self) -> Option<&str> {
        self.attributes.get("region")
    }

    /// Identity Center start URL.
    pub fn sso_start_url(&self) -> Result<&str> {
        self.require("sso_start_url")
    }

    /// Region of the role-credential service.
    pub fn sso_region(&self) -> Result<&str> {
        self.require("sso_region")
    }

    /// Account to assume the role in.
    pub fn sso_account_id(&self) -> Result<&str> {
        self.require("sso_account_id")
    }

    /// Role to assume.
    pub fn sso_role_name(&self) -> Result<&str> {
        self.require("sso_role_name")
    }

    /// Returns `key` from the merged attributes.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::MissingProfileKey`] if the key is absent.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.attributes
            .get(key)
            .ok_or_else(|| BrokerError::MissingProfileKey {
                profile: self.name.clone(),
                key: key.to_string(),
            })
    }
}

/// Result of resolving a profile name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The profile uses an `sso-session` and can be exchanged.
    Sso(Box<Profile>),
    /// The profile has no `sso_session` key and is left alone.
    NotSso,
}

/// Resolves profiles from a loaded config file.
pub struct ProfileResolver<'a> {
    config: &'a IniFile,
}

impl<'a> ProfileResolver<'a> {
    /// Creates a resolver over `config`.
    pub fn new(config: &'a IniFile) -> Self {
        Self { config }
    }

    /// Resolves `profile_name` into an SSO profile.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::ProfileNotFound`] if the qualified section is absent
    /// - [`BrokerError::SessionNotFound`] if the referenced session block is absent
    pub fn resolve(&self, profile_name: &str) -> Result<Resolution> {
        info!(profile = %profile_name, "reading profile");

        // Accept "profile work" as well as "work".
        let name = bare_profile_name(profile_name);
        let section_name = qualified_section(name);
        let section = self
            .config
            .section(&section_name)
            .ok_or_else(|| BrokerError::ProfileNotFound(name.to_string()))?;

        let Some(session_ref) = section.get("sso_session") else {
            info!(profile = %name, "not an SSO profile");
            return Ok(Resolution::NotSso);
        };

        let session = self.session(name, session_ref)?;

        let mut attributes = section.clone();
        attributes.extend_missing(&session.attributes);

        let profile = Profile {
            name: name.to_string(),
            sso_session: session.name,
            attributes,
        };

        Ok(Resolution::Sso(Box::new(profile)))
    }

    /// Looks up the `sso-session` block referenced by a profile.
    pub fn session(&self, profile_name: &str, session_name: &str) -> Result<SessionBlock> {
        self.config
            .section(&session_section(session_name))
            .map(|s| SessionBlock::from_section(session_name, s))
            .ok_or_else(|| BrokerError::SessionNotFound {
                profile: profile_name.to_string(),
                session: session_name.to_string(),
            })
    }
}
