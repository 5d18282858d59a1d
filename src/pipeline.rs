//! The credential lifecycle pipeline.
//!
//! One run resolves a profile, obtains a valid session token, exchanges it
//! for role credentials, stores them, and optionally clones the profile into
//! `[default]`. Stages run strictly in order and any failure aborts the run.
//! Completed writes are not rolled back.

use crate::authenticator::Authenticator;
use crate::config::BrokerConfig;
use crate::exchange::{CredentialExchanger, RoleCredentials};
use crate::ini::IniFile;
use crate::profile::{bare_profile_name, ProfileResolver, Resolution, DEFAULT_PROFILE};
use crate::session::{TokenCache, TokenProvider};
use crate::store::{CredentialStore, ProfileCloner};
use crate::validation::validate_profile_name;
use crate::Result;
use std::fmt;
use tracing::info;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Profile read and merged with its session block
    ProfileResolved,
    /// Valid session token available
    TokenObtained,
    /// Role credentials received
    CredentialsExchanged,
    /// Credentials written to the credentials file
    Stored,
    /// Profile copied into `[default]`
    Cloned,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProfileResolved => write!(f, "profile-resolved"),
            Self::TokenObtained => write!(f, "token-obtained"),
            Self::CredentialsExchanged => write!(f, "credentials-exchanged"),
            Self::Stored => write!(f, "stored"),
            Self::Cloned => write!(f, "cloned"),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The profile is not an SSO profile; nothing was written.
    NotSso {
        /// Profile name
        profile: String,
    },
    /// Credentials were exchanged and stored.
    Completed {
        /// Profile name
        profile: String,
        /// Credentials file section written
        section: String,
        /// Exchanged credentials
        credentials: RoleCredentials,
        /// Whether `[default]` was replaced with the profile
        cloned: bool,
    },
}

impl Outcome {
    /// Last stage reached, `None` for a non-SSO profile.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::NotSso { .. } => None,
            Self::Completed { cloned: true, .. } => Some(Stage::Cloned),
            Self::Completed { cloned: false, .. } => Some(Stage::Stored),
        }
    }
}

/// Drives one pipeline run over injected capabilities.
///
/// # Example
///
/// ```no_run
/// use ssobroker::authenticator::AwsCliAuthenticator;
/// use ssobroker::backends::sso::SsoExchanger;
/// use ssobroker::pipeline::{Broker, Outcome};
/// use ssobroker::session::SsoCacheProvider;
/// use ssobroker::BrokerConfig;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> ssobroker::Result<()> {
///     let config = BrokerConfig::from_env()?;
///     let broker = Broker::new(
///         config.clone(),
///         Box::new(SsoCacheProvider::new(&config.sso_cache_dir, &config.config_file)),
///         Box::new(AwsCliAuthenticator::new(&config.login_program)),
///         Box::new(SsoExchanger::new()),
///     );
///
///     if let Outcome::Completed { section, .. } = broker.run("work").await? {
///         println!("credentials written to [{}]", section);
///     }
///     Ok(())
/// }
/// ```
pub struct Broker {
    config: BrokerConfig,
    tokens: TokenCache,
    exchanger: Box<dyn CredentialExchanger>,
    store: CredentialStore,
    cloner: ProfileCloner,
}

impl Broker {
    /// Creates a broker from explicit capabilities.
    pub fn new(
        config: BrokerConfig,
        provider: Box<dyn TokenProvider>,
        authenticator: Box<dyn Authenticator>,
        exchanger: Box<dyn CredentialExchanger>,
    ) -> Self {
        let store = CredentialStore::new(&config.credentials_file);
        let cloner = ProfileCloner::new(&config.config_file);
        Self {
            tokens: TokenCache::new(provider, authenticator),
            exchanger,
            store,
            cloner,
            config,
        }
    }

    /// Creates a broker using the token cache, `aws sso login`, and the
    /// real role-credential service named by `config`.
    #[cfg(feature = "aws")]
    pub fn from_config(config: BrokerConfig) -> Self {
        use crate::authenticator::AwsCliAuthenticator;
        use crate::backends::sso::SsoExchanger;
        use crate::session::SsoCacheProvider;

        let provider = SsoCacheProvider::new(&config.sso_cache_dir, &config.config_file);
        let authenticator = AwsCliAuthenticator::new(&config.login_program);
        let exchanger = match config.endpoint_url {
            Some(ref url) => SsoExchanger::new().with_endpoint_url(url),
            None => SsoExchanger::new(),
        };

        Self::new(
            config,
            Box::new(provider),
            Box::new(authenticator),
            Box::new(exchanger),
        )
    }

    /// Configuration in use.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Runs the pipeline for `profile_name`.
    ///
    /// Targeting `default` writes its credentials to `[default]` and never
    /// clones. Any other profile writes to its own credentials section and,
    /// if enabled, replaces the `[default]` config section with a copy of
    /// the profile.
    ///
    /// # Errors
    ///
    /// Returns the first error from any stage. A non-SSO profile is not an
    /// error; see [`Outcome::NotSso`].
    pub async fn run(&self, profile_name: &str) -> Result<Outcome> {
        let name = bare_profile_name(profile_name);
        validate_profile_name(name)?;

        let authenticator = self.tokens.authenticator();
        info!(
            profile = %name,
            authenticator = %authenticator.name(),
            exchanger = %self.exchanger.name(),
            "starting run"
        );
        authenticator.init().await?;

        let config = IniFile::load(&self.config.config_file).await?;
        let profile = match ProfileResolver::new(&config).resolve(name)? {
            Resolution::Sso(profile) => profile,
            Resolution::NotSso => {
                info!(profile = %name, "nothing to do");
                return Ok(Outcome::NotSso {
                    profile: name.to_string(),
                });
            }
        };
        info!(stage = %Stage::ProfileResolved, profile = %name, "stage complete");

        let token = self.tokens.get_valid_token(name).await?;
        info!(stage = %Stage::TokenObtained, profile = %name, "stage complete");

        let credentials = self.exchanger.exchange(&profile, &token).await?;
        info!(
            stage = %Stage::CredentialsExchanged,
            profile = %name,
            access_key_id = %credentials.access_key_id,
            expires_at = %credentials.expires_at,
            "stage complete"
        );

        let region = profile.region().unwrap_or(self.config.default_region.as_str());
        self.store.upsert(name, region, &credentials).await?;
        info!(stage = %Stage::Stored, profile = %name, "stage complete");

        let cloned = name != DEFAULT_PROFILE && self.config.clone_to_default;
        if cloned {
            self.cloner.clone_to_default(name).await?;
            info!(stage = %Stage::Cloned, profile = %name, "stage complete");
        }

        Ok(Outcome::Completed {
            profile: name.to_string(),
            section: name.to_string(),
            credentials,
            cloned,
        })
    }
}
