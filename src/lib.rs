//! ssobroker - turn a cached SSO session into short-lived role credentials.
//!
//! Users log in once through the AWS CLI's interactive SSO flow. The broker
//! then exchanges the cached session token for role credentials, writes them
//! into the shared credentials file, and optionally makes the profile the
//! `[default]` one, without further interaction until the session expires.
//!
//! # Pipeline
//!
//! ```text
//! ProfileResolver → TokenCache → CredentialExchanger → CredentialStore → ProfileCloner
//! ```
//!
//! Each capability sits behind a trait so the pipeline can be driven with the
//! in-memory implementations in [`backends::mock`]:
//!
//! - [`TokenProvider`]: reads cached session tokens
//! - [`Authenticator`]: runs the interactive login when no usable token exists
//! - [`CredentialExchanger`]: calls the role-credential service
//!
//! # Quick Start
//!
//! ```no_run
//! use ssobroker::{Broker, BrokerConfig, Outcome};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> ssobroker::Result<()> {
//!     let broker = Broker::from_config(BrokerConfig::from_env()?);
//!
//!     match broker.run("work").await? {
//!         Outcome::Completed { credentials, .. } => {
//!             println!("valid until {}", credentials.expires_at);
//!         }
//!         Outcome::NotSso { profile } => println!("[{}] is not an SSO profile", profile),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! | Feature | Default | Provides |
//! |---------|---------|----------|
//! | `aws` | yes | [`backends::sso::SsoExchanger`], `Broker::from_config`, the binary |
//! | `mock` | yes | In-memory capabilities with error injection |

pub mod authenticator;
pub mod backends;
pub mod cli;
pub mod config;
pub mod error;
pub mod exchange;
pub mod ini;
pub mod pipeline;
pub mod profile;
pub mod session;
pub mod store;
pub mod validation;

pub use authenticator::{Authenticator, AwsCliAuthenticator};
pub use config::{BrokerConfig, LogConfig};
pub use error::{BrokerError, Result};
pub use exchange::{CredentialExchanger, RoleCredentials};
pub use pipeline::{Broker, Outcome, Stage};
pub use profile::{Profile, ProfileResolver, Resolution};
pub use session::{AuthToken, SsoCacheProvider, TokenCache, TokenProvider};
pub use store::{CredentialStore, ProfileCloner};
