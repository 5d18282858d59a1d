//! Session token retrieval and validity checking.
//!
//! This module provides the [`TokenProvider`] trait over the on-disk SSO token
//! cache written by the external login, and [`TokenCache`], which combines a
//! provider with an [`Authenticator`] to produce a usable [`AuthToken`].

use crate::authenticator::Authenticator;
use crate::ini::IniFile;
use crate::profile::{ProfileResolver, Resolution};
use crate::{BrokerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDateTime, Utc};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// Tokens expiring within this many minutes trigger a warning.
pub const EXPIRY_WARNING_MINUTES: i64 = 15;

/// A session token obtained from the interactive login.
///
/// Immutable once loaded. The token value is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Creates a token expiring at `expires_at`.
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Returns the opaque bearer token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns when the token expires (UTC).
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the token has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Returns true if the token expires within the warning window of `now`.
    pub fn expires_soon_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::minutes(EXPIRY_WARNING_MINUTES) >= self.expires_at
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of persisted session tokens, keyed by profile name.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Loads the session token for `profile_name`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::TokenRetrieval`] if no token is stored, the
    /// stored token is malformed, or it has expired.
    async fn load_token(&self, profile_name: &str) -> Result<AuthToken>;
}

/// Token cache entry as written by `aws sso login`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedToken {
    access_token: String,
    expires_at: String,
}

/// Reads tokens from the AWS CLI SSO cache directory.
///
/// Entries live at `<cache_dir>/<sha1(sso_session)>.json`. The profile's
/// `sso_session` reference is looked up in the config file on every load so
/// the provider always agrees with what the login program just wrote.
///
/// # Security
///
/// - Cache files are only read, never written or deleted
/// - Tokens are never logged or exposed in errors
#[derive(Debug, Clone)]
pub struct SsoCacheProvider {
    cache_dir: PathBuf,
    config_file: PathBuf,
}

impl SsoCacheProvider {
    /// Creates a provider reading `cache_dir` and resolving profiles from
    /// `config_file`.
    pub fn new(cache_dir: impl Into<PathBuf>, config_file: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            config_file: config_file.into(),
        }
    }

    /// Returns the cache file name for an `sso-session`.
    ///
    /// ```
    /// use ssobroker::session::SsoCacheProvider;
    ///
    /// assert_eq!(
    ///     SsoCacheProvider::cache_key("main"),
    ///     "b28b7af69320201d1cf206ebf28373980add1451"
    /// );
    /// ```
    pub fn cache_key(session_name: &str) -> String {
        hex::encode(Sha1::digest(session_name.as_bytes()))
    }

    /// Returns the cache file path for an `sso-session`.
    pub fn cache_path(&self, session_name: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.json", Self::cache_key(session_name)))
    }

    async fn read_entry(&self, profile_name: &str, path: &Path) -> Result<AuthToken> {
        let retrieval = |reason: String| BrokerError::TokenRetrieval {
            profile: profile_name.to_string(),
            reason,
        };

        let data = fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                retrieval("no cached SSO token".to_string())
            } else {
                retrieval(format!("failed to read {}: {}", path.display(), e))
            }
        })?;

        let entry: CachedToken = serde_json::from_slice(&data)
            .map_err(|e| retrieval(format!("malformed token cache entry: {}", e)))?;

        let expires_at = parse_expires_at(&entry.expires_at).ok_or_else(|| {
            retrieval(format!("unrecognized expiresAt {:?}", entry.expires_at))
        })?;

        let token = AuthToken::new(entry.access_token, expires_at);
        if token.is_expired_at(Utc::now()) {
            return Err(retrieval("cached SSO token has expired".to_string()));
        }

        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for SsoCacheProvider {
    async fn load_token(&self, profile_name: &str) -> Result<AuthToken> {
        let config = IniFile::load(&self.config_file).await?;
        let profile = match ProfileResolver::new(&config).resolve(profile_name)? {
            Resolution::Sso(profile) => profile,
            Resolution::NotSso => {
                return Err(BrokerError::TokenRetrieval {
                    profile: profile_name.to_string(),
                    reason: "profile has no sso_session".to_string(),
                })
            }
        };

        let path = self.cache_path(&profile.sso_session);
        self.read_entry(profile_name, &path).await
    }
}

/// Parses `expiresAt` in RFC 3339 or the legacy `...UTC` suffix form.
fn parse_expires_at(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%SUTC")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Produces a valid session token, delegating to the login when needed.
///
/// # Example
///
/// ```no_run
/// use ssobroker::authenticator::AwsCliAuthenticator;
/// use ssobroker::session::{SsoCacheProvider, TokenCache};
///
/// #[tokio::main]
/// async fn main() -> ssobroker::Result<()> {
///     let tokens = TokenCache::new(
///         Box::new(SsoCacheProvider::new("/home/me/.aws/sso/cache", "/home/me/.aws/config")),
///         Box::new(AwsCliAuthenticator::default()),
///     );
///
///     let token = tokens.get_valid_token("work").await?;
///     println!("valid until {}", token.expires_at());
///     Ok(())
/// }
/// ```
pub struct TokenCache {
    provider: Box<dyn TokenProvider>,
    authenticator: Box<dyn Authenticator>,
}

impl TokenCache {
    /// Creates a token cache from a provider and an authenticator.
    pub fn new(provider: Box<dyn TokenProvider>, authenticator: Box<dyn Authenticator>) -> Self {
        Self {
            provider,
            authenticator,
        }
    }

    /// Returns the authenticator used for login delegation.
    pub fn authenticator(&self) -> &dyn Authenticator {
        &*self.authenticator
    }

    /// Returns a usable token for `profile_name`.
    ///
    /// A missing, unreadable, or expired token triggers exactly one login
    /// followed by one reload. A token inside the warning window is returned
    /// unchanged with a warning.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::AuthenticatorFailure`] if the login itself fails
    /// - [`BrokerError::TokenRetrieval`] if the reload after login still
    ///   produces no usable token
    pub async fn get_valid_token(&self, profile_name: &str) -> Result<AuthToken> {
        info!(profile = %profile_name, "checking for SSO credentials");

        let token = match self.load_unexpired(profile_name).await {
            Ok(token) => token,
            Err(e) => {
                warn!(profile = %profile_name, error = %e, "no usable SSO token");
                self.authenticator.login(profile_name).await?;

                self.load_unexpired(profile_name)
                    .await
                    .map_err(|e| match e {
                        e @ BrokerError::TokenRetrieval { .. } => e,
                        other => BrokerError::TokenRetrieval {
                            profile: profile_name.to_string(),
                            reason: other.to_string(),
                        },
                    })?
            }
        };

        if token.expires_soon_at(Utc::now()) {
            warn!(
                profile = %profile_name,
                "Your current SSO credentials will expire in less than {} minutes!",
                EXPIRY_WARNING_MINUTES
            );
        }

        info!(
            profile = %profile_name,
            expires_at = %token.expires_at().with_timezone(&Local),
            "found credentials"
        );
        Ok(token)
    }

    async fn load_unexpired(&self, profile_name: &str) -> Result<AuthToken> {
        let token = self.provider.load_token(profile_name).await?;
        if token.is_expired_at(Utc::now()) {
            return Err(BrokerError::TokenRetrieval {
                profile: profile_name.to_string(),
                reason: "session token has expired".to_string(),
            });
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CONFIG: &str = "\
[profile work]
sso_session = main
sso_account_id = 123456789012
sso_role_name = Admin

[profile plain]
region = us-east-1

[sso-session main]
sso_region = eu-west-1
sso_start_url = https://x
";

    struct Fixture {
        _dir: tempfile::TempDir,
        provider: SsoCacheProvider,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let config = dir.path().join("config");
        std::fs::write(&config, CONFIG).unwrap();
        let cache_dir = dir.path().join("sso").join("cache");
        std::fs::create_dir_all(&cache_dir).unwrap();

        Fixture {
            provider: SsoCacheProvider::new(cache_dir, config),
            _dir: dir,
        }
    }

    fn write_entry(provider: &SsoCacheProvider, body: &str) {
        std::fs::write(provider.cache_path("main"), body).unwrap();
    }

    #[test]
    fn test_token_expiry_window() {
        let now = Utc::now();
        let token = AuthToken::new("t", now + Duration::minutes(10));
        assert!(token.expires_soon_at(now));
        assert!(!token.is_expired_at(now));

        let token = AuthToken::new("t", now + Duration::hours(4));
        assert!(!token.expires_soon_at(now));

        let token = AuthToken::new("t", now + Duration::minutes(EXPIRY_WARNING_MINUTES));
        assert!(token.expires_soon_at(now));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AuthToken::new("super-secret", Utc::now());
        let debug = format!("{:?}", token);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_parse_expires_at_formats() {
        let expected = DateTime::parse_from_rfc3339("2024-05-28T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_expires_at("2024-05-28T12:00:00Z"), Some(expected));
        assert_eq!(parse_expires_at("2024-05-28T12:00:00UTC"), Some(expected));
        assert_eq!(
            parse_expires_at("2024-05-28T14:00:00+02:00"),
            Some(expected)
        );
        assert_eq!(parse_expires_at("tomorrow"), None);
    }

    #[tokio::test]
    async fn test_provider_loads_cached_token() {
        let f = fixture();
        let expires = (Utc::now() + Duration::hours(8)).format("%Y-%m-%dT%H:%M:%SZ");
        write_entry(
            &f.provider,
            &format!(
                r#"{{"startUrl": "https://x", "region": "eu-west-1", "accessToken": "tok-abc", "expiresAt": "{}"}}"#,
                expires
            ),
        );

        let token = f.provider.load_token("work").await.unwrap();
        assert_eq!(token.token(), "tok-abc");
    }

    #[tokio::test]
    async fn test_provider_missing_entry() {
        let f = fixture();
        let err = f.provider.load_token("work").await.unwrap_err();
        assert!(matches!(err, BrokerError::TokenRetrieval { ref reason, .. } if reason.contains("no cached")));
    }

    #[tokio::test]
    async fn test_provider_expired_entry() {
        let f = fixture();
        write_entry(
            &f.provider,
            r#"{"accessToken": "old", "expiresAt": "2020-01-01T00:00:00Z"}"#,
        );
        let err = f.provider.load_token("work").await.unwrap_err();
        assert!(matches!(err, BrokerError::TokenRetrieval { ref reason, .. } if reason.contains("expired")));
    }

    #[tokio::test]
    async fn test_provider_malformed_entry() {
        let f = fixture();
        write_entry(&f.provider, "{not json");
        let err = f.provider.load_token("work").await.unwrap_err();
        assert!(matches!(err, BrokerError::TokenRetrieval { ref reason, .. } if reason.contains("malformed")));
    }

    #[tokio::test]
    async fn test_provider_non_sso_profile() {
        let f = fixture();
        let err = f.provider.load_token("plain").await.unwrap_err();
        assert!(matches!(err, BrokerError::TokenRetrieval { .. }));
    }
}
