//! Mock pipeline collaborators for testing.
//!
//! In-memory implementations of [`TokenProvider`], [`Authenticator`], and
//! [`CredentialExchanger`] with error injection, for testing code that drives
//! the broker without a login program or network access.
//!
//! State is shared through `Arc`, so a clone handed to the pipeline and the
//! original kept by the test observe the same tokens and recorded calls.

use crate::authenticator::Authenticator;
use crate::exchange::{CredentialExchanger, RoleCredentials};
use crate::profile::{bare_profile_name, Profile};
use crate::session::{AuthToken, TokenProvider};
use crate::{BrokerError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Mock session-token store.
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use ssobroker::backends::mock::MockTokenProvider;
/// use ssobroker::session::{AuthToken, TokenProvider};
///
/// #[tokio::main]
/// async fn main() -> ssobroker::Result<()> {
///     let provider = MockTokenProvider::new();
///     provider
///         .set_token("work", AuthToken::new("tok-abc", Utc::now() + Duration::hours(1)))
///         .await;
///
///     let token = provider.load_token("profile work").await?;
///     assert_eq!(token.token(), "tok-abc");
///     Ok(())
/// }
/// ```
#[derive(Clone, Default)]
pub struct MockTokenProvider {
    tokens: Arc<RwLock<HashMap<String, AuthToken>>>,

    /// Reason to report from `load_token()`
    pub load_error: Option<String>,
}

impl MockTokenProvider {
    /// Creates a provider with no stored tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a token for a profile, replacing any previous one.
    pub async fn set_token(&self, profile_name: &str, token: AuthToken) {
        let mut tokens = self.tokens.write().await;
        tokens.insert(bare_profile_name(profile_name).to_string(), token);
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    async fn load_token(&self, profile_name: &str) -> Result<AuthToken> {
        if let Some(ref reason) = self.load_error {
            return Err(BrokerError::TokenRetrieval {
                profile: profile_name.to_string(),
                reason: reason.clone(),
            });
        }

        let tokens = self.tokens.read().await;
        tokens
            .get(bare_profile_name(profile_name))
            .cloned()
            .ok_or_else(|| BrokerError::TokenRetrieval {
                profile: profile_name.to_string(),
                reason: "no cached SSO token".to_string(),
            })
    }
}

/// Mock interactive login.
///
/// Records every login. When built with [`MockAuthenticator::issuing`], a
/// successful login stores a token into the given provider, like the real
/// login populating the token cache.
#[derive(Clone, Default)]
pub struct MockAuthenticator {
    logins: Arc<RwLock<Vec<String>>>,
    issue: Option<(MockTokenProvider, AuthToken)>,

    /// Message to report from `init()` as a missing tool
    pub init_error: Option<String>,
    /// Exit code to report from `login()`
    pub login_error: Option<i32>,
}

impl MockAuthenticator {
    /// Creates an authenticator whose logins succeed without issuing tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes successful logins store `token` into `provider`.
    pub fn issuing(mut self, provider: MockTokenProvider, token: AuthToken) -> Self {
        self.issue = Some((provider, token));
        self
    }

    /// Profile names passed to `login()`, in call order.
    pub async fn logins(&self) -> Vec<String> {
        self.logins.read().await.clone()
    }

    /// Number of `login()` calls.
    pub async fn login_count(&self) -> usize {
        self.logins.read().await.len()
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn init(&self) -> Result<()> {
        match self.init_error {
            Some(ref message) => Err(BrokerError::ExternalToolMissing(message.clone())),
            None => Ok(()),
        }
    }

    async fn login(&self, profile_name: &str) -> Result<()> {
        self.logins.write().await.push(profile_name.to_string());

        if let Some(code) = self.login_error {
            return Err(BrokerError::AuthenticatorFailure {
                program: "mock".to_string(),
                code: Some(code),
            });
        }

        if let Some((ref provider, ref token)) = self.issue {
            provider.set_token(profile_name, token.clone()).await;
        }
        Ok(())
    }
}

/// A request received by [`MockExchanger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    /// Target region
    pub region: String,
    /// Account id
    pub account_id: String,
    /// Role name
    pub role_name: String,
    /// Bearer token presented
    pub access_token: String,
}

/// Mock role-credential service.
#[derive(Clone)]
pub struct MockExchanger {
    credentials: RoleCredentials,
    requests: Arc<RwLock<Vec<ExchangeRequest>>>,

    /// Message to report from `exchange()`
    pub exchange_error: Option<String>,
}

impl MockExchanger {
    /// Creates an exchanger returning example credentials valid for an hour.
    pub fn new() -> Self {
        Self::with_credentials(RoleCredentials {
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "sess".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    /// Creates an exchanger returning `credentials` for every request.
    pub fn with_credentials(credentials: RoleCredentials) -> Self {
        Self {
            credentials,
            requests: Arc::new(RwLock::new(Vec::new())),
            exchange_error: None,
        }
    }

    /// Requests received so far.
    pub async fn requests(&self) -> Vec<ExchangeRequest> {
        self.requests.read().await.clone()
    }
}

impl Default for MockExchanger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialExchanger for MockExchanger {
    fn name(&self) -> &str {
        "mock"
    }

    async fn exchange(&self, profile: &Profile, token: &AuthToken) -> Result<RoleCredentials> {
        let request = ExchangeRequest {
            region: profile.sso_region()?.to_string(),
            account_id: profile.sso_account_id()?.to_string(),
            role_name: profile.sso_role_name()?.to_string(),
            access_token: token.token().to_string(),
        };
        self.requests.write().await.push(request.clone());

        if let Some(ref message) = self.exchange_error {
            return Err(BrokerError::Exchange {
                account: request.account_id,
                role: request.role_name,
                message: message.clone(),
                source: message.clone().into(),
            });
        }

        Ok(self.credentials.clone())
    }
}
