//! IAM Identity Center role-credential exchanger.
//!
//! Calls the SSO portal's `GetRoleCredentials` operation through the official
//! SDK. The request is authorized by the bearer session token alone, so the
//! client is built without a credential provider.
//!
//! # Example
//!
//! ```no_run
//! use ssobroker::backends::sso::SsoExchanger;
//! use ssobroker::exchange::CredentialExchanger;
//!
//! // Point at a local stub instead of the real portal.
//! let exchanger = SsoExchanger::new().with_endpoint_url("http://localhost:4566");
//! assert_eq!(exchanger.name(), "sso");
//! ```

use crate::exchange::{expiration_from_millis, CredentialExchanger, RoleCredentials};
use crate::profile::Profile;
use crate::session::AuthToken;
use crate::{BrokerError, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sso::error::DisplayErrorContext;
use aws_sdk_sso::Client;
use tracing::info;

/// Role-credential exchanger backed by `aws-sdk-sso`.
#[derive(Debug, Clone, Default)]
pub struct SsoExchanger {
    endpoint_url: Option<String>,
}

impl SsoExchanger {
    /// Creates an exchanger using the regional SSO portal endpoint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the service endpoint (for local testing).
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    async fn client(&self, region: &str) -> Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .no_credentials();

        if let Some(ref endpoint) = self.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let config = loader.load().await;
        Client::new(&config)
    }
}

#[async_trait]
impl CredentialExchanger for SsoExchanger {
    fn name(&self) -> &str {
        "sso"
    }

    async fn exchange(&self, profile: &Profile, token: &AuthToken) -> Result<RoleCredentials> {
        let region = profile.sso_region()?;
        let account = profile.sso_account_id()?;
        let role = profile.sso_role_name()?;

        info!(
            profile = %profile.name,
            account = %account,
            role = %role,
            region = %region,
            "fetching role credentials"
        );

        let response = self
            .client(region)
            .await
            .get_role_credentials()
            .role_name(role)
            .account_id(account)
            .access_token(token.token())
            .send()
            .await
            .map_err(|e| {
                exchange_error(account, role, DisplayErrorContext(&e).to_string(), Box::new(e))
            })?;

        let creds = response.role_credentials().ok_or_else(|| {
            exchange_error(
                account,
                role,
                "no credentials returned".to_string(),
                "empty GetRoleCredentials response".into(),
            )
        })?;

        role_credentials(creds, account, role)
    }
}

fn exchange_error(
    account: &str,
    role: &str,
    message: String,
    source: Box<dyn std::error::Error + Send + Sync>,
) -> BrokerError {
    BrokerError::Exchange {
        account: account.to_string(),
        role: role.to_string(),
        message,
        source,
    }
}

/// Maps the service's credential shape, requiring every key.
fn role_credentials(
    creds: &aws_sdk_sso::types::RoleCredentials,
    account: &str,
    role: &str,
) -> Result<RoleCredentials> {
    let field = |value: Option<&str>, name: &str| {
        value.map(str::to_string).ok_or_else(|| {
            exchange_error(
                account,
                role,
                format!("response is missing {}", name),
                format!("missing field {}", name).into(),
            )
        })
    };

    let expires_at = expiration_from_millis(creds.expiration()).ok_or_else(|| {
        exchange_error(
            account,
            role,
            format!("expiration {} is out of range", creds.expiration()),
            "invalid expiration".into(),
        )
    })?;

    Ok(RoleCredentials {
        access_key_id: field(creds.access_key_id(), "accessKeyId")?,
        secret_access_key: field(creds.secret_access_key(), "secretAccessKey")?,
        session_token: field(creds.session_token(), "sessionToken")?,
        expires_at,
    })
}
