//! Session-token to role-credential exchange.

use crate::profile::Profile;
use crate::session::AuthToken;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Short-lived access credentials for one role in one account.
///
/// Created fresh on every run and written straight to the credentials file.
/// The secret key and session token are redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct RoleCredentials {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Session token
    pub session_token: String,
    /// Expiration (UTC)
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for RoleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Role-credential service.
///
/// Implementations must be `Send + Sync` so they can be boxed into the
/// pipeline.
#[async_trait]
pub trait CredentialExchanger: Send + Sync {
    /// Returns the exchanger name (e.g., "sso", "mock").
    fn name(&self) -> &str;

    /// Exchanges `token` for credentials of the profile's role.
    ///
    /// The request targets `profile.sso_region` and uses the profile's
    /// `sso_account_id` and `sso_role_name`.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::MissingProfileKey`](crate::BrokerError::MissingProfileKey)
    ///   if a required SSO key is absent
    /// - [`BrokerError::Exchange`](crate::BrokerError::Exchange) on any
    ///   request failure
    async fn exchange(&self, profile: &Profile, token: &AuthToken) -> Result<RoleCredentials>;
}

/// Converts a millisecond epoch expiration to UTC.
///
/// Returns `None` if the value is out of range.
///
/// ```
/// use ssobroker::exchange::expiration_from_millis;
///
/// let at = expiration_from_millis(1_700_000_000_000).unwrap();
/// assert_eq!(at.to_rfc3339(), "2023-11-14T22:13:20+00:00");
/// ```
pub fn expiration_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}
