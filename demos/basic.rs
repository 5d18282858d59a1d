//! Basic usage example with the mock capabilities.
//!
//! Runs the full pipeline against files in a temporary directory. The login
//! program and the role-credential service are the in-memory mocks.

use chrono::{Duration, Utc};
use ssobroker::backends::mock::{MockAuthenticator, MockExchanger, MockTokenProvider};
use ssobroker::{AuthToken, Broker, BrokerConfig, Outcome};

const CONFIG: &str = "\
[profile work]
region = eu-west-1
sso_session = main
sso_account_id = 123456789012
sso_role_name = Admin

[sso-session main]
sso_region = eu-west-1
sso_start_url = https://example.awsapps.com/start
";

#[tokio::main]
async fn main() -> ssobroker::Result<()> {
    let dir = tempfile::tempdir()?;
    let config_file = dir.path().join("config");
    let credentials_file = dir.path().join("credentials");
    tokio::fs::write(&config_file, CONFIG).await?;

    let config = BrokerConfig::from_lookup(dir.path(), |_| None)
        .with_config_file(&config_file)
        .with_credentials_file(&credentials_file)
        .with_sso_cache_dir(dir.path().join("cache"));

    // No cached token yet, so the run logs in once and the login issues one.
    let provider = MockTokenProvider::new();
    let authenticator = MockAuthenticator::new().issuing(
        provider.clone(),
        AuthToken::new("example-token", Utc::now() + Duration::hours(8)),
    );

    let broker = Broker::new(
        config,
        Box::new(provider),
        Box::new(authenticator.clone()),
        Box::new(MockExchanger::new()),
    );

    println!("Running broker for profile 'work'...");
    match broker.run("work").await? {
        Outcome::Completed {
            section,
            credentials,
            cloned,
            ..
        } => {
            println!("Credentials written to [{}]", section);
            println!("  access key: {}", credentials.access_key_id);
            println!("  expires at: {}", credentials.expires_at);
            println!("  cloned into [default]: {}", cloned);
        }
        Outcome::NotSso { profile } => {
            println!("Profile {} does not use SSO", profile);
        }
    }
    println!("Logins performed: {}", authenticator.login_count().await);

    println!("\n--- credentials ---");
    print!("{}", tokio::fs::read_to_string(&credentials_file).await?);
    println!("\n--- config ---");
    print!("{}", tokio::fs::read_to_string(&config_file).await?);

    Ok(())
}
