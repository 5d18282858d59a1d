//! End-to-end pipeline tests against temporary AWS CLI files.
//!
//! The login program and the role-credential service are replaced with the
//! mock capabilities; everything touching the config, credentials, and token
//! cache files is real.

#![cfg(feature = "mock")]

use chrono::{Duration, Utc};
use ssobroker::backends::mock::{MockAuthenticator, MockExchanger, MockTokenProvider};
use ssobroker::exchange::expiration_from_millis;
use ssobroker::ini::IniFile;
use ssobroker::{
    AuthToken, Broker, BrokerConfig, BrokerError, Outcome, ProfileResolver, Resolution,
    RoleCredentials, SsoCacheProvider, Stage,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CONFIG: &str = "\
[default]
region = us-east-1
output = json

[profile work]
region = eu-west-1
sso_session = main
sso_account_id = 123456789012
sso_role_name = Admin

[profile noregion]
sso_session = main
sso_account_id = 210987654321
sso_role_name = ReadOnly

[profile legacy]
region = us-east-2
output = text

[sso-session main]
sso_region = eu-west-1
sso_start_url = https://x
sso_registration_scopes = sso:account:access

";

struct Env {
    dir: TempDir,
    provider: MockTokenProvider,
    auth: MockAuthenticator,
    exchanger: MockExchanger,
}

impl Env {
    fn new(config: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config"), config).unwrap();

        Self {
            dir,
            provider: MockTokenProvider::new(),
            auth: MockAuthenticator::new(),
            exchanger: MockExchanger::with_credentials(scenario_credentials()),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn config(&self) -> BrokerConfig {
        BrokerConfig::from_lookup(self.dir.path(), |_| None)
            .with_config_file(self.path("config"))
            .with_credentials_file(self.path("credentials"))
            .with_sso_cache_dir(self.path("cache"))
    }

    fn broker(&self) -> Broker {
        self.broker_with(self.config())
    }

    fn broker_with(&self, config: BrokerConfig) -> Broker {
        Broker::new(
            config,
            Box::new(self.provider.clone()),
            Box::new(self.auth.clone()),
            Box::new(self.exchanger.clone()),
        )
    }

    async fn valid_token(&self, profile: &str) {
        self.provider
            .set_token(profile, AuthToken::new("tok-abc", Utc::now() + Duration::hours(8)))
            .await;
    }
}

fn scenario_credentials() -> RoleCredentials {
    RoleCredentials {
        access_key_id: "AKIAEXAMPLE".to_string(),
        secret_access_key: "secret".to_string(),
        session_token: "sess".to_string(),
        expires_at: expiration_from_millis(1_700_000_000_000).unwrap(),
    }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

async fn load(path: &Path) -> IniFile {
    IniFile::load(path).await.unwrap()
}

#[tokio::test]
async fn test_resolve_merges_session_keys() {
    let config = IniFile::parse(
        "[profile work]\nregion = us-west-2\nsso_session = main\n\n\
         [sso-session main]\nsso_region = eu-west-1\nsso_start_url = https://x\n",
    )
    .unwrap();

    let Resolution::Sso(profile) = ProfileResolver::new(&config).resolve("work").unwrap() else {
        panic!("expected SSO profile");
    };

    let merged: Vec<_> = profile.attributes.iter().collect();
    assert_eq!(
        merged,
        vec![
            ("region", "us-west-2"),
            ("sso_session", "main"),
            ("sso_region", "eu-west-1"),
            ("sso_start_url", "https://x"),
        ]
    );
}

#[tokio::test]
async fn test_expiring_token_is_used_without_login() {
    let env = Env::new(CONFIG);
    let token = AuthToken::new("tok-abc", Utc::now() + Duration::minutes(10));
    env.provider.set_token("work", token).await;

    let outcome = env.broker().run("work").await.unwrap();

    assert_eq!(outcome.stage(), Some(Stage::Cloned));
    assert_eq!(env.auth.login_count().await, 0);
    assert_eq!(env.exchanger.requests().await[0].access_token, "tok-abc");
}

#[tokio::test]
async fn test_exchange_stores_and_clones() {
    let env = Env::new(CONFIG);
    env.valid_token("work").await;

    let outcome = env.broker().run("work").await.unwrap();

    let Outcome::Completed {
        profile,
        section,
        credentials,
        cloned,
    } = outcome
    else {
        panic!("expected completed run");
    };
    assert_eq!(profile, "work");
    assert_eq!(section, "work");
    assert_eq!(credentials, scenario_credentials());
    assert!(cloned);

    let request = &env.exchanger.requests().await[0];
    assert_eq!(request.account_id, "123456789012");
    assert_eq!(request.role_name, "Admin");
    assert_eq!(request.region, "eu-west-1");

    assert_eq!(
        read(&env.path("credentials")),
        "[work]\n\
         region = eu-west-1\n\
         aws_access_key_id = AKIAEXAMPLE\n\
         aws_secret_access_key = secret\n\
         aws_session_token = sess\n\n"
    );

    let config = load(&env.path("config")).await;
    assert_eq!(config.section("default"), config.section("profile work"));
    assert!(!config.section("default").unwrap().contains_key("output"));
}

#[tokio::test]
async fn test_default_target_skips_clone() {
    let config = "\
[default]
sso_session = main
sso_account_id = 123456789012
sso_role_name = Admin

[sso-session main]
sso_region = eu-west-1
sso_start_url = https://x

";
    let env = Env::new(config);
    env.valid_token("default").await;

    let outcome = env.broker().run("default").await.unwrap();

    assert!(matches!(
        outcome,
        Outcome::Completed { ref section, cloned: false, .. } if section == "default"
    ));
    assert_eq!(outcome.stage(), Some(Stage::Stored));

    let credentials = load(&env.path("credentials")).await;
    let default = credentials.section("default").unwrap();
    assert_eq!(default.get("aws_access_key_id"), Some("AKIAEXAMPLE"));
    // no region anywhere: fallback
    assert_eq!(default.get("region"), Some("us-east-1"));

    assert_eq!(read(&env.path("config")), config);
}

#[tokio::test]
async fn test_non_sso_profile_writes_nothing() {
    let env = Env::new(CONFIG);

    let outcome = env.broker().run("legacy").await.unwrap();

    assert_eq!(
        outcome,
        Outcome::NotSso {
            profile: "legacy".to_string()
        }
    );
    assert!(!env.path("credentials").exists());
    assert_eq!(read(&env.path("config")), CONFIG);
    assert!(env.exchanger.requests().await.is_empty());
    assert_eq!(env.auth.login_count().await, 0);
}

#[tokio::test]
async fn test_missing_token_triggers_login() {
    let mut env = Env::new(CONFIG);
    let fresh = AuthToken::new("fresh", Utc::now() + Duration::hours(8));
    env.auth = MockAuthenticator::new().issuing(env.provider.clone(), fresh);

    env.broker().run("work").await.unwrap();

    assert_eq!(env.auth.logins().await, vec!["work"]);
    assert_eq!(env.exchanger.requests().await[0].access_token, "fresh");
}

#[tokio::test]
async fn test_login_without_token_fails_without_writes() {
    let env = Env::new(CONFIG);

    let err = env.broker().run("work").await.unwrap_err();

    assert!(matches!(err, BrokerError::TokenRetrieval { .. }));
    assert_eq!(env.auth.login_count().await, 1);
    assert!(!env.path("credentials").exists());
    assert_eq!(read(&env.path("config")), CONFIG);
}

#[tokio::test]
async fn test_login_failure_aborts() {
    let mut env = Env::new(CONFIG);
    env.auth.login_error = Some(130);

    let err = env.broker().run("work").await.unwrap_err();

    assert!(matches!(
        err,
        BrokerError::AuthenticatorFailure { code: Some(130), .. }
    ));
    assert!(!env.path("credentials").exists());
}

#[tokio::test]
async fn test_exchange_failure_leaves_files_untouched() {
    let mut env = Env::new(CONFIG);
    env.valid_token("work").await;
    env.exchanger.exchange_error = Some("UnauthorizedException: invalid token".to_string());

    let err = env.broker().run("work").await.unwrap_err();

    assert!(matches!(err, BrokerError::Exchange { .. }));
    assert!(!env.path("credentials").exists());
    assert_eq!(read(&env.path("config")), CONFIG);
}

#[tokio::test]
async fn test_missing_tool_aborts_before_reading_config() {
    let mut env = Env::new(CONFIG);
    env.auth.init_error = Some("aws command not found".to_string());
    let config = env.config().with_config_file(env.path("absent"));

    let err = env.broker_with(config).run("work").await.unwrap_err();

    assert!(matches!(err, BrokerError::ExternalToolMissing(_)));
    assert!(err.hint().is_some());
}

#[tokio::test]
async fn test_unknown_profile() {
    let env = Env::new(CONFIG);

    let err = env.broker().run("nope").await.unwrap_err();

    assert!(matches!(err, BrokerError::ProfileNotFound(ref n) if n == "nope"));
}

#[tokio::test]
async fn test_invalid_profile_name_rejected() {
    let env = Env::new(CONFIG);

    let err = env.broker().run("work]\n[default").await.unwrap_err();

    assert!(matches!(err, BrokerError::InvalidProfileName(_)));
    assert_eq!(env.auth.login_count().await, 0);
}

#[tokio::test]
async fn test_clone_disabled() {
    let env = Env::new(CONFIG);
    env.valid_token("work").await;
    let config = env.config().with_clone_to_default(false);

    let outcome = env.broker_with(config).run("work").await.unwrap();

    assert!(matches!(outcome, Outcome::Completed { cloned: false, .. }));
    assert_eq!(read(&env.path("config")), CONFIG);
}

#[tokio::test]
async fn test_fallback_region() {
    let env = Env::new(CONFIG);
    env.valid_token("noregion").await;
    let config = env.config().with_default_region("ap-southeast-2");

    env.broker_with(config).run("noregion").await.unwrap();

    let credentials = load(&env.path("credentials")).await;
    assert_eq!(
        credentials.section("noregion").unwrap().get("region"),
        Some("ap-southeast-2")
    );
}

#[tokio::test]
async fn test_rerun_replaces_section_and_keeps_others() {
    let env = Env::new(CONFIG);
    env.valid_token("work").await;
    let existing = "\
[personal]
aws_access_key_id = AKIAPERSONAL
aws_secret_access_key = keep-me

[work]
aws_access_key_id = AKIAOLD
aws_secret_access_key = old
aws_session_token = old
mfa_serial = arn:aws:iam::123456789012:mfa/me

";
    std::fs::write(env.path("credentials"), existing).unwrap();

    env.broker().run("profile work").await.unwrap();

    let text = read(&env.path("credentials"));
    assert!(text.starts_with(
        "[personal]\naws_access_key_id = AKIAPERSONAL\naws_secret_access_key = keep-me\n\n"
    ));
    assert!(!text.contains("mfa_serial"));
    assert!(!text.contains("AKIAOLD"));

    let credentials = load(&env.path("credentials")).await;
    let keys: Vec<_> = credentials.section("work").unwrap().keys().collect();
    assert_eq!(
        keys,
        vec![
            "region",
            "aws_access_key_id",
            "aws_secret_access_key",
            "aws_session_token"
        ]
    );
}

#[tokio::test]
async fn test_sso_cache_provider_end_to_end() {
    let env = Env::new(CONFIG);
    let cache_dir = env.path("cache");
    std::fs::create_dir_all(&cache_dir).unwrap();

    let provider = SsoCacheProvider::new(&cache_dir, env.path("config"));
    let expires = (Utc::now() + Duration::hours(8)).format("%Y-%m-%dT%H:%M:%SUTC");
    std::fs::write(
        provider.cache_path("main"),
        format!(
            r#"{{"startUrl": "https://x", "region": "eu-west-1", "accessToken": "cached-tok", "expiresAt": "{}"}}"#,
            expires
        ),
    )
    .unwrap();

    let broker = Broker::new(
        env.config(),
        Box::new(provider),
        Box::new(env.auth.clone()),
        Box::new(env.exchanger.clone()),
    );
    broker.run("work").await.unwrap();

    assert_eq!(env.auth.login_count().await, 0);
    assert_eq!(env.exchanger.requests().await[0].access_token, "cached-tok");
}
