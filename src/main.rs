use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use ssobroker::{Broker, BrokerConfig, BrokerError, LogConfig, Outcome};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "ssobroker",
    version,
    about = "Exchange a cached AWS SSO session for role credentials"
)]
struct Cli {
    /// Profile to fetch credentials for ("default" or a profile name)
    #[arg(env = "AWS_PROFILE")]
    profile: String,

    /// Report progress for every stage
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Do not copy the profile into [default]
    #[arg(long)]
    no_clone: bool,

    /// AWS CLI configuration file
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Shared credentials file to write
    #[arg(long)]
    credentials_file: Option<PathBuf>,

    /// Directory holding cached SSO tokens
    #[arg(long)]
    sso_cache_dir: Option<PathBuf>,

    /// Program used for `sso login`
    #[arg(long)]
    login_program: Option<String>,

    /// Role-credential service endpoint
    #[arg(long)]
    endpoint_url: Option<String>,
}

impl Cli {
    fn broker_config(&self) -> ssobroker::Result<BrokerConfig> {
        let mut config = BrokerConfig::from_env()?.with_clone_to_default(!self.no_clone);

        if let Some(ref path) = self.config_file {
            config = config.with_config_file(path);
        }
        if let Some(ref path) = self.credentials_file {
            config = config.with_credentials_file(path);
        }
        if let Some(ref path) = self.sso_cache_dir {
            config = config.with_sso_cache_dir(path);
        }
        if let Some(ref program) = self.login_program {
            config = config.with_login_program(program);
        }
        if let Some(ref url) = self.endpoint_url {
            config = config.with_endpoint_url(url);
        }
        Ok(config)
    }
}

fn init_telemetry(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log.default_filter()));

    if log.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(log.ansi)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(cli: &Cli) -> ssobroker::Result<Outcome> {
    let broker = Broker::from_config(cli.broker_config()?);
    let outcome = broker.run(&cli.profile).await?;

    match outcome {
        Outcome::Completed {
            ref section,
            ref credentials,
            cloned,
            ..
        } => {
            info!(
                section = %section,
                expires_at = %credentials.expires_at.with_timezone(&Local),
                cloned,
                "credentials updated"
            );
        }
        Outcome::NotSso { ref profile } => {
            info!(profile = %profile, "profile does not use SSO, nothing updated");
        }
    }
    Ok(outcome)
}

/// Process exit status for a finished run.
fn exit_status(result: &ssobroker::Result<Outcome>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Error message and hint, as printed to stderr.
fn error_report(e: &BrokerError) -> String {
    match e.hint() {
        Some(hint) => format!("error: {}\n{}", e, hint),
        None => format!("error: {}", e),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_telemetry(&LogConfig::from_lookup(cli.verbose, cli.json_logs, |key| {
        std::env::var(key).ok()
    }));

    let result = run(&cli).await;
    if let Err(ref e) = result {
        eprintln!("{}", error_report(e));
    }
    ExitCode::from(exit_status(&result))
}
