//! Process helpers for the external login program.

use crate::{BrokerError, Result};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

fn spawn_error(program: &str, e: std::io::Error) -> BrokerError {
    if e.kind() == std::io::ErrorKind::NotFound {
        BrokerError::ExternalToolMissing(format!("{} command not found", program))
    } else {
        BrokerError::Io(e)
    }
}

/// Executes a command and returns stdout as a string.
///
/// # Errors
///
/// - [`BrokerError::ExternalToolMissing`] if the command is not found
/// - [`BrokerError::AuthenticatorFailure`] if the exit code is non-zero
/// - [`BrokerError::Other`] if the output is not valid UTF-8
pub async fn run_command(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| spawn_error(program, e))?;

    if !output.status.success() {
        return Err(BrokerError::AuthenticatorFailure {
            program: program.to_string(),
            code: output.status.code(),
        });
    }

    String::from_utf8(output.stdout).map_err(|e| {
        BrokerError::Other(anyhow::anyhow!("Invalid UTF-8 in command output: {}", e))
    })
}

/// Executes a command with the terminal passed through and waits for it.
///
/// Used for interactive login, which may open a browser or print a device
/// code. There is no timeout: this blocks until the child exits.
///
/// # Errors
///
/// - [`BrokerError::ExternalToolMissing`] if the command is not found
/// - [`BrokerError::AuthenticatorFailure`] if the exit code is non-zero
pub async fn run_interactive(program: &str, args: &[&str]) -> Result<()> {
    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| spawn_error(program, e))?;

    if !status.success() {
        return Err(BrokerError::AuthenticatorFailure {
            program: program.to_string(),
            code: status.code(),
        });
    }

    Ok(())
}

/// Locates a command-line tool.
///
/// `search_path` uses the same syntax as `PATH`; when `None` the process
/// `PATH` is searched. A `program` containing a path separator is checked
/// directly.
///
/// # Example
///
/// ```no_run
/// use ssobroker::cli::find_command;
///
/// if find_command("aws", None).is_none() {
///     println!("AWS CLI is not installed");
/// }
/// ```
pub fn find_command(program: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    match search_path {
        None => which::which(program).ok(),
        Some(paths) => {
            let cwd = std::env::current_dir().ok()?;
            which::which_in(program, Some(paths), cwd).ok()
        }
    }
}
