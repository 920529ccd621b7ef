//! Rota - shared monthly staff schedules
//!
//! Operator command line over `rota-core`: lease management, schedule
//! documents with confirmation history, and the guarded recompute/save flows.

use std::process::ExitCode;

use rota_core::ErrorCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod engine;

use cli::Cli;

fn main() -> ExitCode {
    // Initialize logging; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse_args();

    match commands::dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.code();
            tracing::debug!(code = code.as_str(), "Command failed");
            eprintln!("error [{}]: {}", code.as_str(), err);
            ExitCode::from(exit_status(code))
        }
    }
}

fn exit_status(code: ErrorCode) -> u8 {
    match code {
        ErrorCode::ValidationError | ErrorCode::NotFound => 1,
        ErrorCode::Conflict => 2,
        ErrorCode::LockDenied => 3,
        ErrorCode::PermissionDenied => 4,
        ErrorCode::StoreError | ErrorCode::LockOperationFailed => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_statuses_are_nonzero() {
        for code in [
            ErrorCode::ValidationError,
            ErrorCode::NotFound,
            ErrorCode::Conflict,
            ErrorCode::PermissionDenied,
            ErrorCode::StoreError,
            ErrorCode::LockDenied,
            ErrorCode::LockOperationFailed,
        ] {
            assert_ne!(exit_status(code), 0);
        }
    }

    #[test]
    fn test_lock_denied_is_distinct() {
        assert_ne!(exit_status(ErrorCode::LockDenied), exit_status(ErrorCode::Conflict));
    }
}
