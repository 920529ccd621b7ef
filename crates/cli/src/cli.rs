//! Command line definition for rota.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rota_core::{OperationKind, ScheduleStatus};

/// Rota: shared monthly staff schedules with lease locking and version history.
#[derive(Parser, Debug)]
#[command(name = "rota")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (TOML). Defaults apply when omitted.
    #[arg(long, global = true, env = "ROTA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file; overrides `[database] path` from the config.
    #[arg(long, global = true, env = "ROTA_DB")]
    pub db: Option<PathBuf>,

    /// Open the database read-only (history viewing).
    #[arg(long, global = true)]
    pub read_only: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lease management for a facility and month.
    Lock(LockCommand),

    /// Schedule documents and their confirmation history.
    Schedule(ScheduleCommand),

    /// Run an engine result through the recompute flow.
    ///
    /// Takes the recompute lease, writes the candidate as a draft of the
    /// month's document and releases the lease.
    Recompute(RecomputeArgs),

    /// Write edited staff schedules through the save flow.
    Save(SaveArgs),
}

/// (facility, month) pair shared by most commands.
#[derive(Args, Debug, Clone)]
pub struct MonthArgs {
    /// Facility identifier.
    #[arg(long)]
    pub facility: String,

    /// Target month, YYYY-MM.
    #[arg(long)]
    pub month: String,
}

/// Acting user.
#[derive(Args, Debug, Clone)]
pub struct UserArgs {
    /// Acting user id.
    #[arg(long, env = "ROTA_USER")]
    pub user: String,

    /// Contact shown to other users while holding a lease.
    #[arg(long)]
    pub contact: Option<String>,
}

#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// Acquire or renew a lease. Exits non-zero when another user holds it.
    Acquire {
        #[command(flatten)]
        month: MonthArgs,
        #[command(flatten)]
        user: UserArgs,
        /// Operation the lease guards.
        #[arg(long, value_enum, default_value_t = OperationArg::Save)]
        operation: OperationArg,
    },

    /// Release a lease you hold.
    Release {
        #[command(flatten)]
        month: MonthArgs,
        /// Acting user id.
        #[arg(long, env = "ROTA_USER")]
        user: String,
    },

    /// Show the current valid lease, if any.
    Status {
        #[command(flatten)]
        month: MonthArgs,
    },
}

#[derive(Parser, Debug)]
pub struct ScheduleCommand {
    #[command(subcommand)]
    pub action: ScheduleAction,
}

#[derive(Subcommand, Debug)]
pub enum ScheduleAction {
    /// Create a new draft document from a staff schedules JSON file.
    Create {
        #[command(flatten)]
        month: MonthArgs,
        /// Acting user id.
        #[arg(long, env = "ROTA_USER")]
        user: String,
        /// JSON array of staff schedules.
        #[arg(long)]
        staff_file: PathBuf,
    },

    /// Replace staff schedules and/or set the status of a document.
    Update {
        #[arg(long)]
        facility: String,
        /// Schedule id.
        id: String,
        /// Acting user id.
        #[arg(long, env = "ROTA_USER")]
        user: String,
        /// JSON array of replacement staff schedules.
        #[arg(long)]
        staff_file: Option<PathBuf>,
        /// New status. Confirmation goes through `schedule confirm`.
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },

    /// Print a document.
    Show {
        #[arg(long)]
        facility: String,
        /// Schedule id.
        id: String,
    },

    /// List every document for a month, newest first.
    List {
        #[command(flatten)]
        month: MonthArgs,
    },

    /// Confirm a draft, recording a snapshot of its content.
    Confirm {
        #[arg(long)]
        facility: String,
        /// Schedule id.
        id: String,
        /// Acting user id.
        #[arg(long, env = "ROTA_USER")]
        user: String,
        /// Note stored with the snapshot.
        #[arg(short, long)]
        message: Option<String>,
    },

    /// List confirmation snapshots, newest first.
    History {
        #[arg(long)]
        facility: String,
        /// Schedule id.
        id: String,
    },

    /// Restore a snapshot into the working copy as a new draft.
    Restore {
        #[arg(long)]
        facility: String,
        /// Schedule id.
        id: String,
        /// Snapshot version number to restore.
        #[arg(long = "to-version")]
        to_version: u32,
        /// Acting user id.
        #[arg(long, env = "ROTA_USER")]
        user: String,
    },
}

#[derive(Parser, Debug)]
pub struct RecomputeArgs {
    #[command(flatten)]
    pub month: MonthArgs,

    #[command(flatten)]
    pub user: UserArgs,

    /// Engine output JSON: `{"staffSchedules": [...], "evaluation": {...}}`.
    #[arg(long)]
    pub candidate: PathBuf,
}

#[derive(Parser, Debug)]
pub struct SaveArgs {
    #[command(flatten)]
    pub month: MonthArgs,

    #[command(flatten)]
    pub user: UserArgs,

    /// JSON array of staff schedules.
    #[arg(long)]
    pub staff_file: PathBuf,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationArg {
    Recompute,
    Save,
}

impl From<OperationArg> for OperationKind {
    fn from(arg: OperationArg) -> Self {
        match arg {
            OperationArg::Recompute => OperationKind::Recompute,
            OperationArg::Save => OperationKind::Save,
        }
    }
}

/// Statuses settable through `schedule update`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusArg {
    Draft,
    Archived,
}

impl From<StatusArg> for ScheduleStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Draft => ScheduleStatus::Draft,
            StatusArg::Archived => ScheduleStatus::Archived,
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_lock_acquire() {
        let cli = Cli::try_parse_from([
            "rota", "lock", "acquire", "--facility", "f1", "--month", "2025-11", "--user",
            "alice", "--operation", "recompute",
        ])
        .unwrap();

        match cli.command {
            Command::Lock(LockCommand {
                action:
                    LockAction::Acquire {
                        month,
                        user,
                        operation,
                    },
            }) => {
                assert_eq!(month.facility, "f1");
                assert_eq!(month.month, "2025-11");
                assert_eq!(user.user, "alice");
                assert_eq!(user.contact, None);
                assert_eq!(OperationKind::from(operation), OperationKind::Recompute);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_confirm_with_message() {
        let cli = Cli::try_parse_from([
            "rota", "--db", "/tmp/rota.db", "schedule", "confirm", "--facility", "f1", "abc",
            "--user", "alice", "-m", "final",
        ])
        .unwrap();

        assert_eq!(cli.db, Some(PathBuf::from("/tmp/rota.db")));
        match cli.command {
            Command::Schedule(ScheduleCommand {
                action: ScheduleAction::Confirm { id, message, .. },
            }) => {
                assert_eq!(id, "abc");
                assert_eq!(message.as_deref(), Some("final"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_restore_target_version() {
        let cli = Cli::try_parse_from([
            "rota", "schedule", "restore", "--facility", "f1", "abc", "--to-version", "3",
            "--user", "alice",
        ])
        .unwrap();

        match cli.command {
            Command::Schedule(ScheduleCommand {
                action: ScheduleAction::Restore { id, to_version, .. },
            }) => {
                assert_eq!(id, "abc");
                assert_eq!(to_version, 3);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_update_rejects_confirmed_status() {
        let result = Cli::try_parse_from([
            "rota", "schedule", "update", "--facility", "f1", "abc", "--user", "alice",
            "--status", "confirmed",
        ]);
        assert!(result.is_err());
    }
}
