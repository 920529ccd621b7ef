//! Command handlers.
//!
//! Each handler opens the database described by the global flags, runs one
//! core operation and prints its result as JSON on stdout.

use serde::Serialize;
use serde_json::json;
use tracing::info;

use rota_core::{
    Acquisition, Database, Error, NewSchedule, Orchestrator, ResourceKey, Result, RotaConfig,
    ScheduleRepository, ScheduleUpdate,
};

use crate::cli::{Cli, Command, LockAction, LockCommand, ScheduleAction, ScheduleCommand};
use crate::engine::{read_staff_file, CandidateFile};

pub fn dispatch(cli: Cli) -> Result<()> {
    let db = open_database(&cli)?;

    match cli.command {
        Command::Lock(LockCommand { action }) => lock(&db, action),
        Command::Schedule(ScheduleCommand { action }) => schedule(&db, action),
        Command::Recompute(args) => {
            let engine = CandidateFile::new(args.candidate);
            let outcome = Orchestrator::new(&db).recompute(
                &args.month.facility,
                &args.month.month,
                &args.user.user,
                args.user.contact.as_deref(),
                &engine,
            )?;
            print_json(&json!({
                "scheduleId": outcome.schedule_id,
                "created": outcome.created,
                "evaluation": outcome.evaluation,
            }))
        }
        Command::Save(args) => {
            let staff_schedules = read_staff_file(&args.staff_file)?;
            let outcome = Orchestrator::new(&db).save(
                &args.month.facility,
                &args.month.month,
                &args.user.user,
                args.user.contact.as_deref(),
                staff_schedules,
            )?;
            print_json(&json!({
                "scheduleId": outcome.schedule_id,
                "created": outcome.created,
            }))
        }
    }
}

fn open_database(cli: &Cli) -> Result<Database> {
    let mut config = match &cli.config {
        Some(path) => RotaConfig::load(path)?,
        None => RotaConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.database.path = Some(db.clone());
    }

    if cli.read_only {
        Database::open_read_only(config.database.resolve_path()?)
    } else {
        Database::open_with(&config)
    }
}

fn lock(db: &Database, action: LockAction) -> Result<()> {
    match action {
        LockAction::Acquire {
            month,
            user,
            operation,
        } => {
            let resource = ResourceKey::new(month.facility, month.month);
            let acquisition = db.leases().acquire(
                &resource,
                &user.user,
                operation.into(),
                user.contact.as_deref(),
            )?;
            if let Acquisition::Granted(lease) = &acquisition {
                print_json(lease)?;
            }
            // Denial becomes LOCK_DENIED with the holder's message
            acquisition.into_result().map(|_| ())
        }
        LockAction::Release { month, user } => {
            let resource = ResourceKey::new(month.facility, month.month);
            if db.leases().release(&resource, &user)? {
                info!(%resource, "Released");
                print_json(&json!({ "released": true }))
            } else {
                Err(Error::PermissionDenied(format!(
                    "lease on {resource} is held by another user"
                )))
            }
        }
        LockAction::Status { month } => {
            let resource = ResourceKey::new(month.facility, month.month);
            match db.leases().inspect(&resource)? {
                Some(lease) => print_json(&json!({
                    "lease": lease,
                    "remainingSeconds": lease.remaining_time().num_seconds(),
                    "remainingMinutes": lease.remaining_minutes(),
                })),
                None => print_json(&json!({ "lease": null })),
            }
        }
    }
}

fn schedule(db: &Database, action: ScheduleAction) -> Result<()> {
    match action {
        ScheduleAction::Create {
            month,
            user,
            staff_file,
        } => {
            let staff_schedules = read_staff_file(&staff_file)?;
            let id = db.create_schedule(
                &month.facility,
                &user,
                &NewSchedule::draft(month.month, staff_schedules),
            )?;
            print_json(&json!({ "scheduleId": id }))
        }
        ScheduleAction::Update {
            facility,
            id,
            user,
            staff_file,
            status,
        } => {
            let changes = ScheduleUpdate {
                staff_schedules: staff_file.as_deref().map(read_staff_file).transpose()?,
                status: status.map(Into::into),
            };
            if changes.is_empty() {
                return Err(Error::Validation(
                    "nothing to update; pass --staff-file and/or --status".to_string(),
                ));
            }
            db.update_schedule(&facility, &id, &user, &changes)?;
            print_schedule(db, &facility, &id)
        }
        ScheduleAction::Show { facility, id } => print_schedule(db, &facility, &id),
        ScheduleAction::List { month } => {
            print_json(&db.schedules().list_for_month(&month.facility, &month.month)?)
        }
        ScheduleAction::Confirm {
            facility,
            id,
            user,
            message,
        } => {
            db.confirm_schedule(&facility, &id, &user, message.as_deref())?;
            print_schedule(db, &facility, &id)
        }
        ScheduleAction::History { facility, id } => {
            print_json(&db.list_versions(&facility, &id)?)
        }
        ScheduleAction::Restore {
            facility,
            id,
            to_version,
            user,
        } => {
            db.restore_version(&facility, &id, to_version, &user)?;
            print_schedule(db, &facility, &id)
        }
    }
}

fn print_schedule(db: &Database, facility_id: &str, schedule_id: &str) -> Result<()> {
    let schedule = db
        .find_schedule(facility_id, schedule_id)?
        .ok_or_else(|| Error::NotFound(format!("schedule {schedule_id} not found")))?;
    print_json(&schedule)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
