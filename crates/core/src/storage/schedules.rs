//! Schedule storage operations
//!
//! Schedules live in `schedules`; confirmation snapshots live in
//! `schedule_versions` as children of a schedule and are never rewritten.
//! `confirm` and `restore` each run as one `BEGIN IMMEDIATE` transaction so a
//! half-applied state is never visible. `create` and `update` are
//! last-write-wins; callers serialize them with a lease.

use chrono::Utc;
use rusqlite::{params, Connection, Error as SqlError, Row, Transaction, TransactionBehavior};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::parse::{parse_datetime, parse_staff_schedules, parse_status, OptionalExt};
use crate::error::{Error, Result};
use crate::invariants::{assert_history_order, assert_schedule_invariants, assert_version_invariants};
use crate::models::{NewSchedule, Schedule, ScheduleStatus, ScheduleUpdate, ScheduleVersion};
use crate::validation::{require_non_empty, validate_staff_schedules, validate_target_month};

const SCHEDULE_COLUMNS: &str = "id, facility_id, target_month, staff_schedules, version, status, \
     created_at, created_by, updated_at, updated_by";

const VERSION_COLUMNS: &str = "schedule_id, version_number, target_month, staff_schedules, \
     created_at, created_by, change_description, previous_version";

const DEFAULT_CHANGE_DESCRIPTION: &str = "Confirmed";

pub struct ScheduleStore<'a> {
    conn: &'a Connection,
}

impl<'a> ScheduleStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a new schedule document and return its id
    ///
    /// Always inserts; use `update` for a month that already has a document so
    /// its snapshot history stays attached.
    #[instrument(skip(self, schedule), fields(target_month = %schedule.target_month))]
    pub fn create(&self, facility_id: &str, holder_id: &str, schedule: &NewSchedule) -> Result<String> {
        require_non_empty("facility_id", facility_id)?;
        require_non_empty("holder_id", holder_id)?;
        validate_target_month(&schedule.target_month)?;
        validate_staff_schedules(&schedule.staff_schedules)?;
        if schedule.version < 1 {
            return Err(Error::Validation("version must be at least 1".to_string()));
        }
        if schedule.status == ScheduleStatus::Confirmed {
            return Err(Error::Validation(
                "a schedule cannot be created confirmed; confirm it after creation".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let staff_schedules = serde_json::to_string(&schedule.staff_schedules)?;

        self.conn.execute(
            "INSERT INTO schedules (id, facility_id, target_month, staff_schedules, version, status, created_at, created_by, updated_at, updated_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?7, ?8)",
            params![
                id,
                facility_id,
                schedule.target_month,
                staff_schedules,
                schedule.version,
                schedule.status.as_str(),
                now,
                holder_id,
            ],
        )?;

        info!(schedule_id = %id, "Schedule created");
        Ok(id)
    }

    /// Merge `changes` onto an existing schedule and stamp the editor
    ///
    /// Leaves the version alone. Confirmation is only reachable through
    /// `confirm`, so `status = confirmed` is rejected here. Archived documents
    /// are terminal and refuse every change.
    #[instrument(skip(self, changes))]
    pub fn update(
        &self,
        facility_id: &str,
        schedule_id: &str,
        holder_id: &str,
        changes: &ScheduleUpdate,
    ) -> Result<()> {
        require_non_empty("facility_id", facility_id)?;
        require_non_empty("schedule_id", schedule_id)?;
        require_non_empty("holder_id", holder_id)?;
        if let Some(staff_schedules) = &changes.staff_schedules {
            validate_staff_schedules(staff_schedules)?;
        }
        if changes.status == Some(ScheduleStatus::Confirmed) {
            return Err(Error::Validation(
                "status cannot be set to confirmed by update; confirm the schedule instead"
                    .to_string(),
            ));
        }

        let staff_schedules = changes
            .staff_schedules
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let (status, version) = select_status(&tx, facility_id, schedule_id)?
            .ok_or_else(|| schedule_not_found(schedule_id))?;
        if status == ScheduleStatus::Archived {
            warn!("Refusing to change archived schedule");
            return Err(Error::Conflict {
                message: "schedule is archived and cannot be changed".to_string(),
                current_version: version,
            });
        }

        tx.execute(
            "UPDATE schedules SET
                staff_schedules = COALESCE(?1, staff_schedules),
                status = COALESCE(?2, status),
                updated_at = ?3,
                updated_by = ?4
             WHERE id = ?5 AND facility_id = ?6",
            params![
                staff_schedules,
                changes.status.map(|s| s.as_str()),
                Utc::now().to_rfc3339(),
                holder_id,
                schedule_id,
                facility_id,
            ],
        )?;
        tx.commit()?;

        info!(
            replaced_staff_schedules = changes.staff_schedules.is_some(),
            status = changes.status.map(|s| s.as_str()),
            "Schedule updated"
        );
        Ok(())
    }

    /// Confirm a draft: snapshot its content under the current version, then
    /// bump the version and mark it confirmed, all in one transaction
    #[instrument(skip(self, change_description))]
    pub fn confirm(
        &self,
        facility_id: &str,
        schedule_id: &str,
        holder_id: &str,
        change_description: Option<&str>,
    ) -> Result<()> {
        require_non_empty("facility_id", facility_id)?;
        require_non_empty("schedule_id", schedule_id)?;
        require_non_empty("holder_id", holder_id)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let schedule = select_schedule(&tx, facility_id, schedule_id)?
            .ok_or_else(|| schedule_not_found(schedule_id))?;

        if schedule.status != ScheduleStatus::Draft {
            warn!(status = schedule.status.as_str(), "Refusing to confirm non-draft schedule");
            return Err(Error::Conflict {
                message: format!(
                    "schedule is already {}; only a draft can be confirmed",
                    schedule.status.as_str()
                ),
                current_version: schedule.version,
            });
        }

        let snapshot = ScheduleVersion {
            id: schedule.version.to_string(),
            schedule_id: schedule.id.clone(),
            version_number: schedule.version,
            target_month: schedule.target_month.clone(),
            staff_schedules: schedule.staff_schedules.clone(),
            created_at: Utc::now(),
            // The snapshot is attributed to whoever last edited the content
            created_by: schedule.updated_by.clone(),
            change_description: change_description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or(DEFAULT_CHANGE_DESCRIPTION)
                .to_string(),
            previous_version: schedule.version.saturating_sub(1),
        };
        assert_version_invariants(&snapshot);

        tx.execute(
            "INSERT INTO schedule_versions (schedule_id, version_number, target_month, staff_schedules, created_at, created_by, change_description, previous_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                snapshot.schedule_id,
                snapshot.version_number,
                snapshot.target_month,
                serde_json::to_string(&snapshot.staff_schedules)?,
                snapshot.created_at.to_rfc3339(),
                snapshot.created_by,
                snapshot.change_description,
                snapshot.previous_version,
            ],
        )?;

        let next_version = schedule.version + 1;
        tx.execute(
            "UPDATE schedules SET version = ?1, status = ?2, updated_at = ?3, updated_by = ?4
             WHERE id = ?5",
            params![
                next_version,
                ScheduleStatus::Confirmed.as_str(),
                snapshot.created_at.to_rfc3339(),
                holder_id,
                schedule.id,
            ],
        )?;

        tx.commit()?;

        info!(
            snapshot_version = snapshot.version_number,
            version = next_version,
            "Schedule confirmed"
        );
        Ok(())
    }

    /// Snapshot history of a schedule, newest first
    ///
    /// A schedule that was never confirmed has an empty history.
    #[instrument(skip(self))]
    pub fn list_versions(&self, facility_id: &str, schedule_id: &str) -> Result<Vec<ScheduleVersion>> {
        require_non_empty("facility_id", facility_id)?;
        require_non_empty("schedule_id", schedule_id)?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM schedule_versions v
             INNER JOIN schedules s ON s.id = v.schedule_id
             WHERE v.schedule_id = ?1 AND s.facility_id = ?2
             ORDER BY v.version_number DESC",
            prefixed(VERSION_COLUMNS, "v")
        ))?;

        let versions = stmt
            .query_map(params![schedule_id, facility_id], version_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        assert_history_order(&versions);
        Ok(versions)
    }

    /// Reseed the working copy from snapshot `version_number` and return it
    /// to draft
    ///
    /// Existing snapshots are left as they are; the restored content gets a
    /// fresh version so a later confirm appends a new snapshot.
    #[instrument(skip(self))]
    pub fn restore(
        &self,
        facility_id: &str,
        schedule_id: &str,
        version_number: u32,
        holder_id: &str,
    ) -> Result<()> {
        require_non_empty("facility_id", facility_id)?;
        require_non_empty("schedule_id", schedule_id)?;
        require_non_empty("holder_id", holder_id)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let snapshot = select_version(&tx, schedule_id, version_number)?.ok_or_else(|| {
            Error::NotFound(format!(
                "version {version_number} of schedule {schedule_id} not found"
            ))
        })?;

        let schedule = select_schedule(&tx, facility_id, schedule_id)?
            .ok_or_else(|| schedule_not_found(schedule_id))?;

        if schedule.status == ScheduleStatus::Archived {
            return Err(Error::Conflict {
                message: "schedule is archived and cannot be restored".to_string(),
                current_version: schedule.version,
            });
        }

        let next_version = schedule.version + 1;
        tx.execute(
            "UPDATE schedules SET staff_schedules = ?1, version = ?2, status = ?3, updated_at = ?4, updated_by = ?5
             WHERE id = ?6",
            params![
                serde_json::to_string(&snapshot.staff_schedules)?,
                next_version,
                ScheduleStatus::Draft.as_str(),
                Utc::now().to_rfc3339(),
                holder_id,
                schedule.id,
            ],
        )?;

        tx.commit()?;

        info!(
            restored_from = version_number,
            version = next_version,
            "Schedule restored"
        );
        Ok(())
    }

    /// Find a schedule by id within a facility
    #[instrument(skip(self))]
    pub fn get(&self, facility_id: &str, schedule_id: &str) -> Result<Option<Schedule>> {
        require_non_empty("facility_id", facility_id)?;
        require_non_empty("schedule_id", schedule_id)?;

        Ok(select_schedule(self.conn, facility_id, schedule_id)?)
    }

    /// All schedule documents for a month, newest first
    #[instrument(skip(self))]
    pub fn list_for_month(&self, facility_id: &str, target_month: &str) -> Result<Vec<Schedule>> {
        require_non_empty("facility_id", facility_id)?;
        validate_target_month(target_month)?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules
             WHERE facility_id = ?1 AND target_month = ?2
             ORDER BY created_at DESC, rowid DESC"
        ))?;

        let schedules = stmt
            .query_map(params![facility_id, target_month], schedule_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(schedules)
    }

    /// The canonical live (non-archived) document for a month, if any
    #[instrument(skip(self))]
    pub fn current_for_month(&self, facility_id: &str, target_month: &str) -> Result<Option<Schedule>> {
        require_non_empty("facility_id", facility_id)?;
        validate_target_month(target_month)?;

        let schedule = self
            .conn
            .query_row(
                &format!(
                    "SELECT {SCHEDULE_COLUMNS} FROM schedules
                     WHERE facility_id = ?1 AND target_month = ?2 AND status != ?3
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT 1"
                ),
                params![facility_id, target_month, ScheduleStatus::Archived.as_str()],
                schedule_from_row,
            )
            .optional()?;

        Ok(schedule)
    }
}

fn schedule_not_found(schedule_id: &str) -> Error {
    Error::NotFound(format!("schedule {schedule_id} not found"))
}

/// Qualify every column in a column list with a table alias
fn prefixed(columns: &str, alias: &str) -> String {
    columns
        .split(',')
        .map(|column| format!("{alias}.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn select_schedule(
    conn: &Connection,
    facility_id: &str,
    schedule_id: &str,
) -> std::result::Result<Option<Schedule>, SqlError> {
    conn.query_row(
        &format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?1 AND facility_id = ?2"),
        params![schedule_id, facility_id],
        schedule_from_row,
    )
    .optional()
}

/// Status and version of a schedule, without decoding its content
fn select_status(
    conn: &Connection,
    facility_id: &str,
    schedule_id: &str,
) -> std::result::Result<Option<(ScheduleStatus, u32)>, SqlError> {
    conn.query_row(
        "SELECT status, version FROM schedules WHERE id = ?1 AND facility_id = ?2",
        params![schedule_id, facility_id],
        |row| Ok((parse_status(0, &row.get::<_, String>(0)?)?, row.get(1)?)),
    )
    .optional()
}

fn select_version(
    conn: &Connection,
    schedule_id: &str,
    version_number: u32,
) -> std::result::Result<Option<ScheduleVersion>, SqlError> {
    conn.query_row(
        &format!(
            "SELECT {VERSION_COLUMNS} FROM schedule_versions WHERE schedule_id = ?1 AND version_number = ?2"
        ),
        params![schedule_id, version_number],
        version_from_row,
    )
    .optional()
}

fn schedule_from_row(row: &Row<'_>) -> std::result::Result<Schedule, SqlError> {
    let schedule = Schedule {
        id: row.get(0)?,
        facility_id: row.get(1)?,
        target_month: row.get(2)?,
        staff_schedules: parse_staff_schedules(3, &row.get::<_, String>(3)?)?,
        version: row.get(4)?,
        status: parse_status(5, &row.get::<_, String>(5)?)?,
        created_at: parse_datetime(6, &row.get::<_, String>(6)?)?,
        created_by: row.get(7)?,
        updated_at: parse_datetime(8, &row.get::<_, String>(8)?)?,
        updated_by: row.get(9)?,
    };
    assert_schedule_invariants(&schedule);
    Ok(schedule)
}

fn version_from_row(row: &Row<'_>) -> std::result::Result<ScheduleVersion, SqlError> {
    let version_number: u32 = row.get(1)?;
    Ok(ScheduleVersion {
        id: version_number.to_string(),
        schedule_id: row.get(0)?,
        version_number,
        target_month: row.get(2)?,
        staff_schedules: parse_staff_schedules(3, &row.get::<_, String>(3)?)?,
        created_at: parse_datetime(4, &row.get::<_, String>(4)?)?,
        created_by: row.get(5)?,
        change_description: row.get(6)?,
        previous_version: row.get(7)?,
    })
}
