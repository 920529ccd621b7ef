//! SQLite storage layer for Rota

mod leases;
mod migrations;
mod parse;
mod schedules;
mod traits;

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use tracing::{info, instrument};

use crate::config::{LeaseConfig, RotaConfig};
use crate::error::Result;
use crate::models::{
    Acquisition, Lease, NewSchedule, OperationKind, ResourceKey, Schedule, ScheduleUpdate,
    ScheduleVersion,
};

pub use leases::LeaseStore;
pub use schedules::ScheduleStore;
pub use traits::{LeaseRepository, ScheduleRepository, Storage};

/// Main database handle
pub struct Database {
    conn: Connection,
    lease_config: LeaseConfig,
}

impl Database {
    /// Open or create database at the given path with default settings
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn, &RotaConfig::default())
    }

    /// Open or create the database described by `config`
    ///
    /// Creates the parent directory of the database file if needed.
    #[instrument(skip(config))]
    pub fn open_with(config: &RotaConfig) -> Result<Self> {
        let path = config.database.resolve_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), "Opening database");
        let conn = Connection::open(&path)?;
        Self::init(conn, config)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, &RotaConfig::default())
    }

    /// Open an existing database without write access
    ///
    /// Reads work as usual. Any write is refused by SQLite and surfaces as
    /// `PERMISSION_DENIED`. Migrations are not run.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let config = RotaConfig::default();
        conn.busy_timeout(config.database.busy_timeout())?;
        Ok(Self {
            conn,
            lease_config: config.leases,
        })
    }

    /// Apply connection settings and bring the schema up to date
    fn init(conn: Connection, config: &RotaConfig) -> Result<Self> {
        conn.busy_timeout(config.database.busy_timeout())?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn,
            lease_config: config.leases.clone(),
        })
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// TTL policy used by `leases()`
    pub fn lease_config(&self) -> &LeaseConfig {
        &self.lease_config
    }

    /// Get lease store
    pub fn leases(&self) -> LeaseStore<'_> {
        LeaseStore::new(&self.conn, &self.lease_config)
    }

    /// Get schedule store
    pub fn schedules(&self) -> ScheduleStore<'_> {
        ScheduleStore::new(&self.conn)
    }

    /// Raw connection for fault injection in tests outside this module
    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl LeaseRepository for Database {
    fn acquire_lease(
        &self,
        resource: &ResourceKey,
        holder_id: &str,
        operation: OperationKind,
        holder_contact: Option<&str>,
    ) -> Result<Acquisition> {
        self.leases()
            .acquire(resource, holder_id, operation, holder_contact)
    }

    fn release_lease(&self, resource: &ResourceKey, holder_id: &str) -> Result<bool> {
        self.leases().release(resource, holder_id)
    }

    fn inspect_lease(&self, resource: &ResourceKey) -> Result<Option<Lease>> {
        self.leases().inspect(resource)
    }
}

impl ScheduleRepository for Database {
    fn create_schedule(
        &self,
        facility_id: &str,
        holder_id: &str,
        schedule: &NewSchedule,
    ) -> Result<String> {
        self.schedules().create(facility_id, holder_id, schedule)
    }

    fn update_schedule(
        &self,
        facility_id: &str,
        schedule_id: &str,
        holder_id: &str,
        changes: &ScheduleUpdate,
    ) -> Result<()> {
        self.schedules()
            .update(facility_id, schedule_id, holder_id, changes)
    }

    fn confirm_schedule(
        &self,
        facility_id: &str,
        schedule_id: &str,
        holder_id: &str,
        change_description: Option<&str>,
    ) -> Result<()> {
        self.schedules()
            .confirm(facility_id, schedule_id, holder_id, change_description)
    }

    fn list_versions(&self, facility_id: &str, schedule_id: &str) -> Result<Vec<ScheduleVersion>> {
        self.schedules().list_versions(facility_id, schedule_id)
    }

    fn restore_version(
        &self,
        facility_id: &str,
        schedule_id: &str,
        version_number: u32,
        holder_id: &str,
    ) -> Result<()> {
        self.schedules()
            .restore(facility_id, schedule_id, version_number, holder_id)
    }

    fn find_schedule(&self, facility_id: &str, schedule_id: &str) -> Result<Option<Schedule>> {
        self.schedules().get(facility_id, schedule_id)
    }

    fn current_schedule(&self, facility_id: &str, target_month: &str) -> Result<Option<Schedule>> {
        self.schedules().current_for_month(facility_id, target_month)
    }
}
