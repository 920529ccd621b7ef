//! Storage repository traits
//!
//! These traits define the storage interface, allowing for different
//! implementations (SQLite, mock, future network backend).

use crate::error::Result;
use crate::models::{
    Acquisition, Lease, NewSchedule, OperationKind, ResourceKey, Schedule, ScheduleUpdate,
    ScheduleVersion,
};

/// Lease repository operations
pub trait LeaseRepository {
    /// Acquire or renew the lease on a resource; never blocks
    fn acquire_lease(
        &self,
        resource: &ResourceKey,
        holder_id: &str,
        operation: OperationKind,
        holder_contact: Option<&str>,
    ) -> Result<Acquisition>;

    /// Release a lease held by `holder_id`; `false` if someone else holds it
    fn release_lease(&self, resource: &ResourceKey, holder_id: &str) -> Result<bool>;

    /// Current valid lease, if any
    fn inspect_lease(&self, resource: &ResourceKey) -> Result<Option<Lease>>;
}

/// Schedule repository operations
pub trait ScheduleRepository {
    /// Create a schedule document, returning its id
    fn create_schedule(
        &self,
        facility_id: &str,
        holder_id: &str,
        schedule: &NewSchedule,
    ) -> Result<String>;

    /// Merge changes onto an existing schedule
    fn update_schedule(
        &self,
        facility_id: &str,
        schedule_id: &str,
        holder_id: &str,
        changes: &ScheduleUpdate,
    ) -> Result<()>;

    /// Snapshot and confirm a draft
    fn confirm_schedule(
        &self,
        facility_id: &str,
        schedule_id: &str,
        holder_id: &str,
        change_description: Option<&str>,
    ) -> Result<()>;

    /// Snapshot history, newest first
    fn list_versions(&self, facility_id: &str, schedule_id: &str) -> Result<Vec<ScheduleVersion>>;

    /// Reseed a schedule from a snapshot
    fn restore_version(
        &self,
        facility_id: &str,
        schedule_id: &str,
        version_number: u32,
        holder_id: &str,
    ) -> Result<()>;

    /// Find a schedule by id
    fn find_schedule(&self, facility_id: &str, schedule_id: &str) -> Result<Option<Schedule>>;

    /// The live document for a month
    fn current_schedule(&self, facility_id: &str, target_month: &str) -> Result<Option<Schedule>>;
}

/// Combined storage interface
///
/// Provides access to all repository operations.
/// Implementations may be backed by SQLite, mocks, or network.
pub trait Storage: LeaseRepository + ScheduleRepository {}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where T: LeaseRepository + ScheduleRepository {}
