//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::models::{Lease, Schedule, ScheduleVersion};

/// Validate that a lease's validity window is well formed
pub fn assert_lease_invariants(lease: &Lease) {
    debug_assert!(
        lease.expires_at > lease.acquired_at,
        "Lease on {} expires at {} which is not after acquisition at {}",
        lease.resource,
        lease.expires_at,
        lease.acquired_at
    );

    debug_assert!(
        !lease.holder_id.trim().is_empty(),
        "Lease on {} has empty holder",
        lease.resource
    );
}

/// Validate that a schedule document is internally consistent
pub fn assert_schedule_invariants(schedule: &Schedule) {
    // Versions start at 1 and only ever grow
    debug_assert!(
        schedule.version >= 1,
        "Schedule {} has version {}",
        schedule.id,
        schedule.version
    );

    debug_assert!(
        schedule.updated_at >= schedule.created_at,
        "Schedule {} updated before it was created",
        schedule.id
    );
}

/// Validate that a snapshot links to its predecessor
pub fn assert_version_invariants(version: &ScheduleVersion) {
    debug_assert!(
        version.version_number >= 1,
        "Snapshot of schedule {} has version number 0",
        version.schedule_id
    );

    debug_assert!(
        version.previous_version == version.version_number - 1,
        "Snapshot {} of schedule {} links to previous version {}",
        version.version_number,
        version.schedule_id,
        version.previous_version
    );

    debug_assert!(
        version.id == version.version_number.to_string(),
        "Snapshot id {} does not match version number {}",
        version.id,
        version.version_number
    );
}

/// Validate that a history listing is newest-first with no duplicates
pub fn assert_history_order(versions: &[ScheduleVersion]) {
    debug_assert!(
        versions
            .windows(2)
            .all(|pair| pair[0].version_number > pair[1].version_number),
        "Version history is not strictly newest-first"
    );
}
