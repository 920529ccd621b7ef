//! Lease-guarded recompute and save flows
//!
//! Both flows take the (facility, month) lease, write the month's canonical
//! document through the store and always try to release afterwards. A failed
//! release never masks the outcome of the write; the lease TTL reclaims it.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::models::{
    NewSchedule, OperationKind, ResourceKey, Schedule, ScheduleStatus, ScheduleUpdate,
    StaffSchedule,
};
use crate::storage::Storage;
use crate::validation::{validate_resource, validate_target_month};

/// What the scheduling engine is asked to produce
#[derive(Debug, Clone)]
pub struct EngineRequest<'a> {
    pub facility_id: &'a str,
    pub target_month: &'a str,
    /// The month's live document, when one exists
    pub current: Option<&'a Schedule>,
}

/// Candidate schedule produced by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOutput {
    pub staff_schedules: Vec<StaffSchedule>,
    /// Opaque scoring data, passed back to the caller untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<serde_json::Value>,
}

/// External schedule generator
pub trait SchedulingEngine {
    fn generate(&self, request: &EngineRequest<'_>) -> Result<EngineOutput>;
}

/// Result of a guarded write
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub schedule_id: String,
    /// `true` when the month had no live document and one was created
    pub created: bool,
    pub evaluation: Option<serde_json::Value>,
}

pub struct Orchestrator<'a, S: Storage> {
    storage: &'a S,
}

impl<'a, S: Storage> Orchestrator<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Run the engine under a recompute lease and write its result as a draft
    #[instrument(skip(self, holder_contact, engine))]
    pub fn recompute<E: SchedulingEngine + ?Sized>(
        &self,
        facility_id: &str,
        target_month: &str,
        holder_id: &str,
        holder_contact: Option<&str>,
        engine: &E,
    ) -> Result<WriteOutcome> {
        let resource = ResourceKey::new(facility_id, target_month);
        validate_target_month(target_month)?;

        self.guarded(&resource, holder_id, OperationKind::Recompute, holder_contact, || {
            let current = self.storage.current_schedule(facility_id, target_month)?;
            let output = engine.generate(&EngineRequest {
                facility_id,
                target_month,
                current: current.as_ref(),
            })?;

            let (schedule_id, created) = self.write(
                current.as_ref(),
                &resource,
                holder_id,
                output.staff_schedules,
                Some(ScheduleStatus::Draft),
            )?;

            Ok(WriteOutcome {
                schedule_id,
                created,
                evaluation: output.evaluation,
            })
        })
    }

    /// Write caller-edited staff schedules under a save lease
    ///
    /// The document keeps its current status.
    #[instrument(skip(self, holder_contact, staff_schedules))]
    pub fn save(
        &self,
        facility_id: &str,
        target_month: &str,
        holder_id: &str,
        holder_contact: Option<&str>,
        staff_schedules: Vec<StaffSchedule>,
    ) -> Result<WriteOutcome> {
        let resource = ResourceKey::new(facility_id, target_month);
        validate_target_month(target_month)?;

        self.guarded(&resource, holder_id, OperationKind::Save, holder_contact, || {
            let current = self.storage.current_schedule(facility_id, target_month)?;
            let (schedule_id, created) =
                self.write(current.as_ref(), &resource, holder_id, staff_schedules, None)?;

            Ok(WriteOutcome {
                schedule_id,
                created,
                evaluation: None,
            })
        })
    }

    /// Update the live document in place, or create version 1 when there is none
    fn write(
        &self,
        current: Option<&Schedule>,
        resource: &ResourceKey,
        holder_id: &str,
        staff_schedules: Vec<StaffSchedule>,
        status: Option<ScheduleStatus>,
    ) -> Result<(String, bool)> {
        match current {
            Some(schedule) => {
                let changes = ScheduleUpdate {
                    staff_schedules: Some(staff_schedules),
                    status,
                };
                self.storage
                    .update_schedule(&resource.facility_id, &schedule.id, holder_id, &changes)?;
                Ok((schedule.id.clone(), false))
            }
            None => {
                let id = self.storage.create_schedule(
                    &resource.facility_id,
                    holder_id,
                    &NewSchedule::draft(resource.target_month.clone(), staff_schedules),
                )?;
                Ok((id, true))
            }
        }
    }

    fn guarded<T>(
        &self,
        resource: &ResourceKey,
        holder_id: &str,
        operation: OperationKind,
        holder_contact: Option<&str>,
        work: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        validate_resource(resource)?;

        self.storage
            .acquire_lease(resource, holder_id, operation, holder_contact)?
            .into_result()?;

        let result = work();

        match self.storage.release_lease(resource, holder_id) {
            Ok(true) => {}
            Ok(false) => warn!(%resource, "Lease was taken over before release"),
            Err(e) => warn!(%resource, error = %e, "Failed to release lease; it will expire"),
        }

        if result.is_ok() {
            info!(%resource, operation = operation.as_str(), "Guarded write finished");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorCode};
    use crate::models::ShiftAssignment;
    use crate::storage::Database;
    use std::cell::Cell;

    const FACILITY: &str = "facility-1";
    const MONTH: &str = "2025-11";

    fn staff(shift: &str) -> Vec<StaffSchedule> {
        vec![StaffSchedule {
            staff_id: "staff-001".to_string(),
            staff_name: "Sato".to_string(),
            monthly_shifts: vec![ShiftAssignment::planned("2025-11-01", shift)],
        }]
    }

    fn key() -> ResourceKey {
        ResourceKey::new(FACILITY, MONTH)
    }

    /// Returns a fixed roster and remembers whether it saw a live document
    struct FixedEngine {
        shift: &'static str,
        saw_current: Cell<Option<bool>>,
    }

    impl FixedEngine {
        fn new(shift: &'static str) -> Self {
            Self {
                shift,
                saw_current: Cell::new(None),
            }
        }
    }

    impl SchedulingEngine for FixedEngine {
        fn generate(&self, request: &EngineRequest<'_>) -> Result<EngineOutput> {
            self.saw_current.set(Some(request.current.is_some()));
            Ok(EngineOutput {
                staff_schedules: staff(self.shift),
                evaluation: Some(serde_json::json!({ "score": 87 })),
            })
        }
    }

    struct FailingEngine;

    impl SchedulingEngine for FailingEngine {
        fn generate(&self, _request: &EngineRequest<'_>) -> Result<EngineOutput> {
            Err(Error::Validation("no staff on roster".to_string()))
        }
    }

    /// Breaks the lease table mid-flight so the release step fails
    struct LeaseTableDropper<'a> {
        db: &'a Database,
    }

    impl SchedulingEngine for LeaseTableDropper<'_> {
        fn generate(&self, _request: &EngineRequest<'_>) -> Result<EngineOutput> {
            self.db.connection().execute_batch("DROP TABLE leases")?;
            Ok(EngineOutput {
                staff_schedules: staff("day"),
                evaluation: None,
            })
        }
    }

    #[test]
    fn test_recompute_creates_first_draft() {
        let db = Database::open_in_memory().unwrap();
        let engine = FixedEngine::new("day");

        let outcome = Orchestrator::new(&db)
            .recompute(FACILITY, MONTH, "alice", Some("alice@example.com"), &engine)
            .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.evaluation, Some(serde_json::json!({ "score": 87 })));
        assert_eq!(engine.saw_current.get(), Some(false));

        let schedule = db.schedules().get(FACILITY, &outcome.schedule_id).unwrap().unwrap();
        assert_eq!(schedule.version, 1);
        assert_eq!(schedule.status, ScheduleStatus::Draft);
        assert_eq!(schedule.staff_schedules, staff("day"));

        // Released on the way out
        assert!(db.leases().inspect(&key()).unwrap().is_none());
    }

    #[test]
    fn test_recompute_keeps_history_attached() {
        let db = Database::open_in_memory().unwrap();
        let orchestrator = Orchestrator::new(&db);

        let first = orchestrator
            .recompute(FACILITY, MONTH, "alice", None, &FixedEngine::new("day"))
            .unwrap();
        db.schedules()
            .confirm(FACILITY, &first.schedule_id, "alice", None)
            .unwrap();

        let engine = FixedEngine::new("late");
        let second = orchestrator
            .recompute(FACILITY, MONTH, "bob", None, &engine)
            .unwrap();

        assert!(!second.created);
        assert_eq!(second.schedule_id, first.schedule_id);
        assert_eq!(engine.saw_current.get(), Some(true));

        let schedule = db.schedules().get(FACILITY, &first.schedule_id).unwrap().unwrap();
        assert_eq!(schedule.status, ScheduleStatus::Draft);
        assert_eq!(schedule.version, 2);
        assert_eq!(schedule.staff_schedules, staff("late"));
        assert_eq!(
            db.schedules()
                .list_versions(FACILITY, &first.schedule_id)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(db.schedules().list_for_month(FACILITY, MONTH).unwrap().len(), 1);
    }

    #[test]
    fn test_save_keeps_status() {
        let db = Database::open_in_memory().unwrap();
        let orchestrator = Orchestrator::new(&db);

        let created = orchestrator
            .save(FACILITY, MONTH, "alice", None, staff("day"))
            .unwrap();
        assert!(created.created);
        db.schedules()
            .confirm(FACILITY, &created.schedule_id, "alice", None)
            .unwrap();

        let saved = orchestrator
            .save(FACILITY, MONTH, "bob", None, staff("night"))
            .unwrap();
        assert_eq!(saved.schedule_id, created.schedule_id);
        assert_eq!(saved.evaluation, None);

        let schedule = db.schedules().get(FACILITY, &saved.schedule_id).unwrap().unwrap();
        assert_eq!(schedule.status, ScheduleStatus::Confirmed);
        assert_eq!(schedule.staff_schedules, staff("night"));
        assert_eq!(schedule.updated_by, "bob");
    }

    #[test]
    fn test_denied_while_other_holder_active() {
        let db = Database::open_in_memory().unwrap();
        db.leases()
            .acquire(&key(), "alice", OperationKind::Recompute, None)
            .unwrap();

        let engine = FixedEngine::new("day");
        let err = Orchestrator::new(&db)
            .recompute(FACILITY, MONTH, "bob", None, &engine)
            .unwrap_err();

        match &err {
            Error::LockDenied { lease } => assert_eq!(lease.holder_id, "alice"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("another user is performing a schedule recompute"));
        assert_eq!(engine.saw_current.get(), None);

        // Alice's lease is untouched and nothing was written
        assert_eq!(db.leases().inspect(&key()).unwrap().unwrap().holder_id, "alice");
        assert!(db.schedules().list_for_month(FACILITY, MONTH).unwrap().is_empty());
    }

    #[test]
    fn test_release_after_engine_failure() {
        let db = Database::open_in_memory().unwrap();

        let err = Orchestrator::new(&db)
            .recompute(FACILITY, MONTH, "alice", None, &FailingEngine)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        assert!(db.leases().inspect(&key()).unwrap().is_none());
        db.leases()
            .acquire(&key(), "bob", OperationKind::Save, None)
            .unwrap()
            .into_result()
            .unwrap();
    }

    #[test]
    fn test_release_failure_does_not_fail_write() {
        let db = Database::open_in_memory().unwrap();
        let engine = LeaseTableDropper { db: &db };

        let outcome = Orchestrator::new(&db)
            .recompute(FACILITY, MONTH, "alice", None, &engine)
            .unwrap();

        let schedule = db.schedules().get(FACILITY, &outcome.schedule_id).unwrap().unwrap();
        assert_eq!(schedule.staff_schedules, staff("day"));
    }

    #[test]
    fn test_invalid_month_rejected_before_lease() {
        let db = Database::open_in_memory().unwrap();

        let err = Orchestrator::new(&db)
            .save(FACILITY, "2025/11", "alice", None, staff("day"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(db
            .leases()
            .inspect(&ResourceKey::new(FACILITY, "2025/11"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_empty_save_is_rejected_and_released() {
        let db = Database::open_in_memory().unwrap();

        let err = Orchestrator::new(&db)
            .save(FACILITY, MONTH, "alice", None, Vec::new())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(db.leases().inspect(&key()).unwrap().is_none());
    }
}
