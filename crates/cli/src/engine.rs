//! Scheduling engine backed by a precomputed candidate file.
//!
//! The real engine runs out of process and leaves its result as JSON; the
//! orchestrator only needs the `SchedulingEngine` contract.

use std::path::{Path, PathBuf};

use rota_core::{EngineOutput, EngineRequest, Result, SchedulingEngine, StaffSchedule};
use tracing::debug;

pub struct CandidateFile {
    path: PathBuf,
}

impl CandidateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SchedulingEngine for CandidateFile {
    fn generate(&self, request: &EngineRequest<'_>) -> Result<EngineOutput> {
        debug!(
            path = %self.path.display(),
            facility_id = request.facility_id,
            target_month = request.target_month,
            has_current = request.current.is_some(),
            "Loading engine candidate"
        );
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Read a JSON array of staff schedules
pub fn read_staff_file(path: &Path) -> Result<Vec<StaffSchedule>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rota_core::ErrorCode;

    const CANDIDATE: &str = r#"{
        "staffSchedules": [{
            "staffId": "staff-001",
            "staffName": "Sato",
            "monthlyShifts": [{"date": "2025-11-01", "plannedShiftType": "day"}]
        }],
        "evaluation": {"score": 92, "violations": []}
    }"#;

    fn request() -> EngineRequest<'static> {
        EngineRequest {
            facility_id: "f1",
            target_month: "2025-11",
            current: None,
        }
    }

    #[test]
    fn test_candidate_file_loads_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidate.json");
        std::fs::write(&path, CANDIDATE).unwrap();

        let output = CandidateFile::new(&path).generate(&request()).unwrap();
        assert_eq!(output.staff_schedules.len(), 1);
        assert_eq!(output.staff_schedules[0].staff_id, "staff-001");
        assert_eq!(output.evaluation.unwrap()["score"], 92);
    }

    #[test]
    fn test_missing_candidate_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CandidateFile::new(dir.path().join("absent.json"))
            .generate(&request())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::StoreError);
    }

    #[test]
    fn test_staff_file_must_be_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staff.json");
        std::fs::write(&path, CANDIDATE).unwrap();
        assert!(read_staff_file(&path).is_err());
    }
}
