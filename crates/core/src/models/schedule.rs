//! Schedule and snapshot models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a schedule document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    /// Working copy, editable and confirmable
    Draft,
    /// Confirmed; a snapshot of the confirmed content exists
    Confirmed,
    /// Retired out of band; terminal
    Archived,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Draft => "draft",
            ScheduleStatus::Confirmed => "confirmed",
            ScheduleStatus::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ScheduleStatus::Draft),
            "confirmed" => Some(ScheduleStatus::Confirmed),
            "archived" => Some(ScheduleStatus::Archived),
            _ => None,
        }
    }
}

/// One day's assignment for one staff member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftAssignment {
    /// Day in `YYYY-MM-DD` form
    pub date: String,
    pub planned_shift_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_shift_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ShiftAssignment {
    pub fn planned(date: impl Into<String>, shift_type: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            planned_shift_type: shift_type.into(),
            planned_start_time: None,
            planned_end_time: None,
            actual_shift_type: None,
            actual_start_time: None,
            actual_end_time: None,
            break_minutes: None,
            notes: None,
        }
    }
}

/// A staff member's assignments for the month, in day order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffSchedule {
    pub staff_id: String,
    pub staff_name: String,
    pub monthly_shifts: Vec<ShiftAssignment>,
}

/// The canonical working document for one facility and month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub facility_id: String,
    pub target_month: String,
    pub staff_schedules: Vec<StaffSchedule>,
    /// Starts at 1; only the store changes it
    pub version: u32,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

/// Immutable copy of a schedule's content taken at confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleVersion {
    /// Same as `version_number`, as a string key
    pub id: String,
    pub schedule_id: String,
    pub version_number: u32,
    pub target_month: String,
    pub staff_schedules: Vec<StaffSchedule>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub change_description: String,
    pub previous_version: u32,
}

/// Input for creating a schedule document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSchedule {
    pub target_month: String,
    pub staff_schedules: Vec<StaffSchedule>,
    #[serde(default = "NewSchedule::initial_version")]
    pub version: u32,
    #[serde(default = "NewSchedule::initial_status")]
    pub status: ScheduleStatus,
}

impl NewSchedule {
    /// First draft of a month: version 1, status draft
    pub fn draft(target_month: impl Into<String>, staff_schedules: Vec<StaffSchedule>) -> Self {
        Self {
            target_month: target_month.into(),
            staff_schedules,
            version: Self::initial_version(),
            status: Self::initial_status(),
        }
    }

    fn initial_version() -> u32 {
        1
    }

    fn initial_status() -> ScheduleStatus {
        ScheduleStatus::Draft
    }
}

/// Partial update merged onto an existing schedule
///
/// `None` leaves the stored field untouched. The version is not editable here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpdate {
    #[serde(default)]
    pub staff_schedules: Option<Vec<StaffSchedule>>,
    #[serde(default)]
    pub status: Option<ScheduleStatus>,
}

impl ScheduleUpdate {
    pub fn staff_schedules(staff_schedules: Vec<StaffSchedule>) -> Self {
        Self {
            staff_schedules: Some(staff_schedules),
            status: None,
        }
    }

    pub fn with_status(mut self, status: ScheduleStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.staff_schedules.is_none() && self.status.is_none()
    }
}
