//! Lease model
//!
//! A lease is a time-bounded exclusive claim on one (facility, month) schedule.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The resource a lease guards: one facility's schedule for one month
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub facility_id: String,
    /// Target month in `YYYY-MM` form
    pub target_month: String,
}

impl ResourceKey {
    pub fn new(facility_id: impl Into<String>, target_month: impl Into<String>) -> Self {
        Self {
            facility_id: facility_id.into(),
            target_month: target_month.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.facility_id, self.target_month)
    }
}

/// Kind of long-running operation a lease is taken for
///
/// The kind selects the lease TTL, so a crashed holder of a short operation
/// frees the resource quickly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Engine-driven recomputation of the whole month
    Recompute,
    /// Saving user-edited assignments
    Save,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Recompute => "recompute",
            OperationKind::Save => "save",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "recompute" => Some(OperationKind::Recompute),
            "save" => Some(OperationKind::Save),
            _ => None,
        }
    }

    /// Human-readable label for denial messages
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Recompute => "a schedule recompute",
            OperationKind::Save => "a save",
        }
    }
}

/// A granted lease as persisted by the lease store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub resource: ResourceKey,
    pub holder_id: String,
    pub holder_contact: Option<String>,
    pub operation: OperationKind,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn new(
        resource: ResourceKey,
        holder_id: impl Into<String>,
        holder_contact: Option<String>,
        operation: OperationKind,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            resource,
            holder_id: holder_id.into(),
            holder_contact,
            operation,
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    /// A lease whose expiry instant has been reached no longer excludes anyone
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_held_by(&self, holder_id: &str) -> bool {
        self.holder_id == holder_id
    }

    /// `max(0, expires_at - now)`
    pub fn remaining_time_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    pub fn remaining_time(&self) -> Duration {
        self.remaining_time_at(Utc::now())
    }

    /// Remaining time rounded up to whole minutes, for "retry in ~N minutes"
    pub fn remaining_minutes_at(&self, now: DateTime<Utc>) -> i64 {
        let remaining = self.remaining_time_at(now);
        let mut seconds = remaining.num_seconds();
        if remaining > Duration::seconds(seconds) {
            seconds += 1;
        }
        (seconds + 59) / 60
    }

    pub fn remaining_minutes(&self) -> i64 {
        self.remaining_minutes_at(Utc::now())
    }
}

/// Outcome of a lease acquisition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// The caller now holds (or has renewed) the lease
    Granted(Lease),
    /// Another holder has a valid lease; it is returned for display
    Denied { existing: Lease },
}

impl Acquisition {
    pub fn is_granted(&self) -> bool {
        matches!(self, Acquisition::Granted(_))
    }

    /// Turn a denial into `Error::LockDenied` so callers can use `?`
    pub fn into_result(self) -> crate::error::Result<Lease> {
        match self {
            Acquisition::Granted(lease) => Ok(lease),
            Acquisition::Denied { existing } => Err(crate::error::Error::LockDenied {
                lease: Box::new(existing),
            }),
        }
    }
}
