//! Lease storage operations
//!
//! Each acquire and release is exactly one `BEGIN IMMEDIATE` transaction, so
//! the read of the current lease and the write that follows cannot interleave
//! with another connection's. Expiry is lazy: reads never delete a stale
//! lease, the next acquire simply overwrites it.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Error as SqlError, Row, Transaction, TransactionBehavior};
use tracing::{debug, info, instrument, warn};

use super::parse::{parse_datetime, parse_operation, OptionalExt};
use crate::config::LeaseConfig;
use crate::error::{Error, Result};
use crate::invariants::assert_lease_invariants;
use crate::models::{Acquisition, Lease, OperationKind, ResourceKey};
use crate::validation::{require_non_empty, validate_resource};

const LEASE_COLUMNS: &str =
    "facility_id, target_month, holder_id, holder_contact, operation, acquired_at, expires_at";

/// How a granted acquisition related to the previous lease, for logging
enum Grant {
    Fresh,
    Renewed,
    Preempted { previous_holder: String },
}

/// Result of a release attempt before logging
enum Release {
    Absent,
    Released,
    HeldByOther { holder_id: String },
}

pub struct LeaseStore<'a> {
    conn: &'a Connection,
    config: &'a LeaseConfig,
}

impl<'a> LeaseStore<'a> {
    pub fn new(conn: &'a Connection, config: &'a LeaseConfig) -> Self {
        Self { conn, config }
    }

    /// Acquire or renew the lease on `resource` for `holder_id`
    ///
    /// Never waits on another holder: a valid foreign lease is answered with
    /// `Acquisition::Denied` carrying that lease.
    pub fn acquire(
        &self,
        resource: &ResourceKey,
        holder_id: &str,
        operation: OperationKind,
        holder_contact: Option<&str>,
    ) -> Result<Acquisition> {
        self.acquire_at(resource, holder_id, operation, holder_contact, Utc::now())
    }

    /// `acquire` evaluated at an explicit instant
    #[instrument(
        skip(self, resource, operation, holder_contact),
        fields(resource = %resource, operation = operation.as_str())
    )]
    pub fn acquire_at(
        &self,
        resource: &ResourceKey,
        holder_id: &str,
        operation: OperationKind,
        holder_contact: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Acquisition> {
        validate_resource(resource)?;
        require_non_empty("holder_id", holder_id)?;

        let candidate = Lease::new(
            resource.clone(),
            holder_id,
            holder_contact.map(str::to_string),
            operation,
            now,
            self.config.ttl_for(operation),
        );
        assert_lease_invariants(&candidate);

        match self.try_acquire(&candidate, now).map_err(Error::LockOperation)? {
            Ok(grant) => {
                match grant {
                    Grant::Fresh => info!(expires_at = %candidate.expires_at, "Lease acquired"),
                    Grant::Renewed => info!(expires_at = %candidate.expires_at, "Lease renewed"),
                    Grant::Preempted { previous_holder } => info!(
                        %previous_holder,
                        expires_at = %candidate.expires_at,
                        "Lease acquired over expired lease"
                    ),
                }
                Ok(Acquisition::Granted(candidate))
            }
            Err(existing) => {
                warn!(
                    held_by = %existing.holder_id,
                    expires_at = %existing.expires_at,
                    "Lease held by another holder"
                );
                Ok(Acquisition::Denied { existing })
            }
        }
    }

    /// One transaction: read the current lease, then write the candidate or
    /// hand back the blocking lease
    fn try_acquire(
        &self,
        candidate: &Lease,
        now: DateTime<Utc>,
    ) -> std::result::Result<std::result::Result<Grant, Lease>, SqlError> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let grant = match select_lease(&tx, &candidate.resource)? {
            None => Grant::Fresh,
            Some(existing) if existing.is_held_by(&candidate.holder_id) => Grant::Renewed,
            Some(existing) if existing.is_expired_at(now) => {
                debug!(holder = %existing.holder_id, "Found expired lease");
                Grant::Preempted {
                    previous_holder: existing.holder_id,
                }
            }
            // Nothing was written; dropping the transaction rolls it back
            Some(existing) => return Ok(Err(existing)),
        };

        tx.execute(
            "INSERT INTO leases (facility_id, target_month, holder_id, holder_contact, operation, acquired_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(facility_id, target_month) DO UPDATE SET
                holder_id = excluded.holder_id,
                holder_contact = excluded.holder_contact,
                operation = excluded.operation,
                acquired_at = excluded.acquired_at,
                expires_at = excluded.expires_at",
            params![
                candidate.resource.facility_id,
                candidate.resource.target_month,
                candidate.holder_id,
                candidate.holder_contact,
                candidate.operation.as_str(),
                candidate.acquired_at.to_rfc3339(),
                candidate.expires_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        Ok(Ok(grant))
    }

    /// Release the lease if `holder_id` holds it
    ///
    /// Returns `true` when the lease was deleted or was already gone, `false`
    /// when someone else holds it (nothing is changed).
    #[instrument(skip(self, resource), fields(resource = %resource))]
    pub fn release(&self, resource: &ResourceKey, holder_id: &str) -> Result<bool> {
        validate_resource(resource)?;
        require_non_empty("holder_id", holder_id)?;

        match self
            .try_release(resource, holder_id)
            .map_err(Error::LockOperation)?
        {
            Release::Absent => {
                debug!("Lease already released");
                Ok(true)
            }
            Release::Released => {
                info!("Lease released");
                Ok(true)
            }
            Release::HeldByOther { holder_id: held_by } => {
                warn!(%held_by, requested_by = holder_id, "Cannot release lease held by another holder");
                Ok(false)
            }
        }
    }

    fn try_release(
        &self,
        resource: &ResourceKey,
        holder_id: &str,
    ) -> std::result::Result<Release, SqlError> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let outcome = match select_lease(&tx, resource)? {
            None => Release::Absent,
            Some(existing) if !existing.is_held_by(holder_id) => Release::HeldByOther {
                holder_id: existing.holder_id,
            },
            Some(_) => {
                tx.execute(
                    "DELETE FROM leases WHERE facility_id = ?1 AND target_month = ?2 AND holder_id = ?3",
                    params![resource.facility_id, resource.target_month, holder_id],
                )?;
                Release::Released
            }
        };
        tx.commit()?;

        Ok(outcome)
    }

    /// Current valid lease on `resource`, if any
    pub fn inspect(&self, resource: &ResourceKey) -> Result<Option<Lease>> {
        self.inspect_at(resource, Utc::now())
    }

    /// `inspect` evaluated at an explicit instant; an expired lease reads as none
    #[instrument(skip(self, resource), fields(resource = %resource))]
    pub fn inspect_at(&self, resource: &ResourceKey, now: DateTime<Utc>) -> Result<Option<Lease>> {
        validate_resource(resource)?;

        let lease = select_lease(self.conn, resource).map_err(Error::LockOperation)?;
        Ok(lease.filter(|lease| {
            let expired = lease.is_expired_at(now);
            if expired {
                debug!(holder = %lease.holder_id, "Lease found but expired");
            }
            !expired
        }))
    }
}

fn select_lease(conn: &Connection, resource: &ResourceKey) -> std::result::Result<Option<Lease>, SqlError> {
    conn.query_row(
        &format!("SELECT {LEASE_COLUMNS} FROM leases WHERE facility_id = ?1 AND target_month = ?2"),
        params![resource.facility_id, resource.target_month],
        lease_from_row,
    )
    .optional()
}

fn lease_from_row(row: &Row<'_>) -> std::result::Result<Lease, SqlError> {
    Ok(Lease {
        resource: ResourceKey {
            facility_id: row.get(0)?,
            target_month: row.get(1)?,
        },
        holder_id: row.get(2)?,
        holder_contact: row.get(3)?,
        operation: parse_operation(4, &row.get::<_, String>(4)?)?,
        acquired_at: parse_datetime(5, &row.get::<_, String>(5)?)?,
        expires_at: parse_datetime(6, &row.get::<_, String>(6)?)?,
    })
}
