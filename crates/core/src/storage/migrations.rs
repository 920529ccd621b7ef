//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- One lease per (facility, month); expiry is checked lazily on acquire
            CREATE TABLE IF NOT EXISTS leases (
                facility_id TEXT NOT NULL,
                target_month TEXT NOT NULL,
                holder_id TEXT NOT NULL,
                holder_contact TEXT,
                operation TEXT NOT NULL,
                acquired_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                PRIMARY KEY (facility_id, target_month)
            );

            -- Schedule documents
            CREATE TABLE IF NOT EXISTS schedules (
                id TEXT PRIMARY KEY,
                facility_id TEXT NOT NULL,
                target_month TEXT NOT NULL,
                staff_schedules TEXT NOT NULL,
                version INTEGER NOT NULL CHECK (version >= 1),
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                created_by TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                updated_by TEXT NOT NULL
            );

            -- Confirmation snapshots, keyed by the pre-confirm version
            CREATE TABLE IF NOT EXISTS schedule_versions (
                schedule_id TEXT NOT NULL,
                version_number INTEGER NOT NULL,
                target_month TEXT NOT NULL,
                staff_schedules TEXT NOT NULL,
                created_at TEXT NOT NULL,
                created_by TEXT NOT NULL,
                change_description TEXT NOT NULL,
                previous_version INTEGER NOT NULL,
                PRIMARY KEY (schedule_id, version_number),
                FOREIGN KEY (schedule_id) REFERENCES schedules(id)
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes for month lookups",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_schedules_facility_month
                ON schedules(facility_id, target_month, created_at);
            CREATE INDEX IF NOT EXISTS idx_schedules_status ON schedules(status);
        "#,
    },
    Migration {
        version: 3,
        description: "Make schedule snapshots append-only",
        sql: r#"
            -- Snapshots are history; neither rewritten nor removed
            CREATE TRIGGER IF NOT EXISTS schedule_versions_no_update
                BEFORE UPDATE ON schedule_versions
            BEGIN
                SELECT RAISE(ABORT, 'schedule versions are immutable');
            END;

            CREATE TRIGGER IF NOT EXISTS schedule_versions_no_delete
                BEFORE DELETE ON schedule_versions
            BEGIN
                SELECT RAISE(ABORT, 'schedule versions are immutable');
            END;
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .unwrap_or(None);
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations
///
/// The whole run holds the write lock, so two connections opening the same
/// file at once cannot apply a migration twice.
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    init_migrations_table(conn)?;

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let current_version = get_current_version(&tx)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            tx.execute_batch(migration.sql)?;
            record_migration(&tx, migration)?;

            info!(version = migration.version, "Migration complete");
        }
    }

    let new_version = get_current_version(&tx)?;
    tx.commit()?;

    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Get the latest migration version (test helper)
    fn latest_version() -> u32 {
        MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
    }

    #[test]
    fn test_migrations_run() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run twice
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_snapshots_are_append_only() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute_batch(
            "INSERT INTO schedules VALUES ('s1', 'f1', '2025-11', '[]', 1, 'draft', 't', 'u', 't', 'u');
             INSERT INTO schedule_versions VALUES ('s1', 1, '2025-11', '[]', 't', 'u', 'Confirmed', 0);",
        )
        .unwrap();

        assert!(conn
            .execute("UPDATE schedule_versions SET change_description = 'edited'", [])
            .is_err());
        assert!(conn.execute("DELETE FROM schedule_versions", []).is_err());

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM schedule_versions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_migrations_sequential() {
        // Verify migrations are numbered sequentially
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(
                migration.version as usize,
                i + 1,
                "Migration {} should have version {}",
                migration.description,
                i + 1
            );
        }
    }
}
