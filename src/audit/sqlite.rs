//! SQLite-backed audit sink.
//!
//! Stores a record of every vault operation in a local SQLite database
//! at `<dir>/audit.db`.
//!
//! Designed for graceful degradation: if the database can't be opened or
//! written to, vault operations silently continue without logging.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;

use super::{AuditLogger, VaultOperation};
use crate::errors::{Result, VaultError};

/// A single audit log row.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub vault: String,
    pub operation: VaultOperation,
    pub key_name: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

/// SQLite-backed audit log for one vault.
pub struct SqliteAuditLog {
    conn: Mutex<Connection>,
    vault: String,
}

impl SqliteAuditLog {
    /// Open (or create) the audit database at `<dir>/audit.db`.
    ///
    /// Returns `None` if the database can't be opened; callers should
    /// treat this as "audit logging unavailable" and continue normally.
    pub fn open(dir: &Path, vault: &str) -> Option<Self> {
        let db_path = Self::db_path(dir);
        let conn = Connection::open(&db_path).ok()?;

        // Set restrictive permissions on the audit database (owner-only).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&db_path, perms);
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT NOT NULL,
                vault       TEXT NOT NULL,
                operation   TEXT NOT NULL,
                key_name    TEXT,
                success     INTEGER NOT NULL,
                error       TEXT
            );",
        )
        .ok()?;

        Some(Self {
            conn: Mutex::new(conn),
            vault: vault.to_string(),
        })
    }

    /// Query recent audit entries for this vault.
    ///
    /// - `limit`: maximum number of entries to return (most recent first).
    /// - `since`: if provided, only return entries newer than this timestamp.
    pub fn query(&self, limit: usize, since: Option<DateTime<Utc>>) -> Result<Vec<AuditEntry>> {
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let since = since.map_or_else(String::new, |ts| ts.to_rfc3339());

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, timestamp, vault, operation, key_name, success, error
                 FROM audit_log
                 WHERE vault = ?1 AND timestamp >= ?2
                 ORDER BY id DESC
                 LIMIT ?3",
            )
            .map_err(|e| VaultError::Audit(format!("query prepare: {e}")))?;

        let rows = stmt
            .query_map(rusqlite::params![self.vault, since, limit_i64], |row| {
                let ts_str: String = row.get(1)?;
                let op_str: String = row.get(3)?;
                let operation = VaultOperation::parse(&op_str).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        format!("unknown audit operation {op_str:?}").into(),
                    )
                })?;
                let timestamp = DateTime::parse_from_rfc3339(&ts_str)
                    .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp,
                    vault: row.get(2)?,
                    operation,
                    key_name: row.get(4)?,
                    success: row.get(5)?,
                    error: row.get(6)?,
                })
            })
            .map_err(|e| VaultError::Audit(format!("query exec: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| VaultError::Audit(format!("row parse: {e}")))?);
        }

        Ok(entries)
    }

    /// Return the path to the audit database (for testing/display).
    pub fn db_path(dir: &Path) -> PathBuf {
        dir.join("audit.db")
    }
}

impl AuditLogger for SqliteAuditLog {
    /// Record an operation. Fire-and-forget: errors are dropped.
    fn log(&self, operation: VaultOperation, key: Option<&str>, success: bool, error: Option<&str>) {
        let now = Utc::now().to_rfc3339();
        let _ = self.conn.lock().execute(
            "INSERT INTO audit_log (timestamp, vault, operation, key_name, success, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![now, self.vault, operation.as_str(), key, success, error],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_database() {
        let dir = TempDir::new().unwrap();
        let audit = SqliteAuditLog::open(dir.path(), "v");
        assert!(audit.is_some(), "should open successfully");
        assert!(dir.path().join("audit.db").exists());
    }

    #[test]
    fn log_and_query_roundtrip() {
        let dir = TempDir::new().unwrap();
        let audit = SqliteAuditLog::open(dir.path(), "v").unwrap();

        audit.log(VaultOperation::Put, Some("token"), true, None);
        audit.log(VaultOperation::Get, Some("token"), true, None);
        audit.log(VaultOperation::Clear, None, false, Some("io"));

        let entries = audit.query(10, None).unwrap();
        assert_eq!(entries.len(), 3);

        // Most recent first.
        assert_eq!(entries[0].operation, VaultOperation::Clear);
        assert!(!entries[0].success);
        assert!(entries[0].key_name.is_none());
        assert_eq!(entries[0].error.as_deref(), Some("io"));
        assert_eq!(entries[1].operation, VaultOperation::Get);
        assert_eq!(entries[2].operation, VaultOperation::Put);
        assert_eq!(entries[2].key_name.as_deref(), Some("token"));
    }

    #[test]
    fn every_operation_reads_back_typed() {
        let dir = TempDir::new().unwrap();
        let audit = SqliteAuditLog::open(dir.path(), "v").unwrap();
        let all = [
            VaultOperation::Put,
            VaultOperation::Get,
            VaultOperation::Remove,
            VaultOperation::Clear,
            VaultOperation::Contains,
            VaultOperation::Keys,
        ];
        for op in all {
            audit.log(op, None, true, None);
        }

        let mut read: Vec<VaultOperation> =
            audit.query(10, None).unwrap().into_iter().map(|e| e.operation).collect();
        read.reverse();
        assert_eq!(read, all);
    }

    #[test]
    fn unknown_operation_row_is_an_audit_error() {
        let dir = TempDir::new().unwrap();
        let audit = SqliteAuditLog::open(dir.path(), "v").unwrap();
        audit
            .conn
            .lock()
            .execute(
                "INSERT INTO audit_log (timestamp, vault, operation, key_name, success, error)
                 VALUES (?1, 'v', 'EXPORT', NULL, 1, NULL)",
                rusqlite::params![Utc::now().to_rfc3339()],
            )
            .unwrap();

        assert!(matches!(audit.query(10, None), Err(VaultError::Audit(_))));
    }

    #[test]
    fn query_with_limit() {
        let dir = TempDir::new().unwrap();
        let audit = SqliteAuditLog::open(dir.path(), "v").unwrap();

        for i in 0..10 {
            audit.log(VaultOperation::Put, Some(&format!("KEY_{i}")), true, None);
        }

        let entries = audit.query(3, None).unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn query_with_since_filter() {
        let dir = TempDir::new().unwrap();
        let audit = SqliteAuditLog::open(dir.path(), "v").unwrap();

        audit.log(VaultOperation::Put, Some("KEY_1"), true, None);

        let past = Utc::now() - chrono::Duration::hours(1);
        let entries = audit.query(10, Some(past)).unwrap();
        assert_eq!(entries.len(), 1);

        let future = Utc::now() + chrono::Duration::hours(1);
        let entries = audit.query(10, Some(future)).unwrap();
        assert_eq!(entries.len(), 0);
    }

    #[test]
    fn query_is_scoped_to_vault() {
        let dir = TempDir::new().unwrap();
        let a = SqliteAuditLog::open(dir.path(), "a").unwrap();
        let b = SqliteAuditLog::open(dir.path(), "b").unwrap();

        a.log(VaultOperation::Put, Some("k"), true, None);
        b.log(VaultOperation::Put, Some("k"), true, None);
        b.log(VaultOperation::Remove, Some("k"), true, None);

        assert_eq!(a.query(10, None).unwrap().len(), 1);
        assert_eq!(b.query(10, None).unwrap().len(), 2);
    }

    #[test]
    fn open_returns_none_on_bad_path() {
        let result = SqliteAuditLog::open(Path::new("/nonexistent/path/that/does/not/exist"), "v");
        assert!(result.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn audit_db_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let _audit = SqliteAuditLog::open(dir.path(), "v").unwrap();

        let perms = std::fs::metadata(dir.path().join("audit.db"))
            .unwrap()
            .permissions();
        assert_eq!(
            perms.mode() & 0o777,
            0o600,
            "audit.db should have 0o600 permissions"
        );
    }
}
