//! Audit events for vault operations.
//!
//! Every engine operation reports one event to the vault's
//! [`AuditLogger`]: the operation, the key (absent for bulk operations),
//! whether it succeeded, and the error message if it did not.
//!
//! Sinks are fire-and-forget: `log` returns nothing, and a sink that
//! cannot record an event silently drops it.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[cfg(feature = "audit-log")]
mod sqlite;

#[cfg(feature = "audit-log")]
pub use sqlite::{AuditEntry, SqliteAuditLog};

/// Auditable vault actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VaultOperation {
    Put,
    Get,
    Remove,
    Clear,
    Contains,
    Keys,
}

impl VaultOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Put => "PUT",
            Self::Get => "GET",
            Self::Remove => "REMOVE",
            Self::Clear => "CLEAR",
            Self::Contains => "CONTAINS",
            Self::Keys => "KEYS",
        }
    }

    /// Parse the upper-case name written by `as_str`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "PUT" => Some(Self::Put),
            "GET" => Some(Self::Get),
            "REMOVE" => Some(Self::Remove),
            "CLEAR" => Some(Self::Clear),
            "CONTAINS" => Some(Self::Contains),
            "KEYS" => Some(Self::Keys),
            _ => None,
        }
    }
}

impl fmt::Display for VaultOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver for audit events.  Must never fail back into the engine.
pub trait AuditLogger: Send + Sync {
    fn log(&self, operation: VaultOperation, key: Option<&str>, success: bool, error: Option<&str>);
}

/// Discards every event (the default sink).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAuditLogger;

impl AuditLogger for NoOpAuditLogger {
    fn log(&self, _: VaultOperation, _: Option<&str>, _: bool, _: Option<&str>) {}
}

/// Forwards events to `tracing` under the `vaultstore::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn log(&self, operation: VaultOperation, key: Option<&str>, success: bool, error: Option<&str>) {
        if success {
            tracing::info!(target: "vaultstore::audit", %operation, key, "vault operation");
        } else {
            tracing::warn!(
                target: "vaultstore::audit",
                %operation,
                key,
                error = error.unwrap_or("unknown"),
                "vault operation failed"
            );
        }
    }
}

/// A single recorded audit event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub operation: VaultOperation,
    pub key: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

/// Keeps every event in memory, oldest first.
#[derive(Debug, Default)]
pub struct RecordingAuditLogger {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Events recorded for one operation.
    pub fn events_for(&self, operation: VaultOperation) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.operation == operation)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl AuditLogger for RecordingAuditLogger {
    fn log(&self, operation: VaultOperation, key: Option<&str>, success: bool, error: Option<&str>) {
        self.events.lock().push(AuditEvent {
            timestamp: Utc::now(),
            operation,
            key: key.map(str::to_string),
            success,
            error: error.map(str::to_string),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_names_roundtrip() {
        for op in [
            VaultOperation::Put,
            VaultOperation::Get,
            VaultOperation::Remove,
            VaultOperation::Clear,
            VaultOperation::Contains,
            VaultOperation::Keys,
        ] {
            assert_eq!(VaultOperation::parse(op.as_str()), Some(op));
        }
        assert_eq!(VaultOperation::parse("put"), None);
    }

    #[test]
    fn recording_logger_keeps_order() {
        let logger = RecordingAuditLogger::new();
        logger.log(VaultOperation::Put, Some("a"), true, None);
        logger.log(VaultOperation::Clear, None, false, Some("disk full"));

        let events = logger.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].operation, VaultOperation::Put);
        assert_eq!(events[0].key.as_deref(), Some("a"));
        assert!(events[0].success);
        assert_eq!(events[1].key, None);
        assert_eq!(events[1].error.as_deref(), Some("disk full"));

        assert_eq!(logger.events_for(VaultOperation::Clear).len(), 1);

        logger.clear();
        assert!(logger.events().is_empty());
    }

    #[test]
    fn noop_and_tracing_loggers_accept_events() {
        NoOpAuditLogger.log(VaultOperation::Get, Some("k"), true, None);
        TracingAuditLogger.log(VaultOperation::Get, Some("k"), false, Some("boom"));
    }
}
