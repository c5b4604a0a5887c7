//! Insert-only audit trail for lifecycle and policy changes.
//!
//! Recording is fire-and-forget from the caller's point of view: a sink
//! failure is logged and never fails the operation that produced it.

use chrono::{Local, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{self, DatabaseError};
use crate::models::ActingUser;

/// A single audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: String,
    pub user_id: String,
    pub user_name: String,
    pub timestamp: NaiveDateTime,
}

impl AuditEntry {
    pub fn new(
        action: &str,
        entity_type: &str,
        entity_id: impl ToString,
        details: impl Into<String>,
        user: &ActingUser,
    ) -> Self {
        Self {
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.to_string(),
            details: details.into(),
            user_id: user.id.clone(),
            user_name: user.display_name.clone(),
            timestamp: Local::now().naive_local(),
        }
    }
}

/// Destination for audit entries.
pub trait AuditSink {
    fn record(&self, entry: &AuditEntry) -> Result<(), DatabaseError>;
}

/// Writes entries to the `audit_log` table.
pub struct SqliteAuditSink<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteAuditSink<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl AuditSink for SqliteAuditSink<'_> {
    fn record(&self, entry: &AuditEntry) -> Result<(), DatabaseError> {
        db::insert_audit_entry(self.conn, entry)
    }
}

/// Discards everything.
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _entry: &AuditEntry) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Record an entry, logging and swallowing any sink failure.
pub fn record_quietly(sink: &dyn AuditSink, entry: AuditEntry) {
    if let Err(e) = sink.record(&entry) {
        tracing::warn!(
            error = %e,
            action = %entry.action,
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            "Audit entry dropped"
        );
    }
}
