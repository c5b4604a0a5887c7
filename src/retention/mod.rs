//! Archive & retention lifecycle.
//!
//! Three parts:
//! 1. Retention policy store: per-document-type retention rules
//! 2. Expiry computation: pure `RetentionUntil` arithmetic
//! 3. Lifecycle engine: archive / restore / permanent-delete over the ledger
//!
//! ```text
//! Active ──archive──▶ Archived ──restore (retention_until >= today)──▶ Active
//!                        │
//!                        └──permanent delete (retention_until < today)──▶ Deleted
//! ```
//!
//! Documents and individual versions follow the same machine independently.

mod expiry;
mod lifecycle;
mod policy;

use chrono::{Local, NaiveDate};
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

pub use expiry::*;
pub use lifecycle::*;
pub use policy::*;

// ═══════════════════════════════════════════════════════════════════════════
// Error type
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum RetentionError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: &'static str, id: String },

    #[error("{entity_type} {id} is already archived")]
    AlreadyArchived { entity_type: &'static str, id: Uuid },

    #[error("A retention policy for \"{0}\" already exists")]
    DuplicateModule(String),

    #[error("Cannot restore archive {archive_id}: retention period expired on {retention_until}")]
    RetentionExpired { archive_id: Uuid, retention_until: NaiveDate },

    #[error("Cannot permanently delete archive {archive_id}: retention runs until {retention_until}")]
    RetentionNotExpired { archive_id: Uuid, retention_until: NaiveDate },

    #[error("Inconsistent archive state: {0}")]
    InconsistentState(String),

    #[error("Document {0} is archived; restore it first")]
    DocumentArchived(Uuid),

    #[error("Version {version_id} is the last active version of document {document_id}; archive the document instead")]
    LastActiveVersion { document_id: Uuid, version_id: Uuid },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<rusqlite::Error> for RetentionError {
    fn from(e: rusqlite::Error) -> Self {
        RetentionError::Database(DatabaseError::Sqlite(e))
    }
}

impl RetentionError {
    pub(crate) fn not_found(entity_type: &'static str, id: &Uuid) -> Self {
        RetentionError::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Clock
// ═══════════════════════════════════════════════════════════════════════════

/// Source of "today" for retention checks.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date.
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always returns the same date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
