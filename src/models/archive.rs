use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::RetentionStatus;

/// What an archive record covers: a whole document, or one of its versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ArchiveTarget {
    Document { document_id: Uuid },
    Version { document_id: Uuid, version_id: Uuid },
}

impl ArchiveTarget {
    pub fn document_id(&self) -> Uuid {
        match self {
            Self::Document { document_id } | Self::Version { document_id, .. } => *document_id,
        }
    }

    pub fn version_id(&self) -> Option<Uuid> {
        match self {
            Self::Document { .. } => None,
            Self::Version { version_id, .. } => Some(*version_id),
        }
    }

    pub fn is_document_level(&self) -> bool {
        matches!(self, Self::Document { .. })
    }
}

/// The user performing a lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingUser {
    pub id: String,
    pub display_name: String,
}

impl ActingUser {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Ledger entry for one archive action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub id: Uuid,
    pub target: ArchiveTarget,
    pub archived_by: String,
    pub archived_by_name: String,
    pub reason: String,
    pub archive_date: NaiveDate,
    pub retention_until: NaiveDate,
}

impl ArchiveRecord {
    /// Restore is allowed through the last retention day inclusive.
    pub fn is_within_retention(&self, today: NaiveDate) -> bool {
        self.retention_until >= today
    }

    pub fn status_on(&self, today: NaiveDate) -> RetentionStatus {
        if self.is_within_retention(today) {
            RetentionStatus::Active
        } else {
            RetentionStatus::Expired
        }
    }
}

/// Listing row: a ledger entry joined with its document and patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedItem {
    pub record: ArchiveRecord,
    pub document_title: String,
    pub document_type: String,
    pub patient_name: String,
    /// Set for version-level archives.
    pub version_number: Option<u32>,
    pub status: RetentionStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub total: u64,
    pub active: u64,
    pub expired: u64,
}
