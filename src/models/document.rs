use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub visited_at: NaiveDateTime,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub uploaded_by: String,
    pub title: String,
    /// Category string; retention policies are keyed on it verbatim.
    pub document_type: String,
    pub upload_date: NaiveDateTime,
    pub is_archived: bool,
}

/// One immutable upload of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub id: Uuid,
    pub document_id: Uuid,
    pub version_number: u32,
    /// Path relative to the storage root, `/`-separated.
    pub file_path: String,
    /// Hex SHA-256 of the stored bytes.
    pub content_hash: String,
    pub created_at: NaiveDateTime,
}

/// Compact row used when picking a document to archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub title: String,
    pub document_type: String,
    pub patient_name: String,
}

impl DocumentVersion {
    pub fn label(&self) -> String {
        format!("v{}.0", self.version_number)
    }
}
