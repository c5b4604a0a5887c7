//! Patient documents and their immutable versions.
//!
//! Uploads land in the [`FileStore`] first and the rows are written in one
//! immediate transaction; if the rows fail the stored file is discarded.
//! Archived documents accept no new versions.

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::audit::{record_quietly, AuditEntry, AuditSink};
use crate::config::ACTIVE_DOCUMENT_SEARCH_LIMIT;
use crate::db::{self, DatabaseError};
use crate::models::*;
use crate::storage::{allowed_extension, content_hash, version_path, FileStore, StorageError, ALLOWED_EXTENSIONS};

const MAX_TITLE_LEN: usize = 100;
const MAX_TYPE_LEN: usize = 50;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: &'static str, id: Uuid },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Document {0} is archived; restore it first")]
    DocumentArchived(Uuid),
}

impl From<rusqlite::Error> for DocumentError {
    fn from(e: rusqlite::Error) -> Self {
        DocumentError::Database(DatabaseError::Sqlite(e))
    }
}

/// A document with its active versions and the one selected for viewing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDetail {
    pub document: Document,
    pub patient_name: String,
    pub versions: Vec<DocumentVersion>,
    pub selected: Option<DocumentVersion>,
}

/// Result of re-hashing a stored version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionCheck {
    pub version_id: Uuid,
    pub expected_hash: String,
    pub actual_hash: String,
    pub intact: bool,
}

pub struct DocumentService<'a> {
    conn: &'a Connection,
    files: &'a dyn FileStore,
    audit: &'a dyn AuditSink,
}

impl<'a> DocumentService<'a> {
    pub fn new(conn: &'a Connection, files: &'a dyn FileStore, audit: &'a dyn AuditSink) -> Self {
        Self { conn, files, audit }
    }

    pub fn add_patient(
        &self,
        first_name: &str,
        last_name: &str,
        birth_date: NaiveDate,
        gender: &str,
    ) -> Result<Patient, DocumentError> {
        let first_name = required("First name", first_name, MAX_TITLE_LEN)?;
        let last_name = required("Last name", last_name, MAX_TITLE_LEN)?;
        let patient = Patient {
            id: Uuid::new_v4(),
            first_name,
            last_name,
            birth_date,
            gender: gender.trim().to_string(),
            visited_at: now(),
        };
        db::insert_patient(self.conn, &patient)?;
        tracing::info!(patient_id = %patient.id, "Patient added");
        Ok(patient)
    }

    /// Create a document together with its first version.
    pub fn add_document(
        &self,
        patient_id: &Uuid,
        title: &str,
        document_type: &str,
        file_name: &str,
        bytes: &[u8],
        uploaded_by: &ActingUser,
    ) -> Result<(Document, DocumentVersion), DocumentError> {
        let title = required("Title", title, MAX_TITLE_LEN)?;
        let document_type = required("Document type", document_type, MAX_TYPE_LEN)?;
        let extension = checked_extension(file_name)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if db::get_patient(&tx, patient_id)?.is_none() {
            return Err(DocumentError::NotFound {
                entity_type: "Patient",
                id: *patient_id,
            });
        }
        let document = Document {
            id: Uuid::new_v4(),
            patient_id: *patient_id,
            uploaded_by: uploaded_by.id.clone(),
            title,
            document_type,
            upload_date: now(),
            is_archived: false,
        };
        db::insert_document(&tx, &document)?;
        let version = self.store_version(tx, &document, &extension, bytes)?;

        tracing::info!(
            document_id = %document.id,
            patient_id = %patient_id,
            document_type = %document.document_type,
            bytes = bytes.len(),
            "Document uploaded"
        );
        record_quietly(
            self.audit,
            AuditEntry::new(
                "Upload",
                "Document",
                document.id,
                format!("\"{}\" uploaded as {}", document.title, version.label()),
                uploaded_by,
            ),
        );
        Ok((document, version))
    }

    /// Upload a new version. Numbers keep increasing even after purges.
    pub fn add_version(
        &self,
        document_id: &Uuid,
        file_name: &str,
        bytes: &[u8],
        actor: &ActingUser,
    ) -> Result<DocumentVersion, DocumentError> {
        let extension = checked_extension(file_name)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let document = self.require_document(&tx, document_id)?;
        if document.is_archived {
            return Err(DocumentError::DocumentArchived(*document_id));
        }
        let version = self.store_version(tx, &document, &extension, bytes)?;

        tracing::info!(
            document_id = %document_id,
            version = version.version_number,
            "Version uploaded"
        );
        record_quietly(
            self.audit,
            AuditEntry::new(
                "NewVersion",
                "Document",
                document_id,
                format!("\"{}\" {} uploaded", document.title, version.label()),
                actor,
            ),
        );
        Ok(version)
    }

    /// Edit title and type. Versions are untouched.
    pub fn update_metadata(
        &self,
        document_id: &Uuid,
        title: &str,
        document_type: &str,
        actor: &ActingUser,
    ) -> Result<Document, DocumentError> {
        let title = required("Title", title, MAX_TITLE_LEN)?;
        let document_type = required("Document type", document_type, MAX_TYPE_LEN)?;

        let mut document = self.require_document(self.conn, document_id)?;
        db::update_document_metadata(self.conn, document_id, &title, &document_type)?;
        document.title = title;
        document.document_type = document_type;

        record_quietly(
            self.audit,
            AuditEntry::new(
                "UpdateMetadata",
                "Document",
                document_id,
                format!("\"{}\" ({})", document.title, document.document_type),
                actor,
            ),
        );
        Ok(document)
    }

    pub fn active_versions(&self, document_id: &Uuid) -> Result<Vec<DocumentVersion>, DocumentError> {
        self.require_document(self.conn, document_id)?;
        Ok(db::list_active_versions(self.conn, document_id)?)
    }

    /// Document, its active versions, and the requested version (or the
    /// latest active one when none is requested or it is not active).
    pub fn document_detail(
        &self,
        document_id: &Uuid,
        version_id: Option<&Uuid>,
    ) -> Result<DocumentDetail, DocumentError> {
        let document = self.require_document(self.conn, document_id)?;
        let patient_name = db::get_patient(self.conn, &document.patient_id)?
            .map(|p| p.full_name())
            .unwrap_or_default();
        let versions = db::list_active_versions(self.conn, document_id)?;
        let selected = version_id
            .and_then(|id| versions.iter().find(|v| v.id == *id))
            .or_else(|| versions.first())
            .cloned();

        Ok(DocumentDetail {
            document,
            patient_name,
            versions,
            selected,
        })
    }

    /// Non-archived documents eligible as archive targets.
    pub fn search_active_documents(&self, term: Option<&str>) -> Result<Vec<DocumentSummary>, DocumentError> {
        let docs = db::search_active_documents(self.conn, term, ACTIVE_DOCUMENT_SEARCH_LIMIT)?;
        tracing::debug!(results = docs.len(), "Active document search");
        Ok(docs)
    }

    /// Re-hash the stored bytes and compare with the recorded digest.
    pub fn verify_version(&self, version_id: &Uuid) -> Result<VersionCheck, DocumentError> {
        let version = db::get_version(self.conn, version_id)?.ok_or(DocumentError::NotFound {
            entity_type: "DocumentVersion",
            id: *version_id,
        })?;
        let actual_hash = content_hash(&self.files.read(&version.file_path)?);
        let intact = actual_hash == version.content_hash;
        if !intact {
            tracing::warn!(
                version_id = %version_id,
                path = %version.file_path,
                "Stored version does not match its digest"
            );
        }
        Ok(VersionCheck {
            version_id: *version_id,
            expected_hash: version.content_hash,
            actual_hash,
            intact,
        })
    }

    fn require_document(&self, conn: &Connection, id: &Uuid) -> Result<Document, DocumentError> {
        db::get_document(conn, id)?.ok_or(DocumentError::NotFound {
            entity_type: "Document",
            id: *id,
        })
    }

    /// Allocate the next number, write the file, insert the row and commit.
    fn store_version(
        &self,
        tx: Transaction<'_>,
        document: &Document,
        extension: &str,
        bytes: &[u8],
    ) -> Result<DocumentVersion, DocumentError> {
        let version_number = db::allocate_version_number(&tx, &document.id)?;
        let file_path = version_path(&document.patient_id, &document.id, version_number, extension);
        self.files.save(&file_path, bytes)?;

        let version = DocumentVersion {
            id: Uuid::new_v4(),
            document_id: document.id,
            version_number,
            file_path,
            content_hash: content_hash(bytes),
            created_at: now(),
        };
        let written = db::insert_version(&tx, &version).and_then(|()| Ok(tx.commit()?));
        if let Err(e) = written {
            if let Err(cleanup) = self.files.delete(&version.file_path) {
                tracing::warn!(error = %cleanup, path = %version.file_path, "Orphaned upload not removed");
            }
            return Err(e.into());
        }
        Ok(version)
    }
}

fn required(field: &str, value: &str, max_len: usize) -> Result<String, DocumentError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DocumentError::Validation(format!("{field} is required.")));
    }
    if value.chars().count() > max_len {
        return Err(DocumentError::Validation(format!(
            "{field} cannot exceed {max_len} characters."
        )));
    }
    Ok(value.to_string())
}

fn checked_extension(file_name: &str) -> Result<String, DocumentError> {
    allowed_extension(file_name).ok_or_else(|| {
        DocumentError::Validation(format!(
            "Unsupported file type \"{file_name}\"; allowed: {}",
            ALLOWED_EXTENSIONS.join(", ")
        ))
    })
}

/// Local time truncated to whole seconds, matching the stored precision.
fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
