use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{record_quietly, AuditEntry, AuditSink};
use crate::config::PAGE_SIZE;
use crate::db::{self, DatabaseError};
use crate::models::enums::RetentionStatus;
use crate::models::*;
use crate::storage::FileStore;

use super::{compute_retention_until, Clock, RetentionError};

const MAX_REASON_LEN: usize = 200;

/// Outcome of a successful restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreResult {
    pub archive_id: Uuid,
    pub target: ArchiveTarget,
    pub document_title: String,
}

/// What a permanent delete removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurgeReport {
    pub archive_id: Uuid,
    pub document_id: Uuid,
    pub document_deleted: bool,
    pub versions_removed: Vec<Uuid>,
    pub ledger_entries_removed: usize,
    pub files_removed: Vec<String>,
    /// Files whose rows are gone but which could not be removed from disk.
    pub files_failed: Vec<String>,
}

/// Archive listing page plus ledger-wide counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivePage {
    pub page: Page<ArchivedItem>,
    pub stats: ArchiveStats,
}

/// Lifecycle state of a document as seen through its flag and the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DocumentState {
    Active,
    Archived {
        archive_id: Uuid,
        retention_until: chrono::NaiveDate,
        status: RetentionStatus,
    },
}

/// Archive, restore and permanently delete documents and versions.
///
/// Every state transition runs in a single `BEGIN IMMEDIATE` transaction.
/// File removal happens only after the transaction commits.
pub struct ArchiveEngine<'a> {
    conn: &'a Connection,
    files: &'a dyn FileStore,
    audit: &'a dyn AuditSink,
    clock: &'a dyn Clock,
}

impl<'a> ArchiveEngine<'a> {
    pub fn new(
        conn: &'a Connection,
        files: &'a dyn FileStore,
        audit: &'a dyn AuditSink,
        clock: &'a dyn Clock,
    ) -> Self {
        Self { conn, files, audit, clock }
    }

    /// Archive a whole document under the retention policy for its type.
    pub fn archive_document(
        &self,
        document_id: &Uuid,
        reason: &str,
        actor: &ActingUser,
    ) -> Result<ArchiveRecord, RetentionError> {
        let reason = validate_reason(reason)?;
        let today = self.clock.today();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let document = db::get_document(&tx, document_id)?
            .ok_or_else(|| RetentionError::not_found("Document", document_id))?;
        if document.is_archived {
            return Err(already_archived("Document", document_id));
        }

        let policy = db::find_enabled_policy(&tx, &document.document_type)?;
        let record = ArchiveRecord {
            id: Uuid::new_v4(),
            target: ArchiveTarget::Document { document_id: *document_id },
            archived_by: actor.id.clone(),
            archived_by_name: actor.display_name.clone(),
            reason,
            archive_date: today,
            retention_until: compute_retention_until(today, policy.as_ref()),
        };

        db::insert_archive_record(&tx, &record)
            .map_err(|e| already_archived_or(e, "Document", document_id))?;
        db::set_document_archived(&tx, document_id, true)?;
        tx.commit()?;

        tracing::info!(
            document_id = %document_id,
            archive_id = %record.id,
            document_type = %document.document_type,
            policy = policy.as_ref().map(|p| p.module_name.as_str()).unwrap_or("default"),
            retention_until = %record.retention_until,
            "Document archived"
        );
        record_quietly(
            self.audit,
            AuditEntry::new(
                "Archive",
                "Document",
                document_id,
                format!(
                    "\"{}\" archived until {}: {}",
                    document.title, record.retention_until, record.reason
                ),
                actor,
            ),
        );
        Ok(record)
    }

    /// Archive one version; the document itself stays active.
    pub fn archive_version(
        &self,
        document_id: &Uuid,
        version_id: &Uuid,
        reason: &str,
        actor: &ActingUser,
    ) -> Result<ArchiveRecord, RetentionError> {
        let reason = validate_reason(reason)?;
        let today = self.clock.today();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let document = db::get_document(&tx, document_id)?
            .ok_or_else(|| RetentionError::not_found("Document", document_id))?;
        let version = db::get_version(&tx, version_id)?
            .filter(|v| v.document_id == *document_id)
            .ok_or_else(|| RetentionError::not_found("DocumentVersion", version_id))?;
        if document.is_archived {
            return Err(RetentionError::DocumentArchived(*document_id));
        }
        if db::get_version_archive_record(&tx, version_id)?.is_some() {
            return Err(already_archived("DocumentVersion", version_id));
        }
        let remaining = db::list_active_versions(&tx, document_id)?
            .iter()
            .filter(|v| v.id != *version_id)
            .count();
        if remaining == 0 {
            return Err(RetentionError::LastActiveVersion {
                document_id: *document_id,
                version_id: *version_id,
            });
        }

        let policy = db::find_enabled_policy(&tx, &document.document_type)?;
        let record = ArchiveRecord {
            id: Uuid::new_v4(),
            target: ArchiveTarget::Version {
                document_id: *document_id,
                version_id: *version_id,
            },
            archived_by: actor.id.clone(),
            archived_by_name: actor.display_name.clone(),
            reason,
            archive_date: today,
            retention_until: compute_retention_until(today, policy.as_ref()),
        };

        db::insert_archive_record(&tx, &record)
            .map_err(|e| already_archived_or(e, "DocumentVersion", version_id))?;
        tx.commit()?;

        tracing::info!(
            document_id = %document_id,
            version_id = %version_id,
            version = version.version_number,
            archive_id = %record.id,
            retention_until = %record.retention_until,
            "Version archived"
        );
        record_quietly(
            self.audit,
            AuditEntry::new(
                "ArchiveVersion",
                "DocumentVersion",
                version_id,
                format!(
                    "\"{}\" {} archived until {}: {}",
                    document.title,
                    version.label(),
                    record.retention_until,
                    record.reason
                ),
                actor,
            ),
        );
        Ok(record)
    }

    /// Undo an archive while retention is still running.
    pub fn restore(&self, archive_id: &Uuid, actor: &ActingUser) -> Result<RestoreResult, RetentionError> {
        let today = self.clock.today();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let record = db::get_archive_record(&tx, archive_id)?
            .ok_or_else(|| RetentionError::not_found("ArchiveRecord", archive_id))?;
        if !record.is_within_retention(today) {
            return Err(RetentionError::RetentionExpired {
                archive_id: *archive_id,
                retention_until: record.retention_until,
            });
        }

        let document_id = record.target.document_id();
        let document = db::get_document(&tx, &document_id)?.ok_or_else(|| {
            RetentionError::InconsistentState(format!(
                "archive {archive_id} references missing document {document_id}"
            ))
        })?;

        if record.target.is_document_level() {
            if !document.is_archived {
                return Err(RetentionError::InconsistentState(format!(
                    "document {document_id} is not flagged as archived"
                )));
            }
            db::set_document_archived(&tx, &document_id, false)?;
        }
        db::delete_archive_record(&tx, archive_id)?;
        tx.commit()?;

        let (entity_type, entity_id) = match record.target {
            ArchiveTarget::Document { document_id } => ("Document", document_id),
            ArchiveTarget::Version { version_id, .. } => ("DocumentVersion", version_id),
        };
        tracing::info!(
            archive_id = %archive_id,
            document_id = %document_id,
            entity_type,
            "Archive restored"
        );
        record_quietly(
            self.audit,
            AuditEntry::new(
                "Restore",
                entity_type,
                entity_id,
                format!("\"{}\" restored from archive {archive_id}", document.title),
                actor,
            ),
        );

        Ok(RestoreResult {
            archive_id: *archive_id,
            target: record.target,
            document_title: document.title,
        })
    }

    /// Purge an archived version or document once retention has expired.
    ///
    /// Row deletion (ledger → versions → document) commits first; stored
    /// files are then removed best-effort and failures are reported, not
    /// raised.
    pub fn permanent_delete(&self, archive_id: &Uuid, actor: &ActingUser) -> Result<PurgeReport, RetentionError> {
        let today = self.clock.today();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let record = db::get_archive_record(&tx, archive_id)?
            .ok_or_else(|| RetentionError::not_found("ArchiveRecord", archive_id))?;
        if record.is_within_retention(today) {
            return Err(RetentionError::RetentionNotExpired {
                archive_id: *archive_id,
                retention_until: record.retention_until,
            });
        }

        let document_id = record.target.document_id();
        let title = db::get_document(&tx, &document_id)?
            .map(|d| d.title)
            .unwrap_or_default();
        let mut report = PurgeReport {
            archive_id: *archive_id,
            document_id,
            ..Default::default()
        };
        let mut paths = Vec::new();

        match record.target {
            ArchiveTarget::Version { version_id, .. } => {
                let version = db::get_version(&tx, &version_id)?;
                db::delete_archive_record(&tx, archive_id)?;
                report.ledger_entries_removed = 1;
                if let Some(v) = version {
                    db::delete_version(&tx, &v.id)?;
                    report.versions_removed.push(v.id);
                    paths.push(v.file_path);
                }
            }
            ArchiveTarget::Document { .. } => {
                let versions = db::list_versions(&tx, &document_id)?;
                report.ledger_entries_removed = db::delete_archive_records_for_document(&tx, &document_id)?;
                db::delete_versions_for_document(&tx, &document_id)?;
                db::delete_document(&tx, &document_id)?;
                report.document_deleted = true;
                for v in versions {
                    report.versions_removed.push(v.id);
                    paths.push(v.file_path);
                }
            }
        }
        tx.commit()?;

        for path in paths {
            match self.files.delete(&path) {
                Ok(()) => report.files_removed.push(path),
                Err(e) => {
                    tracing::warn!(error = %e, path = %path, archive_id = %archive_id, "Stored file not removed");
                    report.files_failed.push(path);
                }
            }
        }

        tracing::info!(
            archive_id = %archive_id,
            document_id = %document_id,
            document_deleted = report.document_deleted,
            versions = report.versions_removed.len(),
            ledger_entries = report.ledger_entries_removed,
            files_failed = report.files_failed.len(),
            "Archive permanently deleted"
        );
        let (entity_type, entity_id) = match record.target {
            ArchiveTarget::Document { document_id } => ("Document", document_id),
            ArchiveTarget::Version { version_id, .. } => ("DocumentVersion", version_id),
        };
        record_quietly(
            self.audit,
            AuditEntry::new(
                "PermanentDelete",
                entity_type,
                entity_id,
                format!(
                    "\"{title}\" purged: {} version(s), {} file(s) removed",
                    report.versions_removed.len(),
                    report.files_removed.len()
                ),
                actor,
            ),
        );
        Ok(report)
    }

    /// One page of archived items with status derived from today's date.
    pub fn list_archived(&self, filter: &ArchiveFilter, page: u32) -> Result<ArchivePage, RetentionError> {
        let today = self.clock.today();
        let total_items = db::count_archived(self.conn, filter, today)?;
        let (page_number, total_pages) = Page::<ArchivedItem>::clamp(page, total_items, PAGE_SIZE);
        let items = db::list_archived(
            self.conn,
            filter,
            today,
            Page::<ArchivedItem>::offset(page_number, PAGE_SIZE),
            PAGE_SIZE,
        )?;
        let stats = db::archive_stats(self.conn, today)?;

        tracing::debug!(total_items, page_number, "Archive listing");
        Ok(ArchivePage {
            page: Page {
                items,
                page_number,
                total_pages,
                total_items,
            },
            stats,
        })
    }

    /// Current state of a document, cross-checking the flag against the ledger.
    pub fn document_state(&self, document_id: &Uuid) -> Result<DocumentState, RetentionError> {
        let document = db::get_document(self.conn, document_id)?
            .ok_or_else(|| RetentionError::not_found("Document", document_id))?;
        let record = db::get_document_archive_record(self.conn, document_id)?;

        match (document.is_archived, record) {
            (false, None) => Ok(DocumentState::Active),
            (true, Some(r)) => Ok(DocumentState::Archived {
                archive_id: r.id,
                retention_until: r.retention_until,
                status: r.status_on(self.clock.today()),
            }),
            (true, None) => Err(RetentionError::InconsistentState(format!(
                "document {document_id} is flagged archived without a ledger entry"
            ))),
            (false, Some(r)) => Err(RetentionError::InconsistentState(format!(
                "document {document_id} has ledger entry {} but is not flagged archived",
                r.id
            ))),
        }
    }
}

fn validate_reason(reason: &str) -> Result<String, RetentionError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(RetentionError::Validation("Archive reason is required.".into()));
    }
    if reason.chars().count() > MAX_REASON_LEN {
        return Err(RetentionError::Validation(format!(
            "Reason cannot exceed {MAX_REASON_LEN} characters."
        )));
    }
    Ok(reason.to_string())
}

fn already_archived(entity_type: &'static str, id: &Uuid) -> RetentionError {
    RetentionError::AlreadyArchived { entity_type, id: *id }
}

/// The partial unique indexes on the ledger turn a lost race into a
/// constraint violation.
fn already_archived_or(e: DatabaseError, entity_type: &'static str, id: &Uuid) -> RetentionError {
    if e.is_constraint_violation() {
        already_archived(entity_type, id)
    } else {
        RetentionError::Database(e)
    }
}
