use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::StatusFilter;
use crate::models::*;

use super::{parse_date, parse_uuid};

const RECORD_COLUMNS: &str =
    "a.id, a.document_id, a.version_id, a.archived_by, a.archived_by_name, a.reason, a.archive_date, a.retention_until";

pub fn insert_archive_record(conn: &Connection, record: &ArchiveRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO archive_records (id, document_id, version_id, archived_by, archived_by_name,
         reason, archive_date, retention_until)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.id.to_string(),
            record.target.document_id().to_string(),
            record.target.version_id().map(|id| id.to_string()),
            record.archived_by,
            record.archived_by_name,
            record.reason,
            record.archive_date.to_string(),
            record.retention_until.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_archive_record(conn: &Connection, id: &Uuid) -> Result<Option<ArchiveRecord>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM archive_records a WHERE a.id = ?1"),
            params![id.to_string()],
            read_record_row,
        )
        .optional()?;
    row.map(record_from_row).transpose()
}

/// The document-level archive record for a document, if archived.
pub fn get_document_archive_record(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Option<ArchiveRecord>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM archive_records a
                 WHERE a.document_id = ?1 AND a.version_id IS NULL"
            ),
            params![document_id.to_string()],
            read_record_row,
        )
        .optional()?;
    row.map(record_from_row).transpose()
}

pub fn get_version_archive_record(
    conn: &Connection,
    version_id: &Uuid,
) -> Result<Option<ArchiveRecord>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM archive_records a WHERE a.version_id = ?1"),
            params![version_id.to_string()],
            read_record_row,
        )
        .optional()?;
    row.map(record_from_row).transpose()
}

pub fn delete_archive_record(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let rows = conn.execute("DELETE FROM archive_records WHERE id = ?1", params![id.to_string()])?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "ArchiveRecord".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Remove every ledger entry (document- and version-level) for a document.
pub fn delete_archive_records_for_document(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<usize, DatabaseError> {
    let rows = conn.execute(
        "DELETE FROM archive_records WHERE document_id = ?1",
        params![document_id.to_string()],
    )?;
    Ok(rows)
}

/// Listing query shared by count and page fetch. `?1` = today,
/// `?2` = status filter, `?3` = lowercased search term or NULL. The term is
/// matched as a literal substring.
const LISTING_WHERE: &str = "
    FROM archive_records a
    JOIN documents d ON d.id = a.document_id
    JOIN patients p ON p.id = d.patient_id
    LEFT JOIN document_versions v ON v.id = a.version_id
    WHERE (?2 = 'All'
           OR (?2 = 'Active' AND a.retention_until >= ?1)
           OR (?2 = 'Expired' AND a.retention_until < ?1))
      AND (?3 IS NULL
           OR instr(fold_case(d.title), ?3) > 0
           OR instr(fold_case(a.reason), ?3) > 0
           OR instr(fold_case(a.archived_by_name), ?3) > 0)";

fn status_param(status: StatusFilter) -> &'static str {
    match status {
        StatusFilter::Active => "Active",
        StatusFilter::Expired => "Expired",
        StatusFilter::All => "All",
    }
}

pub fn count_archived(
    conn: &Connection,
    filter: &ArchiveFilter,
    today: NaiveDate,
) -> Result<u64, DatabaseError> {
    let term = filter.normalized_term();
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {LISTING_WHERE}"),
        params![today.to_string(), status_param(filter.status), term],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// One page of archived items, newest archive first. Status is derived
/// from `today` on every call.
pub fn list_archived(
    conn: &Connection,
    filter: &ArchiveFilter,
    today: NaiveDate,
    offset: u64,
    limit: u32,
) -> Result<Vec<ArchivedItem>, DatabaseError> {
    let term = filter.normalized_term();
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS}, d.title, d.document_type,
                p.first_name || ' ' || p.last_name, v.version_number
         {LISTING_WHERE}
         ORDER BY a.archive_date DESC, a.rowid DESC
         LIMIT ?4 OFFSET ?5"
    ))?;

    let rows = stmt.query_map(
        params![
            today.to_string(),
            status_param(filter.status),
            term,
            limit,
            offset as i64
        ],
        |row| {
            Ok((
                read_record_row(row)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, String>(10)?,
                row.get::<_, Option<u32>>(11)?,
            ))
        },
    )?;

    let mut items = Vec::new();
    for row in rows {
        let (record_row, document_title, document_type, patient_name, version_number) = row?;
        let record = record_from_row(record_row)?;
        let status = record.status_on(today);
        items.push(ArchivedItem {
            record,
            document_title,
            document_type,
            patient_name,
            version_number,
            status,
        });
    }
    Ok(items)
}

pub fn archive_stats(conn: &Connection, today: NaiveDate) -> Result<ArchiveStats, DatabaseError> {
    let (total, active): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN retention_until >= ?1 THEN 1 ELSE 0 END), 0)
         FROM archive_records",
        params![today.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(ArchiveStats {
        total: total as u64,
        active: active as u64,
        expired: (total - active) as u64,
    })
}

struct RecordRow {
    id: String,
    document_id: String,
    version_id: Option<String>,
    archived_by: String,
    archived_by_name: String,
    reason: String,
    archive_date: String,
    retention_until: String,
}

fn read_record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        document_id: row.get(1)?,
        version_id: row.get(2)?,
        archived_by: row.get(3)?,
        archived_by_name: row.get(4)?,
        reason: row.get(5)?,
        archive_date: row.get(6)?,
        retention_until: row.get(7)?,
    })
}

fn record_from_row(row: RecordRow) -> Result<ArchiveRecord, DatabaseError> {
    let document_id = parse_uuid("archive_records.document_id", &row.document_id)?;
    let target = match row.version_id {
        Some(v) => ArchiveTarget::Version {
            document_id,
            version_id: parse_uuid("archive_records.version_id", &v)?,
        },
        None => ArchiveTarget::Document { document_id },
    };
    Ok(ArchiveRecord {
        id: parse_uuid("archive_records.id", &row.id)?,
        target,
        archived_by: row.archived_by,
        archived_by_name: row.archived_by_name,
        reason: row.reason,
        archive_date: parse_date("archive_records.archive_date", &row.archive_date)?,
        retention_until: parse_date("archive_records.retention_until", &row.retention_until)?,
    })
}
