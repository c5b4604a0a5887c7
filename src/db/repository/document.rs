use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::filters::normalize_term;
use crate::models::*;

use super::{format_datetime, parse_date, parse_datetime, parse_uuid};

// ═══════════════════════════════════════════
// Patients
// ═══════════════════════════════════════════

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, first_name, last_name, birth_date, gender, visited_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            patient.id.to_string(),
            patient.first_name,
            patient.last_name,
            patient.birth_date.to_string(),
            patient.gender,
            format_datetime(&patient.visited_at),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, first_name, last_name, birth_date, gender, visited_at
             FROM patients WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, first_name, last_name, birth_date, gender, visited_at)| {
        Ok(Patient {
            id: parse_uuid("patients.id", &id)?,
            first_name,
            last_name,
            birth_date: parse_date("patients.birth_date", &birth_date)?,
            gender,
            visited_at: parse_datetime("patients.visited_at", &visited_at)?,
        })
    })
    .transpose()
}

// ═══════════════════════════════════════════
// Documents
// ═══════════════════════════════════════════

const DOCUMENT_COLUMNS: &str =
    "id, patient_id, uploaded_by, title, document_type, upload_date, is_archived";

pub fn insert_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (id, patient_id, uploaded_by, title, document_type, upload_date, is_archived)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            doc.id.to_string(),
            doc.patient_id.to_string(),
            doc.uploaded_by,
            doc.title,
            doc.document_type,
            format_datetime(&doc.upload_date),
            doc.is_archived as i32,
        ],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &Uuid) -> Result<Option<Document>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
            params![id.to_string()],
            read_document_row,
        )
        .optional()?;
    row.map(document_from_row).transpose()
}

/// Update title and category. Versions are untouched.
pub fn update_document_metadata(
    conn: &Connection,
    id: &Uuid,
    title: &str,
    document_type: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE documents SET title = ?2, document_type = ?3 WHERE id = ?1",
        params![id.to_string(), title, document_type],
    )?;
    if rows == 0 {
        return Err(not_found("Document", id));
    }
    Ok(())
}

pub fn set_document_archived(
    conn: &Connection,
    id: &Uuid,
    archived: bool,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE documents SET is_archived = ?2 WHERE id = ?1",
        params![id.to_string(), archived as i32],
    )?;
    if rows == 0 {
        return Err(not_found("Document", id));
    }
    Ok(())
}

pub fn delete_document(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let rows = conn.execute("DELETE FROM documents WHERE id = ?1", params![id.to_string()])?;
    if rows == 0 {
        return Err(not_found("Document", id));
    }
    Ok(())
}

/// Non-archived documents, newest first, optionally matching a title or
/// patient name (case-insensitive).
pub fn search_active_documents(
    conn: &Connection,
    term: Option<&str>,
    limit: u32,
) -> Result<Vec<DocumentSummary>, DatabaseError> {
    let term = normalize_term(term);
    let mut stmt = conn.prepare(
        "SELECT d.id, d.title, d.document_type, p.first_name || ' ' || p.last_name
         FROM documents d
         JOIN patients p ON p.id = d.patient_id
         WHERE d.is_archived = 0
           AND (?1 IS NULL
                OR instr(fold_case(d.title), ?1) > 0
                OR instr(fold_case(p.first_name), ?1) > 0
                OR instr(fold_case(p.last_name), ?1) > 0)
         ORDER BY d.upload_date DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![term, limit], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut docs = Vec::new();
    for row in rows {
        let (id, title, document_type, patient_name) = row?;
        docs.push(DocumentSummary {
            id: parse_uuid("documents.id", &id)?,
            title,
            document_type,
            patient_name,
        });
    }
    Ok(docs)
}

/// Reserve the next version number for a document.
///
/// Numbers come from a per-document high-water mark, so a purged
/// version's number is never handed out again.
pub fn allocate_version_number(conn: &Connection, document_id: &Uuid) -> Result<u32, DatabaseError> {
    let rows = conn.execute(
        "UPDATE documents SET last_version_number = last_version_number + 1 WHERE id = ?1",
        params![document_id.to_string()],
    )?;
    if rows == 0 {
        return Err(not_found("Document", document_id));
    }
    let next: u32 = conn.query_row(
        "SELECT last_version_number FROM documents WHERE id = ?1",
        params![document_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(next)
}

// ═══════════════════════════════════════════
// Versions
// ═══════════════════════════════════════════

const VERSION_COLUMNS: &str =
    "v.id, v.document_id, v.version_number, v.file_path, v.content_hash, v.created_at";

pub fn insert_version(conn: &Connection, version: &DocumentVersion) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO document_versions (id, document_id, version_number, file_path, content_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            version.id.to_string(),
            version.document_id.to_string(),
            version.version_number,
            version.file_path,
            version.content_hash,
            format_datetime(&version.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_version(conn: &Connection, id: &Uuid) -> Result<Option<DocumentVersion>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {VERSION_COLUMNS} FROM document_versions v WHERE v.id = ?1"),
            params![id.to_string()],
            read_version_row,
        )
        .optional()?;
    row.map(version_from_row).transpose()
}

/// All versions of a document, newest first.
pub fn list_versions(conn: &Connection, document_id: &Uuid) -> Result<Vec<DocumentVersion>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VERSION_COLUMNS} FROM document_versions v
         WHERE v.document_id = ?1
         ORDER BY v.version_number DESC"
    ))?;
    let rows = stmt.query_map(params![document_id.to_string()], read_version_row)?;
    let mut versions = Vec::new();
    for row in rows {
        versions.push(version_from_row(row?)?);
    }
    Ok(versions)
}

/// Versions of a document without a version-level archive, newest first.
pub fn list_active_versions(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<DocumentVersion>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VERSION_COLUMNS} FROM document_versions v
         WHERE v.document_id = ?1
           AND NOT EXISTS (SELECT 1 FROM archive_records a WHERE a.version_id = v.id)
         ORDER BY v.version_number DESC"
    ))?;
    let rows = stmt.query_map(params![document_id.to_string()], read_version_row)?;
    let mut versions = Vec::new();
    for row in rows {
        versions.push(version_from_row(row?)?);
    }
    Ok(versions)
}

pub fn delete_version(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "DELETE FROM document_versions WHERE id = ?1",
        params![id.to_string()],
    )?;
    if rows == 0 {
        return Err(not_found("DocumentVersion", id));
    }
    Ok(())
}

pub fn delete_versions_for_document(conn: &Connection, document_id: &Uuid) -> Result<usize, DatabaseError> {
    let rows = conn.execute(
        "DELETE FROM document_versions WHERE document_id = ?1",
        params![document_id.to_string()],
    )?;
    Ok(rows)
}

// Internal row types

type DocumentRow = (String, String, String, String, String, String, i32);

fn read_document_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn document_from_row(row: DocumentRow) -> Result<Document, DatabaseError> {
    let (id, patient_id, uploaded_by, title, document_type, upload_date, is_archived) = row;
    Ok(Document {
        id: parse_uuid("documents.id", &id)?,
        patient_id: parse_uuid("documents.patient_id", &patient_id)?,
        uploaded_by,
        title,
        document_type,
        upload_date: parse_datetime("documents.upload_date", &upload_date)?,
        is_archived: is_archived != 0,
    })
}

struct VersionRow {
    id: String,
    document_id: String,
    version_number: u32,
    file_path: String,
    content_hash: String,
    created_at: String,
}

fn read_version_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionRow> {
    Ok(VersionRow {
        id: row.get(0)?,
        document_id: row.get(1)?,
        version_number: row.get(2)?,
        file_path: row.get(3)?,
        content_hash: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn version_from_row(row: VersionRow) -> Result<DocumentVersion, DatabaseError> {
    Ok(DocumentVersion {
        id: parse_uuid("document_versions.id", &row.id)?,
        document_id: parse_uuid("document_versions.document_id", &row.document_id)?,
        version_number: row.version_number,
        file_path: row.file_path,
        content_hash: row.content_hash,
        created_at: parse_datetime("document_versions.created_at", &row.created_at)?,
    })
}

fn not_found(entity_type: &str, id: &Uuid) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: entity_type.into(),
        id: id.to_string(),
    }
}
