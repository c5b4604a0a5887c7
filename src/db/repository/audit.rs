use rusqlite::{params, Connection};

use crate::audit::AuditEntry;
use crate::db::DatabaseError;

use super::{format_datetime, parse_datetime};

/// Append one entry to the audit_log table. Entries are never updated.
pub fn insert_audit_entry(conn: &Connection, entry: &AuditEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (action, entity_type, entity_id, details, user_id, user_name, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.action,
            entry.entity_type,
            entry.entity_id,
            entry.details,
            entry.user_id,
            entry.user_name,
            format_datetime(&entry.timestamp),
        ],
    )?;
    Ok(())
}

/// Audit entries for one entity, oldest first.
pub fn query_audit_by_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT action, entity_type, entity_id, details, user_id, user_name, timestamp
         FROM audit_log
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![entity_type, entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(action, entity_type, entity_id, details, user_id, user_name, timestamp)| {
            Ok(AuditEntry {
                action,
                entity_type,
                entity_id,
                details,
                user_id,
                user_name,
                timestamp: parse_datetime("audit_log.timestamp", &timestamp)?,
            })
        })
        .collect()
}
