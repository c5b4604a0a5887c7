use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::AutoAction;
use crate::models::RetentionPolicy;

use super::parse_uuid;

const POLICY_COLUMNS: &str = "id, module_name, duration_months, auto_action, is_enabled";

pub fn insert_policy(conn: &Connection, policy: &RetentionPolicy) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO retention_policies (id, module_name, duration_months, auto_action, is_enabled)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            policy.id.to_string(),
            policy.module_name,
            policy.duration_months,
            policy.auto_action.as_str(),
            policy.is_enabled as i32,
        ],
    )?;
    Ok(())
}

pub fn update_policy(conn: &Connection, policy: &RetentionPolicy) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE retention_policies
         SET module_name = ?2, duration_months = ?3, auto_action = ?4, is_enabled = ?5
         WHERE id = ?1",
        params![
            policy.id.to_string(),
            policy.module_name,
            policy.duration_months,
            policy.auto_action.as_str(),
            policy.is_enabled as i32,
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "RetentionPolicy".into(),
            id: policy.id.to_string(),
        });
    }
    Ok(())
}

pub fn get_policy(conn: &Connection, id: &Uuid) -> Result<Option<RetentionPolicy>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {POLICY_COLUMNS} FROM retention_policies WHERE id = ?1"),
            params![id.to_string()],
            read_policy_row,
        )
        .optional()?;
    row.map(policy_from_row).transpose()
}

/// The enabled policy for a document type, if any. Exact, case-sensitive match.
pub fn find_enabled_policy(
    conn: &Connection,
    module_name: &str,
) -> Result<Option<RetentionPolicy>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {POLICY_COLUMNS} FROM retention_policies
                 WHERE is_enabled = 1 AND module_name = ?1
                 LIMIT 1"
            ),
            params![module_name],
            read_policy_row,
        )
        .optional()?;
    row.map(policy_from_row).transpose()
}

/// Whether a policy other than `except` already uses `module_name`.
pub fn module_name_taken(
    conn: &Connection,
    module_name: &str,
    except: Option<&Uuid>,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM retention_policies
         WHERE module_name = ?1 AND (?2 IS NULL OR id != ?2)",
        params![module_name, except.map(|id| id.to_string())],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn count_policies(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM retention_policies", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Policies ordered by module name.
pub fn list_policies(
    conn: &Connection,
    offset: u64,
    limit: u32,
) -> Result<Vec<RetentionPolicy>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POLICY_COLUMNS} FROM retention_policies
         ORDER BY module_name ASC
         LIMIT ?1 OFFSET ?2"
    ))?;
    let rows = stmt.query_map(params![limit, offset as i64], read_policy_row)?;
    let mut policies = Vec::new();
    for row in rows {
        policies.push(policy_from_row(row?)?);
    }
    Ok(policies)
}

type PolicyRow = (String, String, u32, String, i32);

fn read_policy_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PolicyRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn policy_from_row(row: PolicyRow) -> Result<RetentionPolicy, DatabaseError> {
    let (id, module_name, duration_months, auto_action, is_enabled) = row;
    Ok(RetentionPolicy {
        id: parse_uuid("retention_policies.id", &id)?,
        module_name,
        duration_months,
        auto_action: AutoAction::from_str(&auto_action)?,
        is_enabled: is_enabled != 0,
    })
}
