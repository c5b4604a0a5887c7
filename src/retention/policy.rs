use rusqlite::{Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

use crate::audit::{record_quietly, AuditEntry, AuditSink};
use crate::config::PAGE_SIZE;
use crate::db;
use crate::models::{ActingUser, Page, PolicyDraft, RetentionPolicy};

use super::RetentionError;

const MAX_MODULE_NAME_LEN: usize = 100;
const MIN_DURATION_MONTHS: u32 = 1;
const MAX_DURATION_MONTHS: u32 = 1200;

/// Administrator-managed retention rules, one per document type.
pub struct PolicyStore<'a> {
    conn: &'a Connection,
    audit: &'a dyn AuditSink,
}

impl<'a> PolicyStore<'a> {
    pub fn new(conn: &'a Connection, audit: &'a dyn AuditSink) -> Self {
        Self { conn, audit }
    }

    /// The enabled policy whose module name exactly matches `document_type`.
    pub fn resolve_policy(&self, document_type: &str) -> Result<Option<RetentionPolicy>, RetentionError> {
        Ok(db::find_enabled_policy(self.conn, document_type)?)
    }

    pub fn get_policy(&self, id: &Uuid) -> Result<RetentionPolicy, RetentionError> {
        db::get_policy(self.conn, id)?.ok_or_else(|| RetentionError::not_found("RetentionPolicy", id))
    }

    pub fn create_policy(
        &self,
        draft: &PolicyDraft,
        actor: &ActingUser,
    ) -> Result<RetentionPolicy, RetentionError> {
        let module_name = validate_draft(draft)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if db::module_name_taken(&tx, &module_name, None)? {
            return Err(RetentionError::DuplicateModule(module_name));
        }

        let policy = RetentionPolicy {
            id: Uuid::new_v4(),
            module_name,
            duration_months: draft.duration_months,
            auto_action: draft.auto_action,
            is_enabled: draft.is_enabled,
        };
        db::insert_policy(&tx, &policy).map_err(|e| duplicate_or(e, &policy.module_name))?;
        tx.commit()?;

        tracing::info!(
            policy_id = %policy.id,
            module = %policy.module_name,
            months = policy.duration_months,
            "Retention policy created"
        );
        record_quietly(
            self.audit,
            AuditEntry::new(
                "CreatePolicy",
                "RetentionPolicy",
                policy.id,
                describe(&policy),
                actor,
            ),
        );
        Ok(policy)
    }

    pub fn update_policy(
        &self,
        id: &Uuid,
        draft: &PolicyDraft,
        actor: &ActingUser,
    ) -> Result<RetentionPolicy, RetentionError> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if db::get_policy(&tx, id)?.is_none() {
            return Err(RetentionError::not_found("RetentionPolicy", id));
        }
        let module_name = validate_draft(draft)?;
        if db::module_name_taken(&tx, &module_name, Some(id))? {
            return Err(RetentionError::DuplicateModule(module_name));
        }

        let policy = RetentionPolicy {
            id: *id,
            module_name,
            duration_months: draft.duration_months,
            auto_action: draft.auto_action,
            is_enabled: draft.is_enabled,
        };
        db::update_policy(&tx, &policy).map_err(|e| duplicate_or(e, &policy.module_name))?;
        tx.commit()?;

        tracing::info!(policy_id = %policy.id, module = %policy.module_name, "Retention policy updated");
        record_quietly(
            self.audit,
            AuditEntry::new("UpdatePolicy", "RetentionPolicy", policy.id, describe(&policy), actor),
        );
        Ok(policy)
    }

    /// Flip the enabled flag.
    pub fn toggle_enabled(&self, id: &Uuid, actor: &ActingUser) -> Result<RetentionPolicy, RetentionError> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut policy = db::get_policy(&tx, id)?
            .ok_or_else(|| RetentionError::not_found("RetentionPolicy", id))?;
        policy.is_enabled = !policy.is_enabled;
        db::update_policy(&tx, &policy)?;
        tx.commit()?;

        let state = if policy.is_enabled { "enabled" } else { "disabled" };
        tracing::info!(policy_id = %policy.id, module = %policy.module_name, state, "Retention policy toggled");
        record_quietly(
            self.audit,
            AuditEntry::new(
                "TogglePolicy",
                "RetentionPolicy",
                policy.id,
                format!("\"{}\" {state}", policy.module_name),
                actor,
            ),
        );
        Ok(policy)
    }

    /// Policies ordered by module name, `PAGE_SIZE` per page.
    pub fn list_policies(&self, page: u32) -> Result<Page<RetentionPolicy>, RetentionError> {
        let total_items = db::count_policies(self.conn)?;
        let (page_number, total_pages) = Page::<RetentionPolicy>::clamp(page, total_items, PAGE_SIZE);
        let items = db::list_policies(
            self.conn,
            Page::<RetentionPolicy>::offset(page_number, PAGE_SIZE),
            PAGE_SIZE,
        )?;
        Ok(Page {
            items,
            page_number,
            total_pages,
            total_items,
        })
    }
}

/// Returns the trimmed module name when the draft is acceptable.
fn validate_draft(draft: &PolicyDraft) -> Result<String, RetentionError> {
    let module_name = draft.module_name.trim();
    if module_name.is_empty() {
        return Err(RetentionError::Validation("Module name is required.".into()));
    }
    if module_name.chars().count() > MAX_MODULE_NAME_LEN {
        return Err(RetentionError::Validation(format!(
            "Module name cannot exceed {MAX_MODULE_NAME_LEN} characters."
        )));
    }
    if !(MIN_DURATION_MONTHS..=MAX_DURATION_MONTHS).contains(&draft.duration_months) {
        return Err(RetentionError::Validation(format!(
            "Duration must be between {MIN_DURATION_MONTHS} and {MAX_DURATION_MONTHS} months."
        )));
    }
    Ok(module_name.to_string())
}

/// A UNIQUE violation on module_name means another writer got there first.
fn duplicate_or(e: db::DatabaseError, module_name: &str) -> RetentionError {
    if e.is_constraint_violation() {
        RetentionError::DuplicateModule(module_name.to_string())
    } else {
        RetentionError::Database(e)
    }
}

fn describe(policy: &RetentionPolicy) -> String {
    format!(
        "\"{}\": {} months, {}, {}",
        policy.module_name,
        policy.duration_months,
        policy.auto_action,
        if policy.is_enabled { "enabled" } else { "disabled" }
    )
}
