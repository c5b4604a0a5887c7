use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AutoAction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub id: Uuid,
    /// Document type this policy governs (exact, case-sensitive match).
    pub module_name: String,
    pub duration_months: u32,
    pub auto_action: AutoAction,
    pub is_enabled: bool,
}

/// Fields accepted when creating or editing a policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDraft {
    pub module_name: String,
    pub duration_months: u32,
    #[serde(default)]
    pub auto_action: AutoAction,
    #[serde(default = "enabled_by_default")]
    pub is_enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}
