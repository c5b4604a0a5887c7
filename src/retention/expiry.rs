use chrono::{Months, NaiveDate};

use crate::config::DEFAULT_RETENTION_MONTHS;
use crate::models::RetentionPolicy;

/// Retention months that apply under `policy`: the policy's duration when
/// it is enabled, otherwise the 5-year default.
pub fn effective_retention_months(policy: Option<&RetentionPolicy>) -> u32 {
    match policy {
        Some(p) if p.is_enabled => p.duration_months,
        _ => DEFAULT_RETENTION_MONTHS,
    }
}

/// `archive_date + months`, clamped to the last day of the target month
/// (Jan 31 + 1 month = Feb 28/29).
pub fn compute_retention_until(archive_date: NaiveDate, policy: Option<&RetentionPolicy>) -> NaiveDate {
    let months = effective_retention_months(policy);
    archive_date
        .checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}
