use serde::{Deserialize, Serialize};

use super::enums::StatusFilter;

#[derive(Debug, Default, Clone)]
pub struct ArchiveFilter {
    /// Case-insensitive substring over title, reason and archiving user.
    pub search_term: Option<String>,
    pub status: StatusFilter,
}

impl ArchiveFilter {
    /// Lowercased, trimmed search term; `None` when blank.
    pub fn normalized_term(&self) -> Option<String> {
        normalize_term(self.search_term.as_deref())
    }
}

pub(crate) fn normalize_term(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// A single page of results with clamped numbering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

impl<T> Page<T> {
    /// Clamp a requested page into `[1, max(1, total_pages)]`.
    pub fn clamp(requested: u32, total_items: u64, page_size: u32) -> (u32, u32) {
        let total_pages = total_items.div_ceil(page_size as u64) as u32;
        let page = requested.max(1).min(total_pages.max(1));
        (page, total_pages)
    }

    /// Row offset for a clamped page number.
    pub fn offset(page_number: u32, page_size: u32) -> u64 {
        (page_number.saturating_sub(1) as u64) * page_size as u64
    }
}
