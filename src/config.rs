use std::path::{Path, PathBuf};

/// Application-level constants
pub const APP_NAME: &str = "CPMS";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Rows per page for archive and policy listings.
pub const PAGE_SIZE: u32 = 10;

/// Retention applied when no enabled policy matches a document type (5 years).
pub const DEFAULT_RETENTION_MONTHS: u32 = 60;

/// Maximum rows returned when searching documents eligible for archiving.
pub const ACTIVE_DOCUMENT_SEARCH_LIMIT: u32 = 50;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "CPMS_DATA_DIR";

/// Get the application data directory.
/// `$CPMS_DATA_DIR` if set, otherwise ~/CPMS/ (falls back to ./CPMS
/// when no home directory can be determined).
pub fn app_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Path of the SQLite database file.
pub fn database_path() -> PathBuf {
    database_file(&app_data_dir())
}

/// Root directory for stored version files.
pub fn storage_root() -> PathBuf {
    storage_dir(&app_data_dir())
}

pub fn database_file(data_dir: &Path) -> PathBuf {
    data_dir.join("cpms.db")
}

pub fn storage_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("files")
}

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "cpms=info,warn"
}
