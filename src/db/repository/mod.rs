//! Repository layer: entity-scoped database operations.
//!
//! Plain functions over a borrowed `Connection`; callers own transaction
//! boundaries. All public functions are re-exported here.

mod archive;
mod audit;
mod document;
mod retention_policy;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use super::DatabaseError;

pub use archive::*;
pub use audit::*;
pub use document::*;
pub use retention_policy::*;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub(crate) fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn parse_datetime(field: &str, s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .map_err(|_| invalid(field, s))
}

pub(crate) fn parse_date(field: &str, s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| invalid(field, s))
}

pub(crate) fn parse_uuid(field: &str, s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|_| invalid(field, s))
}

fn invalid(field: &str, value: &str) -> DatabaseError {
    DatabaseError::InvalidValue {
        field: field.into(),
        value: value.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::{AutoAction, StatusFilter};
    use crate::models::*;
    use rusqlite::Connection;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_patient(conn: &Connection, first: &str, last: &str) -> Uuid {
        let id = Uuid::new_v4();
        insert_patient(conn, &Patient {
            id,
            first_name: first.into(),
            last_name: last.into(),
            birth_date: date(1980, 3, 2),
            gender: "Female".into(),
            visited_at: ts("2026-01-10 09:00:00"),
        }).unwrap();
        id
    }

    fn make_document(conn: &Connection, patient_id: Uuid, title: &str, doc_type: &str, uploaded: &str) -> Uuid {
        let id = Uuid::new_v4();
        insert_document(conn, &Document {
            id,
            patient_id,
            uploaded_by: "staff-1".into(),
            title: title.into(),
            document_type: doc_type.into(),
            upload_date: ts(uploaded),
            is_archived: false,
        }).unwrap();
        id
    }

    fn make_version(conn: &Connection, document_id: Uuid) -> DocumentVersion {
        let number = allocate_version_number(conn, &document_id).unwrap();
        let version = DocumentVersion {
            id: Uuid::new_v4(),
            document_id,
            version_number: number,
            file_path: format!("uploads/documents/p/{document_id}/v{number}.pdf"),
            content_hash: "00".repeat(32),
            created_at: ts("2026-01-10 10:00:00"),
        };
        insert_version(conn, &version).unwrap();
        version
    }

    fn archive(conn: &Connection, target: ArchiveTarget, reason: &str, until: NaiveDate) -> ArchiveRecord {
        let record = ArchiveRecord {
            id: Uuid::new_v4(),
            target,
            archived_by: "admin-1".into(),
            archived_by_name: "Rosa Diaz".into(),
            reason: reason.into(),
            archive_date: date(2026, 1, 15),
            retention_until: until,
        };
        insert_archive_record(conn, &record).unwrap();
        record
    }

    #[test]
    fn patient_insert_and_retrieve() {
        let conn = test_db();
        let id = make_patient(&conn, "Maria", "Santos");
        let p = get_patient(&conn, &id).unwrap().unwrap();
        assert_eq!(p.full_name(), "Maria Santos");
        assert_eq!(p.birth_date, date(1980, 3, 2));
        assert!(get_patient(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn document_insert_update_and_archive_flag() {
        let conn = test_db();
        let pid = make_patient(&conn, "Maria", "Santos");
        let did = make_document(&conn, pid, "CBC Panel", "Lab Reports", "2026-01-10 10:00:00");

        update_document_metadata(&conn, &did, "CBC Panel (rev)", "Lab Reports").unwrap();
        set_document_archived(&conn, &did, true).unwrap();

        let doc = get_document(&conn, &did).unwrap().unwrap();
        assert_eq!(doc.title, "CBC Panel (rev)");
        assert!(doc.is_archived);
    }

    #[test]
    fn archive_flag_on_missing_document_is_not_found() {
        let conn = test_db();
        let err = set_document_archived(&conn, &Uuid::new_v4(), true).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn version_numbers_are_monotonic_and_not_reused() {
        let conn = test_db();
        let pid = make_patient(&conn, "Maria", "Santos");
        let did = make_document(&conn, pid, "X-ray", "Imaging Reports", "2026-01-10 10:00:00");

        let v1 = make_version(&conn, did);
        let v2 = make_version(&conn, did);
        assert_eq!((v1.version_number, v2.version_number), (1, 2));

        delete_version(&conn, &v2.id).unwrap();
        let v3 = make_version(&conn, did);
        assert_eq!(v3.version_number, 3);

        let numbers: Vec<u32> = list_versions(&conn, &did).unwrap().iter().map(|v| v.version_number).collect();
        assert_eq!(numbers, vec![3, 1]);
    }

    #[test]
    fn duplicate_version_number_rejected() {
        let conn = test_db();
        let pid = make_patient(&conn, "Maria", "Santos");
        let did = make_document(&conn, pid, "X-ray", "Imaging Reports", "2026-01-10 10:00:00");
        let v1 = make_version(&conn, did);

        let dup = DocumentVersion { id: Uuid::new_v4(), ..v1 };
        let err = insert_version(&conn, &dup).unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn active_versions_exclude_version_archives() {
        let conn = test_db();
        let pid = make_patient(&conn, "Maria", "Santos");
        let did = make_document(&conn, pid, "X-ray", "Imaging Reports", "2026-01-10 10:00:00");
        let _v1 = make_version(&conn, did);
        let v2 = make_version(&conn, did);

        archive(&conn, ArchiveTarget::Version { document_id: did, version_id: v2.id }, "Blurry scan", date(2031, 1, 15));

        let active: Vec<u32> = list_active_versions(&conn, &did).unwrap().iter().map(|v| v.version_number).collect();
        assert_eq!(active, vec![1]);
        assert_eq!(list_versions(&conn, &did).unwrap().len(), 2);
    }

    #[test]
    fn one_document_level_record_per_document() {
        let conn = test_db();
        let pid = make_patient(&conn, "Maria", "Santos");
        let did = make_document(&conn, pid, "X-ray", "Imaging Reports", "2026-01-10 10:00:00");
        archive(&conn, ArchiveTarget::Document { document_id: did }, "Closed case", date(2031, 1, 15));

        let second = ArchiveRecord {
            id: Uuid::new_v4(),
            target: ArchiveTarget::Document { document_id: did },
            archived_by: "admin-2".into(),
            archived_by_name: "Ben Ito".into(),
            reason: "Again".into(),
            archive_date: date(2026, 1, 16),
            retention_until: date(2031, 1, 16),
        };
        let err = insert_archive_record(&conn, &second).unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn one_record_per_version_but_many_per_document() {
        let conn = test_db();
        let pid = make_patient(&conn, "Maria", "Santos");
        let did = make_document(&conn, pid, "X-ray", "Imaging Reports", "2026-01-10 10:00:00");
        let v1 = make_version(&conn, did);
        let v2 = make_version(&conn, did);
        archive(&conn, ArchiveTarget::Version { document_id: did, version_id: v1.id }, "Old", date(2031, 1, 15));
        archive(&conn, ArchiveTarget::Version { document_id: did, version_id: v2.id }, "Old", date(2031, 1, 15));

        let again = ArchiveRecord {
            id: Uuid::new_v4(),
            target: ArchiveTarget::Version { document_id: did, version_id: v1.id },
            archived_by: "admin-1".into(),
            archived_by_name: "Rosa Diaz".into(),
            reason: "Again".into(),
            archive_date: date(2026, 1, 16),
            retention_until: date(2031, 1, 16),
        };
        assert!(insert_archive_record(&conn, &again).unwrap_err().is_constraint_violation());
        assert!(get_version_archive_record(&conn, &v2.id).unwrap().is_some());
        assert!(get_document_archive_record(&conn, &did).unwrap().is_none());
    }

    #[test]
    fn archive_record_round_trip_preserves_target() {
        let conn = test_db();
        let pid = make_patient(&conn, "Maria", "Santos");
        let did = make_document(&conn, pid, "X-ray", "Imaging Reports", "2026-01-10 10:00:00");
        let v1 = make_version(&conn, did);
        let stored = archive(&conn, ArchiveTarget::Version { document_id: did, version_id: v1.id }, "Old", date(2031, 1, 15));

        let loaded = get_archive_record(&conn, &stored.id).unwrap().unwrap();
        assert_eq!(loaded, stored);
    }

    #[test]
    fn listing_filters_by_status_and_term() {
        let conn = test_db();
        let pid = make_patient(&conn, "Maria", "Santos");
        let d1 = make_document(&conn, pid, "CBC Panel", "Lab Reports", "2026-01-10 10:00:00");
        let d2 = make_document(&conn, pid, "Chest X-ray", "Imaging Reports", "2026-01-11 10:00:00");
        archive(&conn, ArchiveTarget::Document { document_id: d1 }, "Superseded", date(2026, 3, 1));
        archive(&conn, ArchiveTarget::Document { document_id: d2 }, "Closed case", date(2031, 1, 15));

        let today = date(2026, 6, 1);
        let expired = ArchiveFilter { status: StatusFilter::Expired, ..Default::default() };
        let items = list_archived(&conn, &expired, today, 0, 10).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].document_title, "CBC Panel");
        assert_eq!(items[0].status, crate::models::enums::RetentionStatus::Expired);

        let by_reason = ArchiveFilter { search_term: Some("CLOSED".into()), ..Default::default() };
        assert_eq!(count_archived(&conn, &by_reason, today).unwrap(), 1);

        let by_user = ArchiveFilter { search_term: Some("rosa".into()), ..Default::default() };
        assert_eq!(count_archived(&conn, &by_user, today).unwrap(), 2);

        let stats = archive_stats(&conn, today).unwrap();
        assert_eq!(stats, ArchiveStats { total: 2, active: 1, expired: 1 });
    }

    #[test]
    fn listing_search_is_literal_and_unicode_case_insensitive() {
        let conn = test_db();
        let pid = make_patient(&conn, "Maria", "Santos");
        let d1 = make_document(&conn, pid, "CBC panel", "Lab Reports", "2026-01-10 10:00:00");
        let d2 = make_document(&conn, pid, "Lipid panel", "Lab Reports", "2026-01-11 10:00:00");
        let d3 = make_document(&conn, pid, "ÉCHO CARDIAQUE 100%", "Imaging Reports", "2026-01-12 10:00:00");
        archive(&conn, ArchiveTarget::Document { document_id: d1 }, "Routine", date(2027, 1, 15));
        archive(&conn, ArchiveTarget::Document { document_id: d2 }, "Routine", date(2027, 1, 15));
        archive(&conn, ArchiveTarget::Document { document_id: d3 }, "Routine", date(2027, 1, 15));

        let today = date(2026, 6, 1);
        let count = |term: &str| {
            let filter = ArchiveFilter { search_term: Some(term.into()), ..Default::default() };
            count_archived(&conn, &filter, today).unwrap()
        };
        assert_eq!(count("_"), 0);
        assert_eq!(count("c_c"), 0);
        assert_eq!(count("%"), 1);
        assert_eq!(count("100%"), 1);
        assert_eq!(count("écho"), 1);
        assert_eq!(count("panel"), 2);
    }

    #[test]
    fn document_search_is_literal_and_unicode_case_insensitive() {
        let conn = test_db();
        let pid = make_patient(&conn, "MARÍA", "NÚÑEZ");
        make_document(&conn, pid, "CBC panel", "Lab Reports", "2026-01-10 10:00:00");
        make_document(&conn, pid, "Lipid panel", "Lab Reports", "2026-01-11 10:00:00");

        assert_eq!(search_active_documents(&conn, Some("maría"), 50).unwrap().len(), 2);
        assert_eq!(search_active_documents(&conn, Some("núñez"), 50).unwrap().len(), 2);
        assert!(search_active_documents(&conn, Some("_"), 50).unwrap().is_empty());
        assert!(search_active_documents(&conn, Some("%"), 50).unwrap().is_empty());
        assert!(search_active_documents(&conn, Some("c_c"), 50).unwrap().is_empty());
    }

    #[test]
    fn purge_helpers_remove_all_rows_for_document() {
        let conn = test_db();
        let pid = make_patient(&conn, "Maria", "Santos");
        let did = make_document(&conn, pid, "X-ray", "Imaging Reports", "2026-01-10 10:00:00");
        let v1 = make_version(&conn, did);
        make_version(&conn, did);
        archive(&conn, ArchiveTarget::Version { document_id: did, version_id: v1.id }, "Old", date(2026, 2, 1));
        archive(&conn, ArchiveTarget::Document { document_id: did }, "Closed", date(2026, 2, 1));

        assert_eq!(delete_archive_records_for_document(&conn, &did).unwrap(), 2);
        assert_eq!(delete_versions_for_document(&conn, &did).unwrap(), 2);
        delete_document(&conn, &did).unwrap();
        assert!(get_document(&conn, &did).unwrap().is_none());
    }

    #[test]
    fn search_active_documents_skips_archived() {
        let conn = test_db();
        let pid = make_patient(&conn, "Maria", "Santos");
        let d1 = make_document(&conn, pid, "CBC Panel", "Lab Reports", "2026-01-10 10:00:00");
        let d2 = make_document(&conn, pid, "Lipid Panel", "Lab Reports", "2026-01-12 10:00:00");
        set_document_archived(&conn, &d1, true).unwrap();

        let found = search_active_documents(&conn, Some("panel"), 50).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, d2);
        assert_eq!(found[0].patient_name, "Maria Santos");

        let by_patient = search_active_documents(&conn, Some("santos"), 50).unwrap();
        assert_eq!(by_patient.len(), 1);
    }

    #[test]
    fn policy_crud_and_enabled_lookup() {
        let conn = test_db();
        let policy = RetentionPolicy {
            id: Uuid::new_v4(),
            module_name: "Lab Reports".into(),
            duration_months: 12,
            auto_action: AutoAction::NotifyAdmin,
            is_enabled: true,
        };
        insert_policy(&conn, &policy).unwrap();

        assert_eq!(find_enabled_policy(&conn, "Lab Reports").unwrap(), Some(policy.clone()));
        assert!(find_enabled_policy(&conn, "lab reports").unwrap().is_none());
        assert!(module_name_taken(&conn, "Lab Reports", None).unwrap());
        assert!(!module_name_taken(&conn, "Lab Reports", Some(&policy.id)).unwrap());

        update_policy(&conn, &RetentionPolicy { is_enabled: false, ..policy.clone() }).unwrap();
        assert!(find_enabled_policy(&conn, "Lab Reports").unwrap().is_none());
        assert_eq!(count_policies(&conn).unwrap(), 1);
    }

    #[test]
    fn policies_listed_by_module_name() {
        let conn = test_db();
        for name in ["Others", "Imaging Reports", "Lab Reports"] {
            insert_policy(&conn, &RetentionPolicy {
                id: Uuid::new_v4(),
                module_name: name.into(),
                duration_months: 24,
                auto_action: AutoAction::ManualReview,
                is_enabled: true,
            }).unwrap();
        }
        let names: Vec<String> = list_policies(&conn, 0, 10).unwrap().into_iter().map(|p| p.module_name).collect();
        assert_eq!(names, vec!["Imaging Reports", "Lab Reports", "Others"]);
        assert_eq!(list_policies(&conn, 2, 10).unwrap().len(), 1);
    }
}
