mod common;

use std::collections::HashMap;

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set};

use depot_tracker::entities::{device_status, prelude::*};
use depot_tracker::error::AppError;
use depot_tracker::services::disposition_rules::ScrapRequest;
use depot_tracker::services::flags;
use depot_tracker::services::intake::IntakeFlags;
use depot_tracker::services::status_store::{
    AtomicityMode, DeviceStatusView, Page, PageRequest, SortBy, StatusChange, StatusFilters,
    StatusLifecycleStore,
};
use depot_tracker::services::taxonomy::StatusTaxonomy;

use crate::common::{create_package, current, intake, serials, setup_test_db};

fn change(status: &str, sub_status: &str) -> StatusChange {
    StatusChange {
        status: status.to_string(),
        sub_status: sub_status.to_string(),
        note: None,
        box_id: None,
    }
}

fn boxed(box_id: &str, reason: &str) -> IntakeFlags {
    IntakeFlags {
        is_new_condition: false,
        scrap: Some(ScrapRequest {
            status: "Disposed".to_string(),
            sub_status: "Can-Am, Pending Pickup".to_string(),
            reason: Some(reason.to_string()),
            box_id: Some(box_id.to_string()),
        }),
    }
}

#[tokio::test]
async fn test_update_status_rolls_back_on_missing_receipt() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z1001").await;
    let r1 = intake(&db, package_id, &["ATOM1"], &IntakeFlags::default()).await.receipt_ids[0];

    let err = StatusLifecycleStore::new(&db, &taxonomy)
        .update_status(&[r1, r1 + 1000], &change("Processed", "Ready for Imaging"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let status = current(&db, "ATOM1").await;
    assert_eq!(status.status, "Intake");
    assert_eq!(status.version, 1);
}

#[tokio::test]
async fn test_update_status_stale_version_rolls_back_earlier_rows() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z1002").await;
    let ids = intake(&db, package_id, &["VER1", "VER2"], &IntakeFlags::default())
        .await
        .receipt_ids;

    let mut expected = HashMap::new();
    expected.insert(ids[0], 1);
    expected.insert(ids[1], 7);

    let err = StatusLifecycleStore::new(&db, &taxonomy)
        .update_status(&ids, &change("Processed", "Ready for Imaging"), Some(&expected))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // The first row was written inside the transaction, then rolled back
    let first = current(&db, "VER1").await;
    assert_eq!(first.status, "Intake");
    assert_eq!(first.version, 1);
}

#[tokio::test]
async fn test_update_status_bumps_version_and_sets_box() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z1003").await;
    let id = intake(&db, package_id, &["UPD1"], &IntakeFlags::default()).await.receipt_ids[0];

    let updated = StatusLifecycleStore::new(&db, &taxonomy)
        .update_status(
            &[id, id],
            &StatusChange {
                status: "Disposed".to_string(),
                sub_status: "Ingram, Pending Pickup".to_string(),
                note: Some("Failed diagnostics".to_string()),
                box_id: Some("box7".to_string()),
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(updated, vec![id]);

    let status = current(&db, "UPD1").await;
    assert_eq!(status.sub_status, "Ingram, Pending Pickup");
    assert_eq!(status.box_id.as_deref(), Some("BOX7"));
    assert_eq!(status.note.as_deref(), Some("Box ID: BOX7. Failed diagnostics"));
    assert_eq!(status.version, 2);
}

#[tokio::test]
async fn test_update_status_rejects_missing_box_and_unknown_pair() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z1004").await;
    let id = intake(&db, package_id, &["VAL1"], &IntakeFlags::default()).await.receipt_ids[0];
    let store = StatusLifecycleStore::new(&db, &taxonomy);

    let err = store
        .update_status(&[id], &change("Disposed", "Can-Am, Pending Pickup"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = store
        .update_status(&[id], &change("Processed", "Shipped"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = store
        .update_status(&[], &change("Processed", "Ready for Imaging"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_leaving_flag_status_clears_the_flag() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z1005").await;
    flags::flag(&db, "STOLEN1", Some("Reported stolen")).await.unwrap();

    let id = intake(&db, package_id, &["STOLEN1"], &IntakeFlags::default()).await.receipt_ids[0];
    assert_eq!(current(&db, "STOLEN1").await.status, "Flag!");

    StatusLifecycleStore::new(&db, &taxonomy)
        .update_status(&[id], &change("Triage & Repair", "Troubleshooting"), None)
        .await
        .unwrap();

    assert!(flags::get(&db, "STOLEN1").await.unwrap().is_none());
    let status = current(&db, "STOLEN1").await;
    assert_eq!(status.status, "Triage & Repair");
    assert!(!status.is_flagged);
}

#[tokio::test]
async fn test_bulk_update_partial_success() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z1006").await;
    intake(&db, package_id, &["ABC123"], &IntakeFlags::default()).await;

    let result = StatusLifecycleStore::new(&db, &taxonomy)
        .bulk_update_by_serial(
            &serials(&["ABC123", "NOTEXIST"]),
            &change("Processed", "Ready for Deployment"),
            AtomicityMode::PartialSuccess,
        )
        .await
        .unwrap();

    assert_eq!(result.updated, vec!["ABC123"]);
    assert_eq!(result.not_found, vec!["NOTEXIST"]);
    assert_eq!(current(&db, "ABC123").await.status, "Processed");
}

#[tokio::test]
async fn test_bulk_update_all_or_nothing() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z1007").await;
    intake(&db, package_id, &["ABC123"], &IntakeFlags::default()).await;

    let err = StatusLifecycleStore::new(&db, &taxonomy)
        .bulk_update_by_serial(
            &serials(&["ABC123", "NOTEXIST"]),
            &change("Processed", "Ready for Deployment"),
            AtomicityMode::AllOrNothing,
        )
        .await
        .unwrap_err();

    match err {
        AppError::NotFound(msg) => assert!(msg.contains("NOTEXIST")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(current(&db, "ABC123").await.status, "Intake");
}

#[tokio::test]
async fn test_bulk_update_targets_latest_receipt() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z1008").await;
    let old = intake(&db, package_id, &["TWICE"], &IntakeFlags::default()).await.receipt_ids[0];
    let new = intake(&db, package_id, &["TWICE"], &IntakeFlags::default()).await.receipt_ids[0];

    StatusLifecycleStore::new(&db, &taxonomy)
        .bulk_update_by_serial(
            &serials(&["TWICE"]),
            &change("Processed", "Ready for Imaging"),
            AtomicityMode::default(),
        )
        .await
        .unwrap();

    let rows = DeviceStatus::find()
        .filter(device_status::Column::ReceiptId.is_in([old, new]))
        .all(&db)
        .await
        .unwrap();
    let by_receipt: HashMap<i32, String> =
        rows.into_iter().map(|r| (r.receipt_id, r.sub_status)).collect();
    assert_eq!(by_receipt[&old], "In Evaluation");
    assert_eq!(by_receipt[&new], "Ready for Imaging");
}

#[tokio::test]
async fn test_bulk_move_only_moves_members_of_source_box() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z1009").await;
    intake(&db, package_id, &["S1"], &boxed("BOX1", "reason")).await;
    intake(&db, package_id, &["S2"], &boxed("BOX3", "other")).await;

    let result = StatusLifecycleStore::new(&db, &taxonomy)
        .bulk_move("box1", "BOX2", &serials(&["S1", "S2", "S404"]), AtomicityMode::PartialSuccess)
        .await
        .unwrap();

    assert_eq!(result.moved, vec!["S1"]);
    assert_eq!(result.not_found_or_failed, vec!["S2", "S404"]);

    let s1 = current(&db, "S1").await;
    assert_eq!(s1.note.as_deref(), Some("Box ID: BOX2. reason"));
    assert_eq!(s1.box_id.as_deref(), Some("BOX2"));
    assert_eq!(s1.version, 2);

    let s2 = current(&db, "S2").await;
    assert_eq!(s2.note.as_deref(), Some("Box ID: BOX3. other"));
}

#[tokio::test]
async fn test_bulk_move_all_or_nothing_and_validation() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z1010").await;
    intake(&db, package_id, &["M1"], &boxed("BOX1", "reason")).await;
    let store = StatusLifecycleStore::new(&db, &taxonomy);

    let err = store
        .bulk_move("BOX1", "BOX2", &serials(&["M1", "M404"]), AtomicityMode::AllOrNothing)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(current(&db, "M1").await.box_id.as_deref(), Some("BOX1"));

    let err = store
        .bulk_move("BOX1", " box1 ", &serials(&["M1"]), AtomicityMode::PartialSuccess)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_bulk_move_understands_legacy_notes() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z1011").await;
    let id = intake(&db, package_id, &["LEGACY1"], &IntakeFlags::default()).await.receipt_ids[0];

    let row = DeviceStatus::find()
        .filter(device_status::Column::ReceiptId.eq(id))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let mut active = row.into_active_model();
    active.status = Set("Disposed".to_string());
    active.sub_status = Set("Can-Am, Pending Pickup".to_string());
    active.note = Set(Some("Box ID: OLD7. Water damage".to_string()));
    active.update(&db).await.unwrap();

    let result = StatusLifecycleStore::new(&db, &taxonomy)
        .bulk_move("OLD7", "NEW7", &serials(&["LEGACY1"]), AtomicityMode::PartialSuccess)
        .await
        .unwrap();
    assert_eq!(result.moved, vec!["LEGACY1"]);

    let status = current(&db, "LEGACY1").await;
    assert_eq!(status.note.as_deref(), Some("Box ID: NEW7. Water damage"));
    assert_eq!(status.box_id.as_deref(), Some("NEW7"));
}

#[tokio::test]
async fn test_query_filters_and_pagination() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z1012").await;
    intake(&db, package_id, &["QRY-A1", "QRY-A2", "QRY-B1"], &IntakeFlags::default()).await;
    let b2 = intake(
        &db,
        package_id,
        &["QRY-B2"],
        &IntakeFlags {
            is_new_condition: true,
            scrap: None,
        },
    )
    .await;
    let store = StatusLifecycleStore::new(&db, &taxonomy);

    let page = store
        .query(&StatusFilters::default(), SortBy::LastUpdate, PageRequest { page: 0, page_size: 3 })
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.items.len(), 3);
    // Newest first
    assert_eq!(page.items[0].receipt_id, b2.receipt_ids[0]);

    let second = store
        .query(&StatusFilters::default(), SortBy::LastUpdate, PageRequest { page: 1, page_size: 3 })
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);

    let by_serial = store
        .query(
            &StatusFilters {
                serial: Some("-A".to_string()),
                ..Default::default()
            },
            SortBy::LastUpdate,
            PageRequest { page: 0, page_size: 10 },
        )
        .await
        .unwrap();
    assert_eq!(by_serial.total, 2);

    let by_status = store
        .query(
            &StatusFilters {
                status: Some("Processed".to_string()),
                category: Some("Laptop".to_string()),
                ..Default::default()
            },
            SortBy::Status,
            PageRequest { page: 0, page_size: 10 },
        )
        .await
        .unwrap();
    assert_eq!(by_status.total, 1);
    assert_eq!(by_status.items[0].serial_number, "QRY-B2");
    assert_eq!(by_status.items[0].make.as_deref(), Some("Dell"));

    let by_sort = store
        .query(&StatusFilters::default(), SortBy::Status, PageRequest { page: 0, page_size: 10 })
        .await
        .unwrap();
    assert_eq!(by_sort.items[0].status, "Intake");
    assert_eq!(by_sort.items[3].status, "Processed");

    let today = Utc::now().date_naive();
    let in_range = store
        .query(
            &StatusFilters {
                from_date: Some(today - Duration::days(1)),
                to_date: Some(today + Duration::days(1)),
                ..Default::default()
            },
            SortBy::LastUpdate,
            PageRequest { page: 0, page_size: 10 },
        )
        .await
        .unwrap();
    assert_eq!(in_range.total, 4);

    let past = store
        .query(
            &StatusFilters {
                to_date: Some(today - Duration::days(2)),
                ..Default::default()
            },
            SortBy::LastUpdate,
            PageRequest { page: 0, page_size: 10 },
        )
        .await
        .unwrap();
    assert_eq!(past.total, 0);
    assert!(past.items.is_empty());
}

#[tokio::test]
async fn test_serial_filter_matches_literal_text_ignoring_case() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z1014").await;
    intake(&db, package_id, &["AB1", "XY9", "LOT_7"], &IntakeFlags::default()).await;
    let store = StatusLifecycleStore::new(&db, &taxonomy);

    let search = |serial: &str| StatusFilters {
        serial: Some(serial.to_string()),
        ..Default::default()
    };
    let serials_for = |page: Page<DeviceStatusView>| -> Vec<String> {
        page.items.into_iter().map(|i| i.serial_number).collect()
    };
    let all = PageRequest { page: 0, page_size: 10 };

    let underscore = store.query(&search("A_1"), SortBy::LastUpdate, all).await.unwrap();
    assert_eq!(underscore.total, 0);

    let percent = store.query(&search("%"), SortBy::LastUpdate, all).await.unwrap();
    assert_eq!(percent.total, 0);

    let literal = store.query(&search("t_7"), SortBy::LastUpdate, all).await.unwrap();
    assert_eq!(serials_for(literal), vec!["LOT_7"]);

    let lower = store.query(&search("ab"), SortBy::LastUpdate, all).await.unwrap();
    assert_eq!(serials_for(lower), vec!["AB1"]);
}

#[tokio::test]
async fn test_page_far_past_the_end_is_rejected() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z1015").await;
    intake(&db, package_id, &["PG1", "PG2"], &IntakeFlags::default()).await;
    let store = StatusLifecycleStore::new(&db, &taxonomy);

    let err = store
        .query(
            &StatusFilters::default(),
            SortBy::LastUpdate,
            PageRequest {
                page: u64::MAX / 2,
                page_size: 200,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let empty = store
        .query(
            &StatusFilters::default(),
            SortBy::LastUpdate,
            PageRequest {
                page: 1_000_000,
                page_size: 200,
            },
        )
        .await
        .unwrap();
    assert_eq!(empty.total, 2);
    assert!(empty.items.is_empty());
}

#[tokio::test]
async fn test_history_lists_every_receipt() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z1013").await;
    intake(&db, package_id, &["HIST1"], &IntakeFlags::default()).await;
    intake(&db, package_id, &["HIST1"], &boxed("BOX5", "Dead battery")).await;

    let history = StatusLifecycleStore::new(&db, &taxonomy)
        .history("HIST1")
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status.as_deref(), Some("Disposed"));
    assert_eq!(history[1].status.as_deref(), Some("Intake"));
}
