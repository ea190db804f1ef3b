mod common;

use chrono::NaiveDate;

use depot_tracker::error::AppError;
use depot_tracker::services::disposition_rules::{self, MelMatchKind};
use depot_tracker::services::flags;
use depot_tracker::services::intake::IntakeFlags;
use depot_tracker::services::packages::{self, NewPackage};
use depot_tracker::services::status_store::{StatusChange, StatusLifecycleStore};
use depot_tracker::services::taxonomy::StatusTaxonomy;

use crate::common::{create_package, intake, seed_mel_rule, setup_test_db};

#[tokio::test]
async fn test_package_tracking_number_is_unique() {
    let db = setup_test_db().await.unwrap();
    create_package(&db, "1Z3001").await;

    let duplicate = NewPackage {
        tracking_number: " 1Z3001 ".to_string(),
        first_name: None,
        last_name: None,
        city: None,
        state: None,
        zip_code: None,
        receive_date: NaiveDate::from_ymd_opt(2026, 10, 2).unwrap(),
    };
    let err = packages::create(&db, &duplicate).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let blank = NewPackage {
        tracking_number: "  ".to_string(),
        ..duplicate
    };
    assert!(matches!(
        packages::create(&db, &blank).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn test_package_state_is_uppercased() {
    let db = setup_test_db().await.unwrap();
    let id = create_package(&db, "1Z3002").await;

    let package = packages::find(&db, id).await.unwrap();
    assert_eq!(package.state.as_deref(), Some("MI"));
    assert!(matches!(
        packages::find(&db, id + 100).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_asset_count_skips_deleted_and_moved_receipts() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let first = create_package(&db, "1Z3003").await;
    let second = create_package(&db, "1Z3004").await;

    let ids = intake(&db, first, &["P1", "P2", "P3"], &IntakeFlags::default())
        .await
        .receipt_ids;
    // P3 was received again in another package
    intake(&db, second, &["P3"], &IntakeFlags::default()).await;

    StatusLifecycleStore::new(&db, &taxonomy)
        .update_status(
            &[ids[1]],
            &StatusChange {
                status: "Disposed".to_string(),
                sub_status: "Deleted (Mistake)".to_string(),
                note: Some("Entry deleted by user.".to_string()),
                box_id: None,
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(packages::asset_count(&db, first).await.unwrap(), 1);
    assert_eq!(packages::asset_count(&db, second).await.unwrap(), 1);
}

#[tokio::test]
async fn test_flag_upsert_and_unflag() {
    let db = setup_test_db().await.unwrap();

    let record = flags::flag(&db, "F1", Some("Lost")).await.unwrap();
    assert!(!record.prevents_auto_removal);

    let record = flags::flag(&db, "F1", Some("[NOREMOVE] Legal hold")).await.unwrap();
    assert!(record.prevents_auto_removal);
    assert_eq!(flags::list(&db).await.unwrap().len(), 1);

    assert!(flags::unflag(&db, "F1").await.unwrap());
    assert!(!flags::unflag(&db, "F1").await.unwrap());
    assert!(flags::get(&db, "F1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_mel_lookup_prefers_model_number() {
    let db = setup_test_db().await.unwrap();
    seed_mel_rule(&db, None, Some("Latitude 5400"), "Keep").await;
    let by_model = seed_mel_rule(&db, Some("5400"), None, "Dispose").await;

    let found = disposition_rules::find_mel_rule(&db, Some("5400"), Some("Latitude 5400"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.rule.id, by_model.id);
    assert_eq!(found.matched_on, MelMatchKind::ModelNumber);
    assert!(found.suggested_scrap().is_some());

    let by_description = disposition_rules::find_mel_rule(&db, Some("9999"), Some("Latitude 5400"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_description.matched_on, MelMatchKind::Description);
    assert!(by_description.suggested_scrap().is_none());

    assert!(disposition_rules::find_mel_rule(&db, None, Some("  "))
        .await
        .unwrap()
        .is_none());
}
