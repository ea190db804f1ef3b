mod common;

use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set};

use depot_tracker::entities::{device_status, prelude::*};
use depot_tracker::error::AppError;
use depot_tracker::services::box_index::{self, BoxLocationIndex, REMOVED_FROM_BOX_NOTE};
use depot_tracker::services::disposition_rules::ScrapRequest;
use depot_tracker::services::intake::IntakeFlags;
use depot_tracker::services::taxonomy::StatusTaxonomy;

use crate::common::{create_package, current, intake, serials, setup_test_db};

fn boxed(box_id: &str) -> IntakeFlags {
    IntakeFlags {
        is_new_condition: false,
        scrap: Some(ScrapRequest {
            status: "Disposed".to_string(),
            sub_status: "Can-Am, Pending Pickup".to_string(),
            reason: Some("EOL".to_string()),
            box_id: Some(box_id.to_string()),
        }),
    }
}

#[tokio::test]
async fn test_summaries_count_current_receipts_only() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z2001").await;

    intake(&db, package_id, &["B1", "B2"], &boxed("BOX-A")).await;
    intake(&db, package_id, &["B3"], &boxed("BOX-B")).await;
    // B2 comes back and is no longer in a box
    intake(&db, package_id, &["B2"], &IntakeFlags::default()).await;

    let index = BoxLocationIndex::new(&db, &taxonomy);
    let summaries = index.summaries(None).await.unwrap();
    let counts: Vec<(&str, i64)> = summaries
        .iter()
        .map(|s| (s.box_id.as_str(), s.item_count))
        .collect();
    assert_eq!(counts, vec![("BOX-A", 1), ("BOX-B", 1)]);

    let searched = index.summaries(Some("-b")).await.unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].box_id, "BOX-B");
}

#[tokio::test]
async fn test_contents_lists_members() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z2002").await;
    intake(&db, package_id, &["C2", "C1"], &boxed("BOX9")).await;

    let contents = BoxLocationIndex::new(&db, &taxonomy)
        .contents(" box9 ")
        .await
        .unwrap();
    let members: Vec<&str> = contents.iter().map(|c| c.serial_number.as_str()).collect();
    assert_eq!(members, vec!["C1", "C2"]);
    assert_eq!(contents[0].status, "Disposed");
}

#[tokio::test]
async fn test_update_box_status_keeps_devices_in_box() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z2003").await;
    intake(&db, package_id, &["U1", "U2"], &boxed("BOX4")).await;
    let index = BoxLocationIndex::new(&db, &taxonomy);

    let updated = index
        .update_box_status("BOX4", "Disposed", "Ingram, Pending Pickup")
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let u1 = current(&db, "U1").await;
    assert_eq!(u1.sub_status, "Ingram, Pending Pickup");
    assert_eq!(u1.box_id.as_deref(), Some("BOX4"));
    assert_eq!(u1.version, 2);

    let err = index
        .update_box_status("BOX4", "Disposed", "Nope")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = index
        .update_box_status("EMPTY", "Disposed", "Ready for Wipe")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_update_box_status_out_of_disposal_empties_box() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z2006").await;
    intake(&db, package_id, &["M1"], &boxed("BOX7")).await;
    intake(&db, package_id, &["P1"], &boxed("BOX8")).await;
    let index = BoxLocationIndex::new(&db, &taxonomy);

    let updated = index
        .update_box_status("BOX7", "Disposed", "Deleted (Mistake)")
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let m1 = current(&db, "M1").await;
    assert_eq!(m1.sub_status, "Deleted (Mistake)");
    assert_eq!(m1.box_id, None);
    assert_eq!(m1.note.as_deref(), Some("EOL"));
    assert_eq!(m1.version, 2);

    index
        .update_box_status("BOX8", "Processed", "Ready for Deployment")
        .await
        .unwrap();
    let p1 = current(&db, "P1").await;
    assert_eq!(p1.status, "Processed");
    assert_eq!(p1.box_id, None);

    assert!(index.summaries(None).await.unwrap().is_empty());
    assert!(index.contents("BOX7").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_box_search_treats_wildcards_literally() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z2007").await;
    intake(&db, package_id, &["W1"], &boxed("BOX_1")).await;
    intake(&db, package_id, &["W2"], &boxed("BOXA1")).await;
    let index = BoxLocationIndex::new(&db, &taxonomy);

    let found = index.summaries(Some("x_1")).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].box_id, "BOX_1");
    assert!(index.summaries(Some("%")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_from_box_reverts_to_ready_for_wipe() {
    let db = setup_test_db().await.unwrap();
    let taxonomy = StatusTaxonomy::default();
    let package_id = create_package(&db, "1Z2004").await;
    intake(&db, package_id, &["R1", "R2"], &boxed("BOX6")).await;
    intake(&db, package_id, &["LOOSE"], &IntakeFlags::default()).await;

    let result = BoxLocationIndex::new(&db, &taxonomy)
        .remove_from_box(&serials(&["R1", "LOOSE", "GHOST"]))
        .await
        .unwrap();
    assert_eq!(result.removed, vec!["R1"]);
    assert_eq!(result.not_in_box, vec!["LOOSE", "GHOST"]);

    let r1 = current(&db, "R1").await;
    assert_eq!(r1.status, "Disposed");
    assert_eq!(r1.sub_status, "Ready for Wipe");
    assert_eq!(r1.note.as_deref(), Some(REMOVED_FROM_BOX_NOTE));
    assert_eq!(r1.box_id, None);

    assert_eq!(current(&db, "R2").await.box_id.as_deref(), Some("BOX6"));
}

#[tokio::test]
async fn test_backfill_copies_legacy_box_ids() {
    let db = setup_test_db().await.unwrap();
    let package_id = create_package(&db, "1Z2005").await;
    let id = intake(&db, package_id, &["OLDBOX"], &IntakeFlags::default()).await.receipt_ids[0];

    let row = DeviceStatus::find()
        .filter(device_status::Column::ReceiptId.eq(id))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let mut active = row.into_active_model();
    active.note = Set(Some("Box ID: legacy3. Screen".to_string()));
    active.update(&db).await.unwrap();

    let dry = box_index::backfill_legacy_box_ids(&db, true).await.unwrap();
    assert_eq!((dry.scanned, dry.updated), (1, 1));
    assert_eq!(current(&db, "OLDBOX").await.box_id, None);

    let report = box_index::backfill_legacy_box_ids(&db, false).await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(current(&db, "OLDBOX").await.box_id.as_deref(), Some("LEGACY3"));

    let again = box_index::backfill_legacy_box_ids(&db, false).await.unwrap();
    assert_eq!(again.scanned, 0);
}
