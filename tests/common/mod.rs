#![allow(dead_code)]

use std::env;
use std::sync::Arc;

use chrono::NaiveDate;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, DbErr, Set};
use tokio_util::sync::CancellationToken;

use depot_tracker::config::Config;
use depot_tracker::entities::mel_rules;
use depot_tracker::services::asset_registry::AssetDetails;
use depot_tracker::services::intake::{BatchResult, IntakeFlags, IntakeOrchestrator};
use depot_tracker::services::jobs::JobQueue;
use depot_tracker::services::packages::{self, NewPackage};
use depot_tracker::services::status_store::{DeviceStatusView, StatusLifecycleStore};
use depot_tracker::services::taxonomy::StatusTaxonomy;
use depot_tracker::AppState;

/// Set up a migrated test database
/// Uses TEST_DATABASE_URL or falls back to an in-memory SQLite database
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let database_url =
        env::var("TEST_DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());

    // Every in-memory SQLite connection is its own database
    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    Migrator::fresh(&db).await?;
    Ok(db)
}

pub fn test_state(db: DatabaseConnection) -> AppState {
    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        default_page_size: 200,
        max_page_size: 1000,
        job_queue_capacity: 8,
        job_retention: 64,
        status_taxonomy_path: None,
    };
    AppState {
        db,
        taxonomy: Arc::new(StatusTaxonomy::default()),
        jobs: JobQueue::start(config.job_queue_capacity, config.job_retention),
        config: Arc::new(config),
    }
}

pub async fn create_package(db: &DatabaseConnection, tracking: &str) -> i32 {
    packages::create(
        db,
        &NewPackage {
            tracking_number: tracking.to_string(),
            first_name: Some("Dana".to_string()),
            last_name: Some("Ortiz".to_string()),
            city: Some("Lansing".to_string()),
            state: Some("mi".to_string()),
            zip_code: Some("48933".to_string()),
            receive_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
        },
    )
    .await
    .expect("Failed to create package")
    .id
}

pub fn laptop() -> AssetDetails {
    AssetDetails {
        make: Some("Dell".to_string()),
        model_number: Some("5400".to_string()),
        description: Some("Latitude 5400".to_string()),
        category: Some("Laptop".to_string()),
        ..Default::default()
    }
}

pub fn serials(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub async fn intake(
    db: &DatabaseConnection,
    package_id: i32,
    list: &[&str],
    flags: &IntakeFlags,
) -> BatchResult {
    let taxonomy = StatusTaxonomy::default();
    IntakeOrchestrator::new(db, &taxonomy)
        .process_serial_list(
            package_id,
            &serials(list),
            &laptop(),
            flags,
            &CancellationToken::new(),
        )
        .await
        .expect("Intake failed")
}

pub async fn current(db: &DatabaseConnection, serial: &str) -> DeviceStatusView {
    let taxonomy = StatusTaxonomy::default();
    StatusLifecycleStore::new(db, &taxonomy)
        .current_for_serial(serial)
        .await
        .expect("Query failed")
        .unwrap_or_else(|| panic!("No current status for {}", serial))
}

pub async fn seed_mel_rule(
    db: &DatabaseConnection,
    model_number: Option<&str>,
    description: Option<&str>,
    action: &str,
) -> mel_rules::Model {
    mel_rules::ActiveModel {
        model_number: Set(model_number.map(str::to_string)),
        description: Set(description.map(str::to_string)),
        action: Set(action.to_string()),
        special_notes: Set(Some("End of life".to_string())),
        manufacturer: Set(Some("Dell".to_string())),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to seed MEL rule")
}
