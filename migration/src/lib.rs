pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_assets;
mod m20261001_000002_create_packages;
mod m20261001_000003_create_receipt_events;
mod m20261001_000004_create_device_status;
mod m20261001_000005_create_disposition_info;
mod m20261001_000006_create_flagged_devices;
mod m20261001_000007_create_mel_rules;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_assets::Migration),
            Box::new(m20261001_000002_create_packages::Migration),
            Box::new(m20261001_000003_create_receipt_events::Migration),
            Box::new(m20261001_000004_create_device_status::Migration),
            Box::new(m20261001_000005_create_disposition_info::Migration),
            Box::new(m20261001_000006_create_flagged_devices::Migration),
            Box::new(m20261001_000007_create_mel_rules::Migration),
        ]
    }
}
