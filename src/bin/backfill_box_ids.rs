use std::env;

use sea_orm::Database;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use depot_tracker::config::Config;
use depot_tracker::services::box_index;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,depot_tracker=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let dry_run = args.iter().skip(1).any(|a| a == "--dry-run");
    if let Some(unknown) = args.iter().skip(1).find(|a| a.as_str() != "--dry-run") {
        eprintln!("Unknown argument: {}", unknown);
        eprintln!("Usage: cargo run --bin backfill_box_ids [--dry-run]");
        std::process::exit(1);
    }

    let config = Config::from_env()?;

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;

    tracing::info!(dry_run = dry_run, "Starting box id backfill");

    match box_index::backfill_legacy_box_ids(&db, dry_run).await {
        Ok(report) => {
            tracing::info!(
                "Backfill finished: {} legacy rows scanned, {} {}",
                report.scanned,
                report.updated,
                if dry_run { "would be updated" } else { "updated" }
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Backfill failed: {}", e);
            Err(e.into())
        }
    }
}
