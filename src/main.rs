use std::sync::Arc;
use std::time::Duration;

use depot_tracker::{
    config::Config, router, services::jobs::JobQueue, services::taxonomy::StatusTaxonomy,
    AppState,
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,depot_tracker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Connect to database
    tracing::info!("Connecting to database...");
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(20)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    let db = Database::connect(options).await?;

    // Run migrations
    tracing::info!("Running migrations...");
    Migrator::up(&db, None).await?;

    let taxonomy = match &config.status_taxonomy_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading status taxonomy");
            StatusTaxonomy::from_json_file(path)?
        }
        None => StatusTaxonomy::default(),
    };

    let jobs = JobQueue::start(config.job_queue_capacity, config.job_retention);
    let bind_addr = config.bind_addr.clone();

    let state = AppState {
        db,
        taxonomy: Arc::new(taxonomy),
        jobs,
        config: Arc::new(config),
    };

    let app = router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
