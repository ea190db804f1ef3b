// src/lib.rs

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use config::Config;
use services::{jobs::JobQueue, taxonomy::StatusTaxonomy};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub taxonomy: Arc<StatusTaxonomy>,
    pub jobs: JobQueue,
    pub config: Arc<Config>,
}

pub mod config;
pub mod error;

pub mod entities {
    pub mod prelude;
    pub mod asset_history;
    pub mod assets;
    pub mod device_status;
    pub mod disposition_info;
    pub mod flagged_devices;
    pub mod mel_rules;
    pub mod packages;
    pub mod receipt_events;
}

pub mod services {
    pub mod asset_registry;
    pub mod box_index;
    pub mod disposition_rules;
    pub mod flags;
    pub mod intake;
    pub mod jobs;
    pub mod packages;
    pub mod receipt_ledger;
    pub mod status_store;
    pub mod taxonomy;
}

pub mod models {
    pub mod boxes;
    pub mod common;
    pub mod device_status;
    pub mod flags;
    pub mod intake;
    pub mod mel_rules;
    pub mod packages;
}

pub mod handlers {
    pub mod boxes;
    pub mod device_status;
    pub mod flags;
    pub mod intake;
    pub mod jobs;
    pub mod mel_rules;
    pub mod packages;
    pub mod statuses;
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::statuses::health))
        .route("/api/statuses", get(handlers::statuses::list_statuses))
        // Intake
        .route("/api/intake/serials", post(handlers::intake::intake_serials))
        .route("/api/intake/rows", post(handlers::intake::intake_rows))
        // Device status
        .route("/api/device-status", get(handlers::device_status::list_device_status))
        .route(
            "/api/device-status/{serial}/history",
            get(handlers::device_status::get_device_history),
        )
        .route("/api/device-status/update", post(handlers::device_status::update_status))
        .route("/api/device-status/bulk-update", post(handlers::device_status::bulk_update))
        .route("/api/device-status/bulk-move", post(handlers::device_status::bulk_move))
        // Boxes
        .route("/api/boxes", get(handlers::boxes::list_boxes))
        .route("/api/boxes/remove", post(handlers::boxes::remove_from_box))
        .route("/api/boxes/{box_id}", get(handlers::boxes::get_box))
        .route("/api/boxes/{box_id}/status", post(handlers::boxes::update_box_status))
        // Packages
        .route("/api/packages", post(handlers::packages::create_package))
        .route("/api/packages/{id}", get(handlers::packages::get_package))
        // Flags
        .route(
            "/api/flags",
            get(handlers::flags::list_flags).post(handlers::flags::flag_device),
        )
        .route("/api/flags/{serial}", delete(handlers::flags::unflag_device))
        // MEL
        .route("/api/mel-rules/lookup", get(handlers::mel_rules::lookup_mel_rule))
        // Jobs
        .route("/api/jobs/{id}", get(handlers::jobs::get_job))
        .route("/api/jobs/{id}/cancel", post(handlers::jobs::cancel_job))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
