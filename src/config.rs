//! Environment-driven configuration
//!
//! Values are read after `dotenvy::dotenv()` so a local `.env` file works
//! the same as exported variables.

use std::env;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Rows per page in the device status table
pub const DEFAULT_PAGE_SIZE: u64 = 200;

const DEFAULT_MAX_PAGE_SIZE: u64 = 1000;

const DEFAULT_JOB_QUEUE_CAPACITY: usize = 32;

const DEFAULT_JOB_RETENTION: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub default_page_size: u64,
    pub max_page_size: u64,
    pub job_queue_capacity: usize,
    /// Finished detached jobs kept for polling
    pub job_retention: usize,
    /// Optional JSON file replacing the built-in status taxonomy
    pub status_taxonomy_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::validation("DATABASE_URL must be set"))?;

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let default_page_size = parse_var("DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        let max_page_size = parse_var("MAX_PAGE_SIZE", DEFAULT_MAX_PAGE_SIZE)?;
        let job_queue_capacity = parse_var("JOB_QUEUE_CAPACITY", DEFAULT_JOB_QUEUE_CAPACITY)?;
        let job_retention = parse_var("JOB_RETENTION", DEFAULT_JOB_RETENTION)?;

        if default_page_size == 0 || default_page_size > max_page_size {
            return Err(AppError::validation(format!(
                "DEFAULT_PAGE_SIZE must be between 1 and MAX_PAGE_SIZE ({})",
                max_page_size
            )));
        }
        if job_queue_capacity == 0 {
            return Err(AppError::validation("JOB_QUEUE_CAPACITY must be at least 1"));
        }

        let status_taxonomy_path = env::var("STATUS_TAXONOMY_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            database_url,
            bind_addr,
            default_page_size,
            max_page_size,
            job_queue_capacity,
            job_retention,
            status_taxonomy_path,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::validation(format!("{} is not a valid number: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
