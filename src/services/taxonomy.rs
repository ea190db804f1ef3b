//! Closed two-level status taxonomy
//!
//! Built once at startup (built-in default or a JSON override file) and shared
//! read-only through `AppState`. Nothing mutates it after construction.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const STATUS_INTAKE: &str = "Intake";
pub const STATUS_TRIAGE: &str = "Triage & Repair";
pub const STATUS_PROCESSED: &str = "Processed";
pub const STATUS_DISPOSED: &str = "Disposed";
pub const STATUS_EVERON: &str = "Everon";
pub const STATUS_PHONE: &str = "Phone";
pub const STATUS_FLAG: &str = "Flag!";

pub const SUB_IN_EVALUATION: &str = "In Evaluation";
pub const SUB_READY_FOR_DEPLOYMENT: &str = "Ready for Deployment";
pub const SUB_READY_FOR_WIPE: &str = "Ready for Wipe";
pub const SUB_REQUIRES_REVIEW: &str = "Requires Review";
pub const SUB_DELETED_MISTAKE: &str = "Deleted (Mistake)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub status: String,
    pub sub_statuses: Vec<String>,
}

/// Ordered status → sub-status lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusTaxonomy {
    entries: Vec<StatusEntry>,
}

impl Default for StatusTaxonomy {
    fn default() -> Self {
        let entry = |status: &str, subs: &[&str]| StatusEntry {
            status: status.to_string(),
            sub_statuses: subs.iter().map(|s| s.to_string()).collect(),
        };

        Self {
            entries: vec![
                entry(STATUS_INTAKE, &[SUB_IN_EVALUATION]),
                entry(
                    STATUS_TRIAGE,
                    &[
                        "Troubleshooting",
                        "Awaiting Parts",
                        "Awaiting Dell Tech",
                        "Shipped to Dell",
                        "Refurbishment",
                    ],
                ),
                entry(STATUS_PROCESSED, &[SUB_READY_FOR_DEPLOYMENT, "Ready for Imaging"]),
                entry(
                    STATUS_DISPOSED,
                    &[
                        SUB_READY_FOR_WIPE,
                        "Can-Am, Pending Pickup",
                        "Ingram, Pending Pickup",
                        SUB_DELETED_MISTAKE,
                    ],
                ),
                entry(STATUS_EVERON, &["Pending Shipment", "Shipped"]),
                entry(STATUS_PHONE, &["Pending Shipment", "Shipped"]),
                entry(STATUS_FLAG, &[SUB_REQUIRES_REVIEW]),
            ],
        }
    }
}

impl StatusTaxonomy {
    /// Build a taxonomy from explicit entries.
    ///
    /// The system statuses used by intake (`Intake`, `Processed`, `Flag!`)
    /// and their fixed sub-statuses must be present.
    pub fn new(entries: Vec<StatusEntry>) -> AppResult<Self> {
        let taxonomy = Self { entries };

        for entry in &taxonomy.entries {
            if entry.status.trim().is_empty() {
                return Err(AppError::validation("Status names cannot be blank"));
            }
            if entry.sub_statuses.is_empty() {
                return Err(AppError::validation(format!(
                    "Status '{}' has no sub-statuses",
                    entry.status
                )));
            }
        }

        let required = [
            (STATUS_INTAKE, SUB_IN_EVALUATION),
            (STATUS_PROCESSED, SUB_READY_FOR_DEPLOYMENT),
            (STATUS_FLAG, SUB_REQUIRES_REVIEW),
        ];
        for (status, sub) in required {
            if !taxonomy.contains(status, sub) {
                return Err(AppError::validation(format!(
                    "Taxonomy is missing required pair '{}' / '{}'",
                    status, sub
                )));
            }
        }

        Ok(taxonomy)
    }

    /// Load a taxonomy from a JSON file shaped as `[{status, subStatuses}]`.
    pub fn from_json_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::validation(format!("Cannot read taxonomy file {}: {}", path.display(), e))
        })?;
        let entries: Vec<StatusEntry> = serde_json::from_str(&raw).map_err(|e| {
            AppError::validation(format!("Invalid taxonomy file {}: {}", path.display(), e))
        })?;
        Self::new(entries)
    }

    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }

    pub fn statuses(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.status.as_str()).collect()
    }

    /// Sub-statuses of `status`, empty when the status is unknown
    pub fn sub_statuses(&self, status: &str) -> &[String] {
        self.entries
            .iter()
            .find(|e| e.status == status)
            .map(|e| e.sub_statuses.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, status: &str, sub_status: &str) -> bool {
        self.sub_statuses(status).iter().any(|s| s == sub_status)
    }

    pub fn validate(&self, status: &str, sub_status: &str) -> AppResult<()> {
        if self.sub_statuses(status).is_empty() {
            return Err(AppError::validation(format!("Unknown status '{}'", status)));
        }
        if !self.contains(status, sub_status) {
            return Err(AppError::validation(format!(
                "Sub-status '{}' is not valid for status '{}'",
                sub_status, status
            )));
        }
        Ok(())
    }

    /// Disposed devices must be placed in a box unless they are only queued
    /// for wipe or were entered by mistake.
    pub fn requires_box_id(&self, status: &str, sub_status: &str) -> bool {
        status == STATUS_DISPOSED
            && sub_status != SUB_READY_FOR_WIPE
            && sub_status != SUB_DELETED_MISTAKE
    }

    /// Whether a device with this status may stay assigned to a box.
    pub fn can_hold_box(&self, status: &str, sub_status: &str) -> bool {
        status == STATUS_DISPOSED && sub_status != SUB_DELETED_MISTAKE
    }
}
