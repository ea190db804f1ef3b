//! Disposition rule engine
//!
//! Decides the initial status of a freshly received device. Rules are
//! evaluated in strict precedence order and the first match wins:
//!
//! 1. an open flag on the serial forces `Flag! / Requires Review`
//! 2. an explicit scrap/disposal request applies the caller's status
//! 3. a "new condition" intake goes straight to `Processed / Ready for Deployment`
//! 4. everything else lands in `Intake / In Evaluation`
//!
//! MEL rules are only advisory: a matching "Dispose" rule lets the caller
//! pre-fill a scrap request, nothing here enforces it.

use sea_orm::{ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::entities::{mel_rules, prelude::*};
use crate::error::{AppError, AppResult};
use crate::services::taxonomy::{
    StatusTaxonomy, STATUS_DISPOSED, STATUS_FLAG, STATUS_INTAKE, STATUS_PROCESSED,
    SUB_DELETED_MISTAKE, SUB_IN_EVALUATION, SUB_READY_FOR_DEPLOYMENT, SUB_READY_FOR_WIPE,
    SUB_REQUIRES_REVIEW,
};

pub const MEL_ACTION_DISPOSE: &str = "Dispose";

/// Caller's explicit request to scrap or dispose the devices in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapRequest {
    pub status: String,
    pub sub_status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub box_id: Option<String>,
}

impl ScrapRequest {
    pub fn normalized_box_id(&self) -> Option<String> {
        normalize_box_id(self.box_id.as_deref())
    }

    fn reason(&self) -> Option<&str> {
        self.reason.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }

    /// Checked before any transaction is opened.
    pub fn validate(&self, taxonomy: &StatusTaxonomy) -> AppResult<()> {
        taxonomy.validate(&self.status, &self.sub_status)?;
        if taxonomy.requires_box_id(&self.status, &self.sub_status)
            && self.normalized_box_id().is_none()
        {
            return Err(AppError::validation(format!(
                "A Box ID is required for status '{} / {}'",
                self.status, self.sub_status
            )));
        }
        Ok(())
    }
}

/// Outcome of the rule engine for one receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    pub status: String,
    pub sub_status: String,
    pub note: Option<String>,
    pub box_id: Option<String>,
    pub rule: DispositionRule,
}

/// Which rule produced a disposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispositionRule {
    FlagOverride,
    ScrapRequest,
    NewCondition,
    DefaultIntake,
}

/// Box ids are stored trimmed and upper-cased; blank means absent.
pub fn normalize_box_id(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|b| b.to_uppercase())
}

/// Human-readable note for a boxed device, e.g. `Box ID: BOX1. Cracked screen`
pub fn box_note(box_id: &str, reason: Option<&str>) -> String {
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("Box ID: {}. {}", box_id, reason),
        None => format!("Box ID: {}", box_id),
    }
}

pub fn flag_note(reason: Option<&str>) -> String {
    format!("Flagged on intake. Reason: {}", reason.unwrap_or("").trim())
}

/// Evaluate the precedence rules.
///
/// `flag_reason` is `Some` whenever a flag row exists for the serial, with the
/// inner value being the (possibly absent) reason text.
pub fn decide(
    flag_reason: Option<Option<&str>>,
    scrap: Option<&ScrapRequest>,
    is_new_condition: bool,
) -> AppResult<Disposition> {
    if let Some(reason) = flag_reason {
        return Ok(Disposition {
            status: STATUS_FLAG.to_string(),
            sub_status: SUB_REQUIRES_REVIEW.to_string(),
            note: Some(flag_note(reason)),
            box_id: None,
            rule: DispositionRule::FlagOverride,
        });
    }

    if let Some(scrap) = scrap {
        let box_id = scrap.normalized_box_id();
        let (note, box_id) = if scrap.status == STATUS_DISPOSED {
            if scrap.sub_status == SUB_READY_FOR_WIPE {
                (scrap.reason().map(str::to_string), box_id)
            } else if scrap.sub_status == SUB_DELETED_MISTAKE {
                (scrap.reason().map(str::to_string), None)
            } else {
                let id = box_id.ok_or_else(|| {
                    AppError::validation(format!(
                        "A Box ID is required for status '{} / {}'",
                        scrap.status, scrap.sub_status
                    ))
                })?;
                (Some(box_note(&id, scrap.reason())), Some(id))
            }
        } else {
            (scrap.reason().map(str::to_string), None)
        };

        return Ok(Disposition {
            status: scrap.status.clone(),
            sub_status: scrap.sub_status.clone(),
            note,
            box_id,
            rule: DispositionRule::ScrapRequest,
        });
    }

    if is_new_condition {
        return Ok(Disposition {
            status: STATUS_PROCESSED.to_string(),
            sub_status: SUB_READY_FOR_DEPLOYMENT.to_string(),
            note: None,
            box_id: None,
            rule: DispositionRule::NewCondition,
        });
    }

    Ok(Disposition {
        status: STATUS_INTAKE.to_string(),
        sub_status: SUB_IN_EVALUATION.to_string(),
        note: None,
        box_id: None,
        rule: DispositionRule::DefaultIntake,
    })
}

/// How a MEL rule matched the lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MelMatchKind {
    ModelNumber,
    Description,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MelRuleMatch {
    pub rule: mel_rules::Model,
    pub matched_on: MelMatchKind,
}

impl MelRuleMatch {
    /// Scrap request the caller should pre-fill, if the rule says to dispose
    pub fn suggested_scrap(&self) -> Option<ScrapRequest> {
        if !self.rule.action.trim().eq_ignore_ascii_case(MEL_ACTION_DISPOSE) {
            return None;
        }
        Some(ScrapRequest {
            status: STATUS_DISPOSED.to_string(),
            sub_status: SUB_READY_FOR_WIPE.to_string(),
            reason: self.rule.special_notes.clone(),
            box_id: None,
        })
    }
}

/// Find the MEL rule for a model number or description.
///
/// An exact model-number match outranks a description match; ties within a
/// rank go to the lowest rule id.
pub async fn find_mel_rule<C: ConnectionTrait>(
    conn: &C,
    model_number: Option<&str>,
    description: Option<&str>,
) -> AppResult<Option<MelRuleMatch>> {
    let model_number = model_number.map(str::trim).filter(|m| !m.is_empty());
    let description = description.map(str::trim).filter(|d| !d.is_empty());

    if model_number.is_none() && description.is_none() {
        return Ok(None);
    }

    let mut condition = Condition::any();
    if let Some(model) = model_number {
        condition = condition.add(mel_rules::Column::ModelNumber.eq(model));
    }
    if let Some(desc) = description {
        condition = condition.add(mel_rules::Column::Description.eq(desc));
    }

    let candidates = MelRules::find()
        .filter(condition)
        .order_by_asc(mel_rules::Column::Id)
        .all(conn)
        .await?;

    Ok(pick_mel_rule(candidates, model_number))
}

fn pick_mel_rule(
    candidates: Vec<mel_rules::Model>,
    model_number: Option<&str>,
) -> Option<MelRuleMatch> {
    let (by_model, by_description): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|rule| model_number.is_some() && rule.model_number.as_deref() == model_number);

    if let Some(rule) = by_model.into_iter().next() {
        return Some(MelRuleMatch {
            rule,
            matched_on: MelMatchKind::ModelNumber,
        });
    }
    by_description.into_iter().next().map(|rule| MelRuleMatch {
        rule,
        matched_on: MelMatchKind::Description,
    })
}
