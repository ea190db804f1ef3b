use serde::{Deserialize, Serialize};

use crate::entities::mel_rules;
use crate::services::disposition_rules::{MelMatchKind, MelRuleMatch, ScrapRequest};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MelLookupQuery {
    pub model: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MelRuleResponse {
    pub id: i32,
    pub model_number: Option<String>,
    pub description: Option<String>,
    pub action: String,
    pub special_notes: Option<String>,
    pub manufacturer: Option<String>,
}

impl From<mel_rules::Model> for MelRuleResponse {
    fn from(m: mel_rules::Model) -> Self {
        Self {
            id: m.id,
            model_number: m.model_number,
            description: m.description,
            action: m.action,
            special_notes: m.special_notes,
            manufacturer: m.manufacturer,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MelLookupResponse {
    pub rule: Option<MelRuleResponse>,
    pub matched_on: Option<MelMatchKind>,
    /// Pre-filled scrap request when the rule says to dispose
    pub suggested_disposition: Option<ScrapRequest>,
}

impl From<Option<MelRuleMatch>> for MelLookupResponse {
    fn from(found: Option<MelRuleMatch>) -> Self {
        match found {
            Some(found) => Self {
                suggested_disposition: found.suggested_scrap(),
                matched_on: Some(found.matched_on),
                rule: Some(found.rule.into()),
            },
            None => Self {
                rule: None,
                matched_on: None,
                suggested_disposition: None,
            },
        }
    }
}
