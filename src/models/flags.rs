use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagRequest {
    pub serial_number: String,
    #[serde(default)]
    pub reason: Option<String>,
}
