use serde::Deserialize;
use serde_json::Value;

// === Share Operation Models ===

/// Body of POST /api/share. Both fields are optional here so a missing one
/// becomes a 400 from the handler instead of an extractor rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutShareRequest {
    #[serde(default)]
    pub share_id: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListSharesQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}
