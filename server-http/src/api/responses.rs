use chrono::{DateTime, SecondsFormat, Utc};
use ferry::{ShareSummary, StorageKind};
use serde::Serialize;
use serde_json::Value;

/// ISO 8601 with millisecond precision, e.g. `2025-01-01T12:00:00.000Z`
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_shares: Option<usize>,
    pub storage: StorageKind,
}

// === Share Operation Models ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PutShareResponse {
    pub success: bool,
    pub share_id: String,
    pub expires_in: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetShareResponse {
    pub success: bool,
    pub data: Value,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareListItem {
    pub share_id: String,
    pub created_at: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

impl From<ShareSummary> for ShareListItem {
    fn from(summary: ShareSummary) -> Self {
        Self {
            created_at: iso_timestamp(summary.created_at),
            timestamp: summary.created_at.timestamp_millis(),
            share_id: summary.id,
            size: summary.size,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListSharesResponse {
    pub shares: Vec<ShareListItem>,
    pub total: usize,
}

// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
