use crate::api::{
    GetShareResponse, ListSharesQuery, ListSharesResponse, PutShareRequest, PutShareResponse,
    ShareListItem, iso_timestamp,
};
use crate::error::{ApiError, StoreResultExt};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use tracing::info;

const DEFAULT_LIST_LIMIT: usize = 100;
const MAX_LIST_LIMIT: usize = 1000;

/// POST /api/share
pub async fn put_share(
    State(state): State<AppState>,
    payload: Result<Json<PutShareRequest>, JsonRejection>,
) -> Result<Json<PutShareResponse>, ApiError> {
    let Json(req) = payload.map_err(ApiError::from_rejection)?;

    let (share_id, data) = match (req.share_id, req.data) {
        (Some(share_id), Some(data)) if !share_id.is_empty() => (share_id, data),
        _ => return Err(ApiError::bad_request("shareId and data are required")),
    };

    let stored = state
        .store
        .put(&share_id, data)
        .await
        .or_api_error("Failed to store share data")?;

    if stored.replaced {
        info!("Replaced share: {}", share_id);
    } else {
        info!("Stored share: {}", share_id);
    }

    Ok(Json(PutShareResponse {
        success: true,
        share_id,
        expires_in: state.retention.describe(),
    }))
}

/// GET /api/share/{share_id}
pub async fn get_share(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
) -> Result<Json<GetShareResponse>, ApiError> {
    let share = state
        .store
        .get(&share_id)
        .await
        .or_api_error("Failed to retrieve share data")?;

    info!("Retrieved share: {}", share_id);

    Ok(Json(GetShareResponse {
        success: true,
        data: share.value,
        created_at: iso_timestamp(share.created_at),
    }))
}

/// GET /api/shares?limit=N
pub async fn list_shares(
    State(state): State<AppState>,
    Query(query): Query<ListSharesQuery>,
) -> Result<Json<ListSharesResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);

    let shares: Vec<ShareListItem> = state
        .store
        .list(limit)
        .await
        .or_api_error("Failed to list shares")?
        .into_iter()
        .map(ShareListItem::from)
        .collect();

    Ok(Json(ListSharesResponse {
        total: shares.len(),
        shares,
    }))
}
