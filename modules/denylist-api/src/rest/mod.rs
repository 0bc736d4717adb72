pub mod export;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};

use denylist_common::{
    entry_dataset_key, DistanceVsRssi, EntryRecord, HotspotDetails, IssueDetails, IssueSummary,
    ReviewStatus, RssiVsSnr, UserStats, WitnessGraph, WitnessedMakers, DISTANCE_VS_RSSI,
    HOTSPOT_DETAILS, RSSI_VS_SNR, WITNESSED_MAKERS, WITNESS_GRAPH,
};

use crate::charts::{distance_rssi_r_squared, witness_graph_elements, Element};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const DEFAULT_ISSUE_LIMIT: i64 = 100;

// --- Query and body structs ---

#[derive(Deserialize)]
pub struct IssuesQuery {
    limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    status: String,
}

// --- Response structs ---

#[derive(Serialize)]
pub struct IssueResponse {
    #[serde(flatten)]
    details: IssueDetails,
    entries: Vec<String>,
}

#[derive(Serialize)]
pub struct EntryDataResponse {
    distance_vs_rssi: DistanceVsRssi,
    witnessed_makers: WitnessedMakers,
    hotspot_details: HotspotDetails,
    witness_graph: WitnessGraph,
    rssi_vs_snr: RssiVsSnr,
}

#[derive(Serialize)]
pub struct EntryGraphResponse {
    elements: Vec<Element>,
    distance_vs_rssi_r2: Option<f64>,
}

#[derive(Serialize)]
pub struct ReviewResponse {
    issue_number: i64,
    address: String,
    review_status: ReviewStatus,
}

// --- Helpers ---

/// `limit=0` lists everything; negative limits are rejected.
fn issue_limit(limit: Option<i64>) -> ApiResult<Option<i64>> {
    match limit.unwrap_or(DEFAULT_ISSUE_LIMIT) {
        0 => Ok(None),
        n if n > 0 => Ok(Some(n)),
        n => Err(ApiError::validation(format!("limit must not be negative, got {n}"))),
    }
}

// --- Handlers ---

pub async fn api_issues(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IssuesQuery>,
) -> ApiResult<Json<Vec<IssueSummary>>> {
    let limit = issue_limit(params.limit)?;
    Ok(Json(state.store.issues_summary(limit).await?))
}

pub async fn api_issue_detail(
    State(state): State<Arc<AppState>>,
    Path(number): Path<i64>,
) -> ApiResult<Json<IssueResponse>> {
    let details = state
        .store
        .issue_details(number, false)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("issue {number}")))?;
    let entries = state.store.entry_addresses(number).await?;
    Ok(Json(IssueResponse { details, entries }))
}

pub async fn api_issue_entries(
    State(state): State<Arc<AppState>>,
    Path(number): Path<i64>,
) -> ApiResult<Json<Vec<EntryRecord>>> {
    Ok(Json(state.store.entries_table(Some(number)).await?))
}

pub async fn api_entry_data(
    State(state): State<Arc<AppState>>,
    Path((number, address)): Path<(i64, String)>,
) -> ApiResult<Json<EntryDataResponse>> {
    let artifacts = &state.artifacts;
    let key = |dataset: &str| entry_dataset_key(number, &address, dataset);

    Ok(Json(EntryDataResponse {
        distance_vs_rssi: artifacts.get_json(&key(DISTANCE_VS_RSSI)).await?,
        witnessed_makers: artifacts.get_json(&key(WITNESSED_MAKERS)).await?,
        hotspot_details: artifacts.get_json(&key(HOTSPOT_DETAILS)).await?,
        witness_graph: artifacts.get_json(&key(WITNESS_GRAPH)).await?,
        // Reports written before this dataset existed lack it.
        rssi_vs_snr: artifacts
            .get_json_opt(&key(RSSI_VS_SNR))
            .await?
            .unwrap_or_default(),
    }))
}

pub async fn api_entry_graph(
    State(state): State<Arc<AppState>>,
    Path((number, address)): Path<(i64, String)>,
) -> ApiResult<Json<EntryGraphResponse>> {
    let artifacts = &state.artifacts;
    let graph: WitnessGraph = artifacts
        .get_json(&entry_dataset_key(number, &address, WITNESS_GRAPH))
        .await?;
    let distance_vs_rssi: DistanceVsRssi = artifacts
        .get_json(&entry_dataset_key(number, &address, DISTANCE_VS_RSSI))
        .await?;

    Ok(Json(EntryGraphResponse {
        elements: witness_graph_elements(&graph),
        distance_vs_rssi_r2: distance_rssi_r_squared(&distance_vs_rssi),
    }))
}

pub async fn api_entry_review(
    State(state): State<Arc<AppState>>,
    Path((number, address)): Path<(i64, String)>,
    Json(body): Json<ReviewRequest>,
) -> ApiResult<Json<ReviewResponse>> {
    let status: ReviewStatus = body.status.parse()?;
    if !state
        .store
        .update_review_status(number, &address, status)
        .await?
    {
        return Err(ApiError::not_found(format!("entry {address} on issue {number}")));
    }
    Ok(Json(ReviewResponse {
        issue_number: number,
        address,
        review_status: status,
    }))
}

pub async fn api_user(
    State(state): State<Arc<AppState>>,
    Path(login): Path<String>,
) -> ApiResult<Json<UserStats>> {
    state
        .store
        .user_stats(&login)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("user {login}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_zero_means_all() {
        assert_eq!(issue_limit(None).unwrap(), Some(DEFAULT_ISSUE_LIMIT));
        assert_eq!(issue_limit(Some(0)).unwrap(), None);
        assert_eq!(issue_limit(Some(5)).unwrap(), Some(5));
        assert!(issue_limit(Some(-1)).is_err());
    }
}
