use std::sync::Arc;

use axum::{extract::State, response::Json};
use serde::Deserialize;
use tracing::info;

use denylist_common::AcceptedEntry;
use denylist_tracker::export::{export, fetch_current_denylist, DenylistExport, ExportKind};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    kind: ExportKind,
    /// Entries picked by the reviewer; when absent, every entry reviewed as
    /// valid on an open addition/removal issue.
    accepted: Option<Vec<AcceptedEntry>>,
}

pub async fn api_export(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExportRequest>,
) -> ApiResult<Json<DenylistExport>> {
    let accepted = match body.accepted {
        Some(accepted) => accepted,
        None => state.store.accepted_entries().await?,
    };
    let current = fetch_current_denylist(&state.http, &state.denylist_csv_url).await?;

    let out = export(body.kind, &current, &accepted);
    info!(kind = ?out.kind, accepted = accepted.len(), current = current.len(), "Built denylist export");
    Ok(Json(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use denylist_common::IssueType;

    #[test]
    fn request_defaults_to_full_export_from_store() {
        let req: ExportRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.kind, ExportKind::Full);
        assert!(req.accepted.is_none());
    }

    #[test]
    fn request_carries_picked_entries() {
        let req: ExportRequest = serde_json::from_str(
            r#"{"kind": "removals", "accepted": [{"address": "11abc", "issue": 9, "issue_type": "removal"}]}"#,
        )
        .unwrap();
        assert_eq!(req.kind, ExportKind::Removals);
        assert_eq!(
            req.accepted.unwrap(),
            vec![AcceptedEntry {
                address: "11abc".into(),
                issue: 9,
                issue_type: IssueType::Removal,
            }]
        );
    }
}
