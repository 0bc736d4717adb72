use std::sync::Arc;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue},
    routing::{get, post, put},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use denylist_common::Config;
use denylist_store::{ArtifactStore, DenylistStore};

mod charts;
mod error;
mod rest;

pub struct AppState {
    pub store: DenylistStore,
    pub artifacts: ArtifactStore,
    pub http: reqwest::Client,
    pub denylist_csv_url: String,
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Issues and entries
        .route("/api/issues", get(rest::api_issues))
        .route("/api/issues/{number}", get(rest::api_issue_detail))
        .route("/api/issues/{number}/entries", get(rest::api_issue_entries))
        .route(
            "/api/issues/{number}/entries/{address}/data",
            get(rest::api_entry_data),
        )
        .route(
            "/api/issues/{number}/entries/{address}/graph",
            get(rest::api_entry_graph),
        )
        .route(
            "/api/issues/{number}/entries/{address}/review",
            put(rest::api_entry_review),
        )
        .route("/api/users/{login}", get(rest::api_user))
        // Denylist pull request
        .route("/api/export", post(rest::export::api_export))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // method + path + status + latency only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("denylist=info".parse()?))
        .init();

    let config = Config::api_from_env();
    config.log_redacted();

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    let state = Arc::new(AppState {
        store: DenylistStore::new(pool),
        artifacts: ArtifactStore::from_location(&config.artifacts)?,
        http: reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?,
        denylist_csv_url: config.denylist_csv_url.clone(),
    });

    let app = router(state);

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!("Denylist API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use denylist_common::{
        entry_dataset_key, DistanceVsRssi, HotspotDetails, WitnessGraph, WitnessedMakers,
        DISTANCE_VS_RSSI, HOTSPOT_DETAILS, WITNESSED_MAKERS, WITNESS_GRAPH,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    // Routes under test only read artifacts; the pool never connects.
    fn state(artifacts: ArtifactStore) -> Arc<AppState> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/denylist_unused")
            .unwrap();
        Arc::new(AppState {
            store: DenylistStore::new(pool),
            artifacts,
            http: reqwest::Client::new(),
            denylist_csv_url: "http://localhost/denylist.csv".to_string(),
        })
    }

    async fn seed(artifacts: &ArtifactStore, issue: i64, address: &str) {
        let put = |dataset: &'static str, body: Value| {
            let key = entry_dataset_key(issue, address, dataset);
            async move { artifacts.put_json(&key, &body).await.unwrap() }
        };
        put(
            DISTANCE_VS_RSSI,
            serde_json::to_value(DistanceVsRssi {
                distance_m: vec![100.0, 200.0, 400.0],
                rssi: vec![Some(-90), Some(-100), Some(-120)],
            })
            .unwrap(),
        )
        .await;
        put(
            WITNESSED_MAKERS,
            serde_json::to_value(WitnessedMakers {
                maker: vec![Some("Maker A".into())],
                n_witnessed: vec![3],
                as_of_block: 1_500_000,
            })
            .unwrap(),
        )
        .await;
        put(
            HOTSPOT_DETAILS,
            serde_json::to_value(HotspotDetails {
                name: Some("angry-purple-tiger".into()),
                owner: None,
                first_block: Some(1_000),
                last_block: None,
                reward_scale: None,
                elevation: None,
                gain: None,
                nonce: None,
                maker: None,
                country: None,
                state: None,
                city: None,
                location: None,
                as_of_block: Some(1_500_000),
            })
            .unwrap(),
        )
        .await;
        put(
            WITNESS_GRAPH,
            serde_json::to_value(WitnessGraph {
                transmitter_address: vec![address.to_string(), "11w1".into()],
                witness_address: vec!["11w1".into(), "11w2".into()],
                hop: vec![1, 2],
                maker: vec![None, None],
                owner: vec![None, None],
                location: vec![None, None],
                first_block: vec![None, None],
            })
            .unwrap(),
        )
        .await;
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn health_check() {
        let app = router(state(ArtifactStore::in_memory()));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store"
        );
    }

    #[tokio::test]
    async fn entry_data_defaults_missing_rssi_vs_snr() {
        let artifacts = ArtifactStore::in_memory();
        seed(&artifacts, 7, "11abc").await;

        let (status, body) =
            get_json(router(state(artifacts)), "/api/issues/7/entries/11abc/data").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["witnessed_makers"]["n_witnessed"][0], 3);
        assert_eq!(body["hotspot_details"]["name"], "angry-purple-tiger");
        assert_eq!(body["rssi_vs_snr"]["rssi"], serde_json::json!([]));
        assert_eq!(body["rssi_vs_snr"]["snr"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn entry_data_for_unreported_address_is_not_found() {
        let (status, _) = get_json(
            router(state(ArtifactStore::in_memory())),
            "/api/issues/7/entries/11zzz/data",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn entry_graph_lists_nodes_then_edges() {
        let artifacts = ArtifactStore::in_memory();
        seed(&artifacts, 7, "11abc").await;

        let (status, body) =
            get_json(router(state(artifacts)), "/api/issues/7/entries/11abc/graph").await;

        assert_eq!(status, StatusCode::OK);
        let elements = body["elements"].as_array().unwrap();
        assert_eq!(elements.len(), 5);
        assert_eq!(elements[0]["data"]["id"], "11abc");
        assert_eq!(elements[0]["classes"], "red");
        assert_eq!(elements[2]["classes"], "green");
        assert_eq!(elements[3]["data"]["source"], "11abc");
        assert!(body["distance_vs_rssi_r2"].as_f64().unwrap() > 0.9);
    }
}
