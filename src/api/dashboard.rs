//! Dashboard API routes.
//!
//! The `codes` query parameter doubles as the share-link format: a dashboard
//! URL carries the whole portfolio, so refreshing (or bookmarking) a link
//! reproduces the same view with fresh data.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::benchmarks;
use crate::models::{DashboardSnapshot, IndexReading};
use crate::portfolio::{normalize_symbol, Portfolio};
use crate::returns::month_start_jst;
use crate::scrapers::chart_api::Quote;
use crate::snapshot::{build_snapshot, SnapshotDeps};

pub fn app(state: SnapshotDeps) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/quote", get(get_quote))
        .route("/api/benchmarks", get(get_benchmarks))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// JSON error body with the right status code
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    /// `code[:shares]` list; falls back to the configured default portfolio
    pub codes: Option<String>,
}

async fn get_dashboard(
    State(state): State<SnapshotDeps>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardSnapshot>, ApiError> {
    let codes = query
        .codes
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| state.config.default_codes.clone());

    let portfolio =
        Portfolio::parse(&codes).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let snapshot = build_snapshot(&state, &portfolio).await.map_err(|e| {
        warn!(error = %e, "snapshot build failed");
        ApiError::bad_gateway(e.to_string())
    })?;

    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub symbol: String,
}

async fn get_quote(
    State(state): State<SnapshotDeps>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<Quote>, ApiError> {
    let symbol = normalize_symbol(&query.symbol);
    state
        .chart
        .fetch_quote(&symbol)
        .await
        .map(Json)
        .map_err(|e| ApiError::not_found(format!("no quote for {symbol}: {e}")))
}

#[derive(Debug, Serialize)]
struct BenchmarksResponse {
    nikkei: IndexReading,
    topix: IndexReading,
}

async fn get_benchmarks(State(state): State<SnapshotDeps>) -> Json<BenchmarksResponse> {
    let month_start = month_start_jst(Utc::now());
    let (nikkei, topix) = tokio::join!(
        benchmarks::fetch_nikkei(state.chart.clone(), month_start),
        benchmarks::fetch_topix(
            state.chart.clone(),
            state.http.clone(),
            &state.config,
            month_start
        )
    );
    Json(BenchmarksResponse { nikkei, topix })
}

/// Health check endpoint
async fn health() -> &'static str {
    "📈 kabuwatch operational"
}
