pub mod actions;
pub mod deliveries;
pub mod gigs;
pub mod map;
pub mod payments;
pub mod shops;
pub mod ws;

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::error::AppError;
use crate::render::{self, ViewSnapshot};
use crate::search::SearchQuery;
use crate::state::AppState;
use crate::store::{DemoSummary, StoreCounts};

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/", get(api_root))
        .route("/demo", post(load_demo))
        .route("/view", get(view))
        .merge(gigs::router())
        .merge(shops::router())
        .merge(deliveries::router())
        .merge(payments::router())
        .merge(map::router())
        .merge(actions::router());

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, AppError> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let allowed = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|err| AppError::Internal(format!("invalid CORS origin {origin}: {err}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(layer.allow_origin(allowed))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
}

impl SearchParams {
    pub fn query(&self) -> SearchQuery {
        SearchQuery::from_option(self.search.as_deref())
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(flatten)]
    counts: StoreCounts,
    pending_picks: usize,
}

async fn api_root() -> Json<serde_json::Value> {
    Json(json!({ "message": "GigPi API up" }))
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, AppError> {
    Ok(Json(HealthResponse {
        status: "ok",
        counts: state.store.counts()?,
        pending_picks: state.picker.pending_count(),
    }))
}

async fn load_demo(State(state): State<Arc<AppState>>) -> Result<Json<DemoSummary>, AppError> {
    Ok(Json(state.store.load_demo_data()?))
}

async fn view(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ViewSnapshot>, AppError> {
    Ok(Json(render::render(&state.store, &params.query())?))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
