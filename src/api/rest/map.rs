use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::SearchParams;
use crate::error::AppError;
use crate::geo::{self, Viewport};
use crate::map::picker::{PendingPick, PickForm, PickedLocation};
use crate::map::{self, MarkerLayers};
use crate::models::location::GeoPoint;
use crate::search::SearchQuery;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/map/markers", get(markers))
        .route("/map/viewport", get(viewport))
        .route("/map/picks", post(arm_pick))
        .route("/map/picks/:id", delete(cancel_pick))
        .route("/map/picks/:id/click", post(resolve_pick))
}

#[derive(Deserialize)]
pub struct ViewportParams {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Deserialize)]
pub struct ArmPickRequest {
    pub form: PickForm,
}

async fn markers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<MarkerLayers>, AppError> {
    let gigs = state.store.gigs(&SearchQuery::default())?;
    let shops = state.store.shops(&SearchQuery::default())?;
    Ok(Json(map::build_layers(&gigs, &shops, &params.query())))
}

async fn viewport(Query(params): Query<ViewportParams>) -> Result<Json<Viewport>, AppError> {
    let user_location = match (params.lat, params.lng) {
        (Some(lat), Some(lng)) => {
            let point = GeoPoint { lat, lng };
            geo::validate(&point)?;
            Some(point)
        }
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "lat and lng must be given together".to_string(),
            ));
        }
    };

    Ok(Json(geo::initial_viewport(user_location)))
}

async fn arm_pick(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ArmPickRequest>,
) -> Json<PendingPick> {
    Json(state.picker.arm(payload.form, Utc::now()))
}

async fn resolve_pick(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(click): Json<GeoPoint>,
) -> Result<Json<PickedLocation>, AppError> {
    Ok(Json(state.picker.resolve(id, click, Utc::now())?))
}

async fn cancel_pick(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PendingPick>, AppError> {
    Ok(Json(state.picker.cancel(id)?))
}
