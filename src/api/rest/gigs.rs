use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::api::rest::SearchParams;
use crate::error::AppError;
use crate::models::gig::{Gig, GigDraft};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/gigs", get(list_gigs).post(create_gig))
        .route("/gigs/:id", get(get_gig))
}

async fn create_gig(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GigDraft>,
) -> Result<Json<Gig>, AppError> {
    let gig = state.store.create_gig(payload)?;
    Ok(Json(gig))
}

async fn list_gigs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Gig>>, AppError> {
    let gigs = state.store.gigs(&params.query())?;
    Ok(Json(gigs))
}

async fn get_gig(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Gig>, AppError> {
    Ok(Json(state.store.gig(&id)?))
}
