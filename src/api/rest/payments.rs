use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;

use crate::error::AppError;
use crate::flow::{FlowPhase, PaymentOutcome, PaymentRequest};
use crate::models::payment::ItemType;
use crate::models::rating::{Rating, RatingDraft};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payments", post(create_payment))
        .route("/ratings", post(create_rating))
        .route("/ratings/:item_type/:item_id", get(list_ratings))
        .route(
            "/flows/:item_type/:item_id",
            get(flow_phase).delete(dismiss_prompt),
        )
}

async fn create_payment(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PaymentRequest>,
) -> Result<Json<PaymentOutcome>, AppError> {
    let outcome = state.flows.pay(&state.store, payload).await?;
    Ok(Json(outcome))
}

async fn create_rating(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RatingDraft>,
) -> Result<Json<Rating>, AppError> {
    Ok(Json(state.flows.submit_rating(&state.store, payload)?))
}

async fn list_ratings(
    State(state): State<Arc<AppState>>,
    Path((item_type, item_id)): Path<(ItemType, String)>,
) -> Result<Json<Vec<Rating>>, AppError> {
    Ok(Json(state.store.ratings_for(item_type, &item_id)?))
}

async fn flow_phase(
    State(state): State<Arc<AppState>>,
    Path((item_type, item_id)): Path<(ItemType, String)>,
) -> Json<FlowPhase> {
    Json(state.flows.phase(item_type, &item_id))
}

async fn dismiss_prompt(
    State(state): State<Arc<AppState>>,
    Path((item_type, item_id)): Path<(ItemType, String)>,
) -> Json<FlowPhase> {
    Json(state.flows.dismiss(item_type, &item_id))
}
