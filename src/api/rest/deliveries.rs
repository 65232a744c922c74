use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{delete, get};
use axum::Json;
use axum::Router;

use crate::error::AppError;
use crate::models::delivery::{DeliveryBlock, DeliveryDraft};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/delivery-blocks", get(list_blocks).post(start_block))
        .route("/delivery-blocks/:id", delete(cancel_block))
}

async fn start_block(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DeliveryDraft>,
) -> Result<Json<DeliveryBlock>, AppError> {
    Ok(Json(state.store.start_delivery(payload)?))
}

async fn list_blocks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<DeliveryBlock>>, AppError> {
    Ok(Json(state.store.deliveries()?))
}

async fn cancel_block(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeliveryBlock>, AppError> {
    Ok(Json(state.store.cancel_delivery(&id)?))
}
