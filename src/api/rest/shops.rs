use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::api::rest::SearchParams;
use crate::error::AppError;
use crate::geo::Viewport;
use crate::map;
use crate::models::shop::{Shop, ShopDraft};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shops", get(list_shops).post(create_shop))
        .route("/shops/:id", get(get_shop))
        .route("/shops/:id/viewport", get(shop_viewport))
}

async fn create_shop(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ShopDraft>,
) -> Result<Json<Shop>, AppError> {
    let shop = state.store.create_shop(payload)?;
    Ok(Json(shop))
}

async fn list_shops(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Shop>>, AppError> {
    let shops = state.store.shops(&params.query())?;
    Ok(Json(shops))
}

async fn get_shop(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Shop>, AppError> {
    Ok(Json(state.store.shop(&id)?))
}

async fn shop_viewport(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Viewport>, AppError> {
    let shop = state.store.shop(&id)?;
    Ok(Json(map::focus_on_shop(&shop)?))
}
