use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tracing::debug;

use crate::error::AppError;
use crate::flow::{PaymentOutcome, PaymentRequest};
use crate::geo::Viewport;
use crate::map;
use crate::models::action::Action;
use crate::models::delivery::DeliveryBlock;
use crate::models::payment::ItemType;
use crate::models::rating::{Rating, RatingDraft};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/actions", post(dispatch_action))
}

#[derive(Debug, Serialize)]
#[serde(tag = "result", content = "data", rename_all = "snake_case")]
pub enum ActionResult {
    Payment(PaymentOutcome),
    Rating(Rating),
    Cancelled(DeliveryBlock),
    Focus(Viewport),
}

pub async fn dispatch(state: &AppState, action: Action) -> Result<ActionResult, AppError> {
    debug!(?action, "dispatching action");

    match action {
        Action::PayGig { id } => {
            let request = PaymentRequest {
                item_type: ItemType::Gig,
                item_id: id,
                amount: None,
            };
            Ok(ActionResult::Payment(state.flows.pay(&state.store, request).await?))
        }
        Action::HireShop { id, amount } => {
            let request = PaymentRequest {
                item_type: ItemType::Shop,
                item_id: id,
                amount,
            };
            Ok(ActionResult::Payment(state.flows.pay(&state.store, request).await?))
        }
        Action::RateItem {
            item_type,
            item_id,
            rating,
            comment,
        } => {
            let draft = RatingDraft {
                item_type,
                item_id,
                rating,
                comment,
            };
            Ok(ActionResult::Rating(state.flows.submit_rating(&state.store, draft)?))
        }
        Action::CancelDelivery { id } => Ok(ActionResult::Cancelled(state.store.cancel_delivery(&id)?)),
        Action::FocusShop { id } => {
            let shop = state.store.shop(&id)?;
            Ok(ActionResult::Focus(map::focus_on_shop(&shop)?))
        }
    }
}

async fn dispatch_action(
    State(state): State<Arc<AppState>>,
    Json(action): Json<Action>,
) -> Result<Json<ActionResult>, AppError> {
    Ok(Json(dispatch(&state, action).await?))
}
