use serde::{Deserialize, Serialize};

use crate::models::payment::ItemType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    PayGig {
        id: String,
    },
    HireShop {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<f64>,
    },
    RateItem {
        item_type: ItemType,
        item_id: String,
        rating: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },
    CancelDelivery {
        id: String,
    },
    FocusShop {
        id: String,
    },
}
