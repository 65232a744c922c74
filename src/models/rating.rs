use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::payment::ItemType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: String,
    pub item_type: ItemType,
    pub item_id: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RatingDraft {
    pub item_type: ItemType,
    pub item_id: String,
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
}
