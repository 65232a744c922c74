use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShopCategory {
    Supermarket,
    Repair,
    Auto,
    Restaurant,
    Electronics,
    Fashion,
    Other,
}

impl ShopCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShopCategory::Supermarket => "supermarket",
            ShopCategory::Repair => "repair",
            ShopCategory::Auto => "auto",
            ShopCategory::Restaurant => "restaurant",
            ShopCategory::Electronics => "electronics",
            ShopCategory::Fashion => "fashion",
            ShopCategory::Other => "other",
        }
    }
}

impl fmt::Display for ShopCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub id: String,
    pub name: String,
    pub category: ShopCategory,
    #[serde(default)]
    pub services: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub coords: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_hired_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_hire_amount: Option<f64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub total_ratings: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShopDraft {
    pub name: String,
    pub category: ShopCategory,
    #[serde(default)]
    pub services: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub coords: Option<GeoPoint>,
}
