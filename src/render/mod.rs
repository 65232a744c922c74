use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::map::{self, MarkerLayers};
use crate::models::action::Action;
use crate::models::delivery::{DeliveryBlock, DeliveryStatus};
use crate::models::gig::Gig;
use crate::models::shop::Shop;
use crate::search::SearchQuery;
use crate::store::{RecordKind, RecordStore, StoreEvent};

#[derive(Debug, Clone, Serialize)]
pub struct GigItem {
    #[serde(flatten)]
    pub gig: Gig,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShopProfile {
    #[serde(flatten)]
    pub shop: Shop,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryItem {
    #[serde(flatten)]
    pub block: DeliveryBlock,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub query: String,
    pub gigs: Vec<GigItem>,
    pub gig_count: usize,
    pub shop_profile: Option<ShopProfile>,
    pub shop_count: usize,
    pub deliveries: Vec<DeliveryItem>,
    pub markers: MarkerLayers,
    pub rendered_at: DateTime<Utc>,
}

pub fn render(store: &RecordStore, query: &SearchQuery) -> Result<ViewSnapshot, AppError> {
    let all_gigs = store.gigs(&SearchQuery::default())?;
    let all_shops = store.shops(&SearchQuery::default())?;

    let gigs: Vec<GigItem> = all_gigs
        .iter()
        .filter(|gig| query.matches_gig(gig))
        .map(|gig| GigItem {
            gig: gig.clone(),
            actions: vec![Action::PayGig { id: gig.id.clone() }],
        })
        .collect();

    let matching_shops: Vec<&Shop> = all_shops.iter().filter(|shop| query.matches_shop(shop)).collect();
    let shop_profile = matching_shops.first().map(|shop| ShopProfile {
        shop: (*shop).clone(),
        actions: vec![
            Action::HireShop {
                id: shop.id.clone(),
                amount: None,
            },
            Action::FocusShop {
                id: shop.id.clone(),
            },
        ],
    });

    let deliveries = store
        .deliveries()?
        .into_iter()
        .map(|block| {
            let actions = if block.status == DeliveryStatus::Active {
                vec![Action::CancelDelivery {
                    id: block.id.clone(),
                }]
            } else {
                Vec::new()
            };
            DeliveryItem { block, actions }
        })
        .collect();

    Ok(ViewSnapshot {
        query: query.as_str().to_string(),
        gig_count: gigs.len(),
        gigs,
        shop_count: matching_shops.len(),
        shop_profile,
        deliveries,
        markers: map::build_layers(&all_gigs, &all_shops, query),
        rendered_at: Utc::now(),
    })
}

pub fn is_visible_change(event: &StoreEvent) -> bool {
    matches!(
        event.kind,
        RecordKind::Gig | RecordKind::Shop | RecordKind::Delivery
    )
}
