pub mod picker;

use serde::Serialize;

use crate::error::AppError;
use crate::geo::Viewport;
use crate::models::action::Action;
use crate::models::gig::Gig;
use crate::models::location::GeoPoint;
use crate::models::payment::ItemType;
use crate::models::shop::Shop;
use crate::search::SearchQuery;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub id: String,
    pub kind: ItemType,
    pub position: GeoPoint,
    pub title: String,
    pub subtitle: String,
    pub paid: bool,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarkerLayers {
    pub gigs: Vec<Marker>,
    pub shops: Vec<Marker>,
}

pub fn build_layers(gigs: &[Gig], shops: &[Shop], query: &SearchQuery) -> MarkerLayers {
    MarkerLayers {
        gigs: gigs
            .iter()
            .filter(|gig| query.matches_gig(gig))
            .filter_map(gig_marker)
            .collect(),
        shops: shops
            .iter()
            .filter(|shop| query.matches_shop(shop))
            .filter_map(shop_marker)
            .collect(),
    }
}

pub fn focus_on_shop(shop: &Shop) -> Result<Viewport, AppError> {
    shop.coords.map(Viewport::focus).ok_or_else(|| {
        AppError::BadRequest(format!("shop {} has no coordinates to center on", shop.id))
    })
}

fn gig_marker(gig: &Gig) -> Option<Marker> {
    let position = gig.coords?;

    let subtitle = if gig.location.is_empty() {
        format!("{} Pi", gig.price)
    } else {
        format!("{} Pi · {}", gig.price, gig.location)
    };

    Some(Marker {
        id: gig.id.clone(),
        kind: ItemType::Gig,
        position,
        title: gig.title.clone(),
        subtitle,
        paid: gig.paid,
        actions: vec![Action::PayGig { id: gig.id.clone() }],
    })
}

fn shop_marker(shop: &Shop) -> Option<Marker> {
    let position = shop.coords?;

    let subtitle = if shop.services.is_empty() {
        shop.category.to_string()
    } else {
        format!("{} · {}", shop.category, shop.services)
    };

    Some(Marker {
        id: shop.id.clone(),
        kind: ItemType::Shop,
        position,
        title: shop.name.clone(),
        subtitle,
        paid: false,
        actions: vec![
            Action::HireShop {
                id: shop.id.clone(),
                amount: None,
            },
            Action::FocusShop {
                id: shop.id.clone(),
            },
        ],
    })
}
