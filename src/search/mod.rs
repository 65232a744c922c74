use crate::models::gig::Gig;
use crate::models::shop::Shop;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    needle: Option<String>,
}

impl SearchQuery {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self { needle: None };
        }

        Self {
            needle: Some(trimmed.to_lowercase()),
        }
    }

    pub fn from_option(raw: Option<&str>) -> Self {
        raw.map(Self::new).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_none()
    }

    pub fn as_str(&self) -> &str {
        self.needle.as_deref().unwrap_or("")
    }

    fn matches_any(&self, fields: &[&str]) -> bool {
        match &self.needle {
            None => true,
            Some(needle) => fields
                .iter()
                .any(|field| field.to_lowercase().contains(needle.as_str())),
        }
    }

    pub fn matches_gig(&self, gig: &Gig) -> bool {
        self.matches_any(&[&gig.title, &gig.location])
    }

    pub fn matches_shop(&self, shop: &Shop) -> bool {
        self.matches_any(&[&shop.name, shop.category.as_str(), &shop.services])
    }
}

pub fn filter_gigs<'a>(gigs: &'a [Gig], query: &SearchQuery) -> Vec<&'a Gig> {
    gigs.iter().filter(|gig| query.matches_gig(gig)).collect()
}

pub fn filter_shops<'a>(shops: &'a [Shop], query: &SearchQuery) -> Vec<&'a Shop> {
    shops.iter().filter(|shop| query.matches_shop(shop)).collect()
}
