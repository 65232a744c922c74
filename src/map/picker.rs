use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo;
use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickForm {
    Gig,
    Shop,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingPick {
    pub id: Uuid,
    pub form: PickForm,
    pub armed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickedLocation {
    pub pick_id: Uuid,
    pub form: PickForm,
    pub coords: GeoPoint,
    pub label: String,
}

pub struct LocationPicker {
    pending: DashMap<Uuid, PendingPick>,
    ttl: TimeDelta,
}

impl LocationPicker {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            pending: DashMap::new(),
            ttl: TimeDelta::from_std(ttl).unwrap_or_else(|_| TimeDelta::seconds(120)),
        }
    }

    pub fn arm(&self, form: PickForm, now: DateTime<Utc>) -> PendingPick {
        let pick = PendingPick {
            id: Uuid::new_v4(),
            form,
            armed_at: now,
            expires_at: now + self.ttl,
        };

        self.pending.insert(pick.id, pick.clone());
        debug!(pick_id = %pick.id, form = ?form, "location pick armed");
        pick
    }

    /// Consumes the pick. An out-of-range click leaves it armed.
    pub fn resolve(&self, id: Uuid, click: GeoPoint, now: DateTime<Utc>) -> Result<PickedLocation, AppError> {
        geo::validate(&click)?;

        let (_, pick) = self
            .pending
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("no pending location pick {id}")))?;

        if pick.expires_at <= now {
            return Err(AppError::Gone(format!("location pick {id} expired")));
        }

        debug!(pick_id = %id, lat = click.lat, lng = click.lng, "location picked");
        Ok(PickedLocation {
            pick_id: id,
            form: pick.form,
            coords: click,
            label: geo::coordinate_label(&click),
        })
    }

    pub fn cancel(&self, id: Uuid) -> Result<PendingPick, AppError> {
        self.pending
            .remove(&id)
            .map(|(_, pick)| pick)
            .ok_or_else(|| AppError::NotFound(format!("no pending location pick {id}")))
    }

    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, pick| pick.expires_at > now);
        before - self.pending.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeDelta, Utc};

    use super::{LocationPicker, PickForm};
    use crate::error::AppError;
    use crate::models::location::GeoPoint;

    const CLICK: GeoPoint = GeoPoint {
        lat: 48.856_61,
        lng: 2.352_22,
    };

    #[test]
    fn a_pick_resolves_exactly_once() {
        let picker = LocationPicker::new(Duration::from_secs(60));
        let now = Utc::now();
        let pick = picker.arm(PickForm::Gig, now);

        let picked = picker.resolve(pick.id, CLICK, now).unwrap();
        assert_eq!(picked.form, PickForm::Gig);
        assert_eq!(picked.coords, CLICK);
        assert_eq!(picked.label, "(48.8566, 2.3522)");

        assert!(matches!(
            picker.resolve(pick.id, CLICK, now),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn expired_pick_is_gone() {
        let picker = LocationPicker::new(Duration::from_secs(30));
        let now = Utc::now();
        let pick = picker.arm(PickForm::Shop, now);

        let late = now + TimeDelta::seconds(31);
        assert!(matches!(picker.resolve(pick.id, CLICK, late), Err(AppError::Gone(_))));
        assert_eq!(picker.pending_count(), 0);
    }

    #[test]
    fn invalid_click_keeps_the_pick_armed() {
        let picker = LocationPicker::new(Duration::from_secs(30));
        let now = Utc::now();
        let pick = picker.arm(PickForm::Gig, now);

        let bad = GeoPoint { lat: 95.0, lng: 0.0 };
        assert!(matches!(picker.resolve(pick.id, bad, now), Err(AppError::BadRequest(_))));
        assert!(picker.resolve(pick.id, CLICK, now).is_ok());
    }

    #[test]
    fn cancelled_pick_cannot_be_resolved() {
        let picker = LocationPicker::new(Duration::from_secs(30));
        let now = Utc::now();
        let pick = picker.arm(PickForm::Gig, now);

        picker.cancel(pick.id).unwrap();
        assert!(picker.resolve(pick.id, CLICK, now).is_err());
        assert!(picker.cancel(pick.id).is_err());
    }

    #[test]
    fn picks_for_different_forms_are_independent() {
        let picker = LocationPicker::new(Duration::from_secs(30));
        let now = Utc::now();
        let gig_pick = picker.arm(PickForm::Gig, now);
        let shop_pick = picker.arm(PickForm::Shop, now);

        let picked = picker.resolve(shop_pick.id, CLICK, now).unwrap();
        assert_eq!(picked.form, PickForm::Shop);
        assert_eq!(picker.pending_count(), 1);
        assert!(picker.cancel(gig_pick.id).is_ok());
    }

    #[test]
    fn sweep_drops_only_expired_picks() {
        let picker = LocationPicker::new(Duration::from_secs(30));
        let now = Utc::now();
        picker.arm(PickForm::Gig, now - TimeDelta::seconds(60));
        picker.arm(PickForm::Shop, now);

        assert_eq!(picker.sweep_expired(now), 1);
        assert_eq!(picker.pending_count(), 1);
    }
}
