use serde::Serialize;

use crate::error::AppError;
use crate::models::location::GeoPoint;

pub const DEFAULT_CENTER: GeoPoint = GeoPoint { lat: 20.0, lng: 0.0 };
pub const WORLD_ZOOM: u8 = 2;
pub const USER_ZOOM: u8 = 13;
pub const FOCUS_ZOOM: u8 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub center: GeoPoint,
    pub zoom: u8,
}

impl Viewport {
    pub fn world() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: WORLD_ZOOM,
        }
    }

    pub fn around_user(location: GeoPoint) -> Self {
        Self {
            center: location,
            zoom: USER_ZOOM,
        }
    }

    pub fn focus(point: GeoPoint) -> Self {
        Self {
            center: point,
            zoom: FOCUS_ZOOM,
        }
    }
}

pub fn initial_viewport(user_location: Option<GeoPoint>) -> Viewport {
    match user_location {
        Some(location) => Viewport::around_user(location),
        None => Viewport::world(),
    }
}

pub fn validate(point: &GeoPoint) -> Result<(), AppError> {
    if !point.lat.is_finite() || !(-90.0..=90.0).contains(&point.lat) {
        return Err(AppError::BadRequest(format!(
            "latitude {} is outside [-90, 90]",
            point.lat
        )));
    }

    if !point.lng.is_finite() || !(-180.0..=180.0).contains(&point.lng) {
        return Err(AppError::BadRequest(format!(
            "longitude {} is outside [-180, 180]",
            point.lng
        )));
    }

    Ok(())
}

pub fn validate_optional(point: Option<&GeoPoint>) -> Result<(), AppError> {
    point.map_or(Ok(()), validate)
}

pub fn coordinate_label(point: &GeoPoint) -> String {
    format!("({:.4}, {:.4})", point.lat, point.lng)
}

#[cfg(test)]
mod tests {
    use super::{coordinate_label, initial_viewport, validate, Viewport, DEFAULT_CENTER};
    use crate::models::location::GeoPoint;

    #[test]
    fn label_rounds_to_four_decimals() {
        let p = GeoPoint {
            lat: 53.551_086,
            lng: -9.993_682,
        };
        assert_eq!(coordinate_label(&p), "(53.5511, -9.9937)");
    }

    #[test]
    fn unknown_user_location_shows_the_world() {
        let viewport = initial_viewport(None);
        assert_eq!(viewport.center, DEFAULT_CENTER);
        assert_eq!(viewport.zoom, 2);
    }

    #[test]
    fn known_user_location_zooms_in() {
        let berlin = GeoPoint {
            lat: 52.52,
            lng: 13.405,
        };
        let viewport = initial_viewport(Some(berlin));
        assert_eq!(viewport.center, berlin);
        assert_eq!(viewport.zoom, 13);
        assert!(Viewport::focus(berlin).zoom > viewport.zoom);
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        assert!(validate(&GeoPoint { lat: 91.0, lng: 0.0 }).is_err());
        assert!(validate(&GeoPoint { lat: 0.0, lng: -180.5 }).is_err());
        assert!(validate(&GeoPoint {
            lat: f64::NAN,
            lng: 0.0
        })
        .is_err());
        assert!(validate(&GeoPoint {
            lat: -90.0,
            lng: 180.0
        })
        .is_ok());
    }
}
