pub mod file;
pub mod memory;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::StorageError;

pub use file::FileStorage;
pub use memory::MemoryStorage;
#[cfg(test)]
pub(crate) use memory::FlakyStorage;

pub trait Storage: Send + Sync {
    /// Raw text stored under `key`, if any. Never an error: unreadable
    /// storage reads as empty.
    fn read(&self, key: &str) -> Option<String>;

    fn write(&self, key: &str, contents: &str) -> Result<(), StorageError>;
}

pub fn load<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Vec<T> {
    let Some(raw) = storage.read(key) else {
        return Vec::new();
    };

    if raw.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<T>>(&raw) {
        Ok(records) => records,
        Err(err) => {
            warn!(key, error = %err, "stored collection is malformed; starting empty");
            Vec::new()
        }
    }
}

pub fn save<T: Serialize>(storage: &dyn Storage, key: &str, records: &[T]) -> Result<(), StorageError> {
    let encoded = serde_json::to_string(records).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;

    storage.write(key, &encoded)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{load, save, MemoryStorage, Storage};
    use crate::models::gig::Gig;
    use crate::models::location::GeoPoint;

    fn sample_gigs() -> Vec<Gig> {
        vec![
            Gig {
                id: "g-1".to_string(),
                title: "Deliver groceries".to_string(),
                description: String::new(),
                price: 5.0,
                location: "City Center".to_string(),
                coords: Some(GeoPoint {
                    lat: 52.52,
                    lng: 13.405,
                }),
                created_at: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
                paid: true,
                paid_at: Some(Utc.with_ymd_and_hms(2025, 1, 2, 4, 0, 0).unwrap()),
                rating: Some(4),
            },
            Gig {
                id: "g-2".to_string(),
                title: "Pick up laundry".to_string(),
                description: "two bags".to_string(),
                price: 3.0,
                location: "North Market".to_string(),
                coords: None,
                created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                paid: false,
                paid_at: None,
                rating: None,
            },
        ]
    }

    #[test]
    fn saved_collection_loads_back_unchanged() {
        let storage = MemoryStorage::new();
        let gigs = sample_gigs();

        save(&storage, "gigs", &gigs).unwrap();
        let loaded: Vec<Gig> = load(&storage, "gigs");

        assert_eq!(loaded, gigs);
    }

    #[test]
    fn missing_collection_is_empty() {
        let storage = MemoryStorage::new();
        let loaded: Vec<Gig> = load(&storage, "gigs");
        assert!(loaded.is_empty());
    }

    #[test]
    fn malformed_collection_is_empty_not_an_error() {
        let storage = MemoryStorage::new();
        storage.write("gigs", "{not json").unwrap();
        let loaded: Vec<Gig> = load(&storage, "gigs");
        assert!(loaded.is_empty());

        storage.write("gigs", r#"[{"id": 7}]"#).unwrap();
        let loaded: Vec<Gig> = load(&storage, "gigs");
        assert!(loaded.is_empty());
    }

    #[test]
    fn records_missing_optional_fields_still_load() {
        let storage = MemoryStorage::new();
        storage
            .write(
                "gigs",
                r#"[{"id":"g-x","title":"Old","price":1.5,"created_at":"2024-05-01T10:00:00Z"}]"#,
            )
            .unwrap();

        let loaded: Vec<Gig> = load(&storage, "gigs");
        assert_eq!(loaded.len(), 1);
        assert!(!loaded[0].paid);
        assert!(loaded[0].coords.is_none());
        assert_eq!(loaded[0].location, "");
    }
}
