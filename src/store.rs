use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::schemas::Trip;

/// Whole-document storage for trips, keyed by trip id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn load(&self, trip_id: &str) -> Result<Option<Trip>>;

    /// Writes `trip` only if the stored copy is still at `expected_version`
    /// (0 when nothing has been stored yet). Returns `false` when another
    /// writer got there first and nothing was written.
    async fn save(&self, trip: &Trip, expected_version: u64) -> Result<bool>;
}

/// Keeps trips in process memory. Used when no database is configured.
#[derive(Default)]
pub struct MemoryStore {
    trips: RwLock<HashMap<String, Trip>>,
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self, trip_id: &str) -> Result<Option<Trip>> {
        Ok(self.trips.read().await.get(trip_id).cloned())
    }

    async fn save(&self, trip: &Trip, expected_version: u64) -> Result<bool> {
        let mut trips = self.trips.write().await;
        let stored_version = trips.get(&trip.id).map_or(0, |t| t.version);
        if stored_version != expected_version {
            return Ok(false);
        }
        trips.insert(trip.id.clone(), trip.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(id: &str, version: u64) -> Trip {
        Trip {
            id: id.to_string(),
            version,
            ..Trip::default()
        }
    }

    #[tokio::test]
    async fn missing_trip_loads_as_none() {
        let store = MemoryStore::default();
        assert_eq!(store.load("nowhere").await.unwrap(), None);
    }

    #[tokio::test]
    async fn first_write_expects_version_zero() {
        let store = MemoryStore::default();
        assert!(!store.save(&trip("a", 1), 3).await.unwrap());
        assert!(store.save(&trip("a", 1), 0).await.unwrap());
        assert_eq!(store.load("a").await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn stale_writes_are_refused() {
        let store = MemoryStore::default();
        assert!(store.save(&trip("a", 1), 0).await.unwrap());
        assert!(store.save(&trip("a", 2), 1).await.unwrap());
        assert!(!store.save(&trip("a", 2), 1).await.unwrap());
        assert!(!store.save(&trip("a", 1), 0).await.unwrap());
        assert_eq!(store.load("a").await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn trips_are_independent() {
        let store = MemoryStore::default();
        assert!(store.save(&trip("a", 1), 0).await.unwrap());
        assert!(store.save(&trip("b", 1), 0).await.unwrap());
        assert_eq!(store.load("b").await.unwrap().unwrap().id, "b");
    }
}
