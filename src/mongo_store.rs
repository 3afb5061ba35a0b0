use async_trait::async_trait;
use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client, Collection, IndexModel,
};
use tracing::{debug, info};

use crate::error::Result;
use crate::schemas::Trip;
use crate::store::DocumentStore;

const DUPLICATE_KEY: i32 = 11000;

/// Trips stored one document each in the `Trips` collection.
pub struct MongoStore {
    trips: Collection<Trip>,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let trips = client.database(database).collection::<Trip>("Trips");

        // Two clients seeding the same trip must not both succeed
        let unique_id = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        trips.create_index(unique_id, None).await?;
        info!(database, "Connected to MongoDB");

        Ok(Self { trips })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn load(&self, trip_id: &str) -> Result<Option<Trip>> {
        Ok(self.trips.find_one(doc! { "id": trip_id }, None).await?)
    }

    async fn save(&self, trip: &Trip, expected_version: u64) -> Result<bool> {
        if expected_version == 0 {
            return match self.trips.insert_one(trip, None).await {
                Ok(_) => Ok(true),
                Err(err) if is_duplicate_key(&err) => {
                    debug!(trip = %trip.id, "Trip was created by another writer");
                    Ok(false)
                }
                Err(err) => Err(err.into()),
            };
        }

        let result = self
            .trips
            .replace_one(
                doc! { "id": trip.id.as_str(), "version": expected_version as i64 },
                trip,
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}
