use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{Result, TripError};
use crate::exchange::{settle_trip, Settlement};
use crate::mutations::{self, Mutation};
use crate::schemas::{Trip, TripInfo};
use crate::store::DocumentStore;

const SUBSCRIBER_BACKLOG: usize = 16;

/// Owns the read-modify-write cycle against the store and fans every new
/// snapshot out to subscribers of that trip.
pub struct TripController {
    store: Arc<dyn DocumentStore>,
    info: TripInfo,
    write_retries: usize,
    channels: Mutex<HashMap<String, broadcast::Sender<Arc<Trip>>>>,
}

impl TripController {
    pub fn new(store: Arc<dyn DocumentStore>, info: TripInfo, write_retries: usize) -> Self {
        Self {
            store,
            info,
            write_retries,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Current state of the trip, writing the default document the first
    /// time the trip is opened.
    pub async fn snapshot(&self, trip_id: &str) -> Result<Trip> {
        if let Some(trip) = self.store.load(trip_id).await? {
            return Ok(trip);
        }

        let mut trip = Trip::seeded(trip_id, self.info.clone());
        trip.version = 1;
        trip.updated_at = Some(Utc::now());
        if self.store.save(&trip, 0).await? {
            info!(trip = trip_id, "Created trip with default contents");
            self.publish(&trip);
            return Ok(trip);
        }

        // Somebody else created it in the meantime
        self.store
            .load(trip_id)
            .await?
            .ok_or_else(|| TripError::Conflict {
                trip: trip_id.to_string(),
                expected: 0,
            })
    }

    /// Applies `mutation` and persists the result.
    ///
    /// With `expected_version` the write only happens if the trip is still at
    /// that version. Without it, losing a race re-applies the mutation on the
    /// fresh snapshot, up to the configured number of retries.
    pub async fn apply(
        &self,
        trip_id: &str,
        mutation: &Mutation,
        actor: &str,
        expected_version: Option<u64>,
    ) -> Result<Trip> {
        let mut last_seen = 0;
        for attempt in 0..=self.write_retries {
            let current = self.snapshot(trip_id).await?;
            last_seen = current.version;
            if let Some(expected) = expected_version {
                if current.version != expected {
                    return Err(TripError::Conflict {
                        trip: trip_id.to_string(),
                        expected,
                    });
                }
            }

            let mut next = mutations::apply(&current, mutation, actor)?;
            if next == current {
                debug!(trip = trip_id, ?mutation, "Mutation changed nothing");
                return Ok(current);
            }
            next.version = current.version + 1;
            next.updated_at = Some(Utc::now());

            if self.store.save(&next, current.version).await? {
                info!(trip = trip_id, version = next.version, actor, "Saved trip");
                self.publish(&next);
                return Ok(next);
            }
            if expected_version.is_some() {
                break;
            }
            warn!(trip = trip_id, attempt, "Concurrent write detected, retrying");
        }

        Err(TripError::Conflict {
            trip: trip_id.to_string(),
            expected: expected_version.unwrap_or(last_seen),
        })
    }

    pub async fn settlement(&self, trip_id: &str) -> Result<Settlement> {
        let trip = self.snapshot(trip_id).await?;
        let settlement = settle_trip(&trip);
        debug!(
            trip = trip_id,
            transfers = settlement.transfers.len(),
            residue = settlement.balances.total(),
            "Computed settlement"
        );
        Ok(settlement)
    }

    /// Receives every snapshot of the trip written through this controller.
    pub fn subscribe(&self, trip_id: &str) -> broadcast::Receiver<Arc<Trip>> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(trip_id.to_string())
            .or_insert_with(|| broadcast::channel(SUBSCRIBER_BACKLOG).0)
            .subscribe()
    }

    fn publish(&self, trip: &Trip) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sender) = channels.get(&trip.id) {
            if sender.send(Arc::new(trip.clone())).is_err() {
                // Everybody left
                channels.remove(&trip.id);
            }
        }
    }
}
