use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::delivery::DeliveryStatus;
use crate::models::tracking::TrackingEvent;

/// Append-only per-delivery event log.
#[derive(Default)]
pub struct TrackingLedger {
    events: DashMap<Uuid, Vec<TrackingEvent>>,
}

impl TrackingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &self,
        delivery_id: Uuid,
        status: DeliveryStatus,
        position: Option<GeoPoint>,
        note: Option<String>,
    ) -> TrackingEvent {
        let event = TrackingEvent {
            delivery_id,
            status,
            position,
            note,
            recorded_at: Utc::now(),
        };

        self.events
            .entry(delivery_id)
            .or_default()
            .push(event.clone());
        event
    }

    pub fn history(&self, delivery_id: Uuid) -> Vec<TrackingEvent> {
        self.events
            .get(&delivery_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}
