use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::delivery::DeliveryStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub delivery_id: Uuid,
    pub status: DeliveryStatus,
    pub position: Option<GeoPoint>,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
