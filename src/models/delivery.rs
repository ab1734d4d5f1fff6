use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    PickedUp,
    InTransit,
    Delivered,
    Failed,
    Returned,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "PENDING",
            DeliveryStatus::Assigned => "ASSIGNED",
            DeliveryStatus::PickedUp => "PICKED_UP",
            DeliveryStatus::InTransit => "IN_TRANSIT",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Failed => "FAILED",
            DeliveryStatus::Returned => "RETURNED",
        }
    }

    /// Statuses during which a courier is bound to the delivery.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Assigned | DeliveryStatus::PickedUp | DeliveryStatus::InTransit
        )
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub id: Uuid,
    pub source_order_id: Uuid,
    pub merchant_location_id: Uuid,
    pub zone_id: Uuid,
    pub origin_address: String,
    pub destination_address: String,
    pub destination: GeoPoint,
    pub status: DeliveryStatus,
    pub courier_id: Option<Uuid>,
    pub delivered_by: Option<Uuid>,
    pub distance_km: f64,
    pub fee: Decimal,
    pub currency: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryOrder {
    /// Bound courier, or the courier that completed it.
    pub fn is_handled_by(&self, courier_id: Uuid) -> bool {
        self.courier_id == Some(courier_id) || self.delivered_by == Some(courier_id)
    }
}
