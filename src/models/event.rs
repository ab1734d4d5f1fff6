use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::DeliveryStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    StatusChanged {
        delivery_id: Uuid,
        previous_status: DeliveryStatus,
        new_status: DeliveryStatus,
        courier_id: Option<Uuid>,
        at: DateTime<Utc>,
    },
    CourierAvailability {
        courier_id: Uuid,
        available: bool,
        at: DateTime<Utc>,
    },
}

impl DispatchEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchEvent::StatusChanged { .. } => "status_changed",
            DispatchEvent::CourierAvailability { .. } => "courier_availability",
        }
    }

    /// Whether a courier's own notification stream should carry this event.
    pub fn concerns_courier(&self, courier: Uuid) -> bool {
        match self {
            DispatchEvent::StatusChanged { courier_id, .. } => *courier_id == Some(courier),
            DispatchEvent::CourierAvailability { courier_id, .. } => *courier_id == courier,
        }
    }
}
