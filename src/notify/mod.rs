use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::delivery::DeliveryStatus;
use crate::models::event::DispatchEvent;

/// Fire-and-forget fan-out of dispatch events to whoever is listening.
pub struct NotificationBridge {
    tx: broadcast::Sender<DispatchEvent>,
}

impl NotificationBridge {
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(buffer_size.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: DispatchEvent) {
        // No receivers is fine; dispatch never waits on listeners.
        if self.tx.send(event).is_err() {
            debug!("dispatch event dropped: no subscribers");
        }
    }

    pub fn status_changed(
        &self,
        delivery_id: Uuid,
        previous_status: DeliveryStatus,
        new_status: DeliveryStatus,
        courier_id: Option<Uuid>,
    ) {
        self.publish(DispatchEvent::StatusChanged {
            delivery_id,
            previous_status,
            new_status,
            courier_id,
            at: Utc::now(),
        });
    }

    pub fn courier_availability(&self, courier_id: Uuid, available: bool) {
        self.publish(DispatchEvent::CourierAvailability {
            courier_id,
            available,
            at: Utc::now(),
        });
    }
}
