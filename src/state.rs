use crate::external::Collaborators;
use crate::notify::NotificationBridge;
use crate::observability::metrics::Metrics;
use crate::registry::{CourierDirectory, ServiceAreaRegistry};
use crate::store::{DeliveryStore, ProofOfDeliveryStore, TrackingLedger};

#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub event_buffer_size: usize,
    pub default_claim_radius_km: f64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            event_buffer_size: 1024,
            default_claim_radius_km: 50.0,
        }
    }
}

pub struct AppState {
    pub zones: ServiceAreaRegistry,
    pub couriers: CourierDirectory,
    pub deliveries: DeliveryStore,
    pub tracking: TrackingLedger,
    pub proofs: ProofOfDeliveryStore,
    pub notifications: NotificationBridge,
    pub external: Collaborators,
    pub settings: DispatchSettings,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(settings: DispatchSettings, external: Collaborators) -> Self {
        Self {
            zones: ServiceAreaRegistry::new(),
            couriers: CourierDirectory::new(),
            deliveries: DeliveryStore::new(),
            tracking: TrackingLedger::new(),
            proofs: ProofOfDeliveryStore::new(),
            notifications: NotificationBridge::new(settings.event_buffer_size),
            external,
            settings,
            metrics: Metrics::new(),
        }
    }
}
