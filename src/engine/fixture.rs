use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::engine::dispatch::{self, CreateDeliveryRequest};
use crate::external::{
    Collaborators, FileStorage, InMemoryLocations, InMemoryOrders, LocalFileStorage,
    MerchantLocation, OrderRef,
};
use crate::geo::{offset_north, GeoPoint};
use crate::models::courier::VerificationStatus;
use crate::models::delivery::DeliveryOrder;
use crate::models::zone::ServiceZone;
use crate::registry::couriers::CourierDraft;
use crate::registry::zones::ZoneDraft;
use crate::state::{AppState, DispatchSettings};

pub const ZONE_CENTER: GeoPoint = GeoPoint { lat: 6.5, lng: 3.3 };

/// Zone of radius 5 km priced at 500 + 50/km, with one merchant at its center.
pub struct Fixture {
    pub state: Arc<AppState>,
    pub orders: Arc<InMemoryOrders>,
    pub locations: Arc<InMemoryLocations>,
    pub zone: ServiceZone,
    pub merchant: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_storage(Arc::new(LocalFileStorage::unconfigured()))
    }

    pub fn with_storage(storage: Arc<dyn FileStorage>) -> Self {
        let orders = Arc::new(InMemoryOrders::new());
        let locations = Arc::new(InMemoryLocations::new());
        let state = Arc::new(AppState::new(
            DispatchSettings::default(),
            Collaborators {
                orders: orders.clone(),
                locations: locations.clone(),
                storage,
            },
        ));

        let zone = state
            .zones
            .create_zone(ZoneDraft {
                name: "Ikeja".to_string(),
                center: ZONE_CENTER,
                radius_km: 5.0,
                base_fee: Decimal::new(500, 0),
                fee_per_km: Decimal::new(50, 0),
                max_distance_km: None,
                min_order_amount: None,
                surge: false,
                active: true,
            })
            .unwrap();

        let fixture = Self {
            state,
            orders,
            locations,
            zone,
            merchant: Uuid::new_v4(),
        };
        fixture.add_merchant(fixture.merchant, Some(ZONE_CENTER));
        fixture
    }

    pub fn add_merchant(&self, id: Uuid, coordinates: Option<GeoPoint>) {
        self.locations.upsert(MerchantLocation {
            id,
            address: "12 Awolowo Way".to_string(),
            coordinates,
            currency: "NGN".to_string(),
        });
        self.state
            .zones
            .assign_merchant_to_zone(id, Some(self.zone.id))
            .unwrap();
    }

    pub fn order_for(&self, merchant: Uuid) -> Uuid {
        let order_id = Uuid::new_v4();
        self.orders.insert(OrderRef {
            order_id,
            merchant_location_id: merchant,
            public_id: format!("ORD-{}", &order_id.simple().to_string()[..8]),
        });
        order_id
    }

    pub fn request(&self, km_from_center: f64, auto_assign: bool) -> CreateDeliveryRequest {
        self.request_for(self.merchant, km_from_center, auto_assign)
    }

    pub fn request_for(
        &self,
        merchant: Uuid,
        km_from_center: f64,
        auto_assign: bool,
    ) -> CreateDeliveryRequest {
        CreateDeliveryRequest {
            source_order_id: self.order_for(merchant),
            merchant_location_id: merchant,
            destination_address: "7 Isaac John Street".to_string(),
            destination: offset_north(&ZONE_CENTER, km_from_center),
            scheduled_at: None,
            auto_assign,
        }
    }

    /// Approved courier serving the fixture zone.
    pub fn courier(&self, position: Option<GeoPoint>) -> Uuid {
        let courier = self
            .state
            .couriers
            .register(CourierDraft {
                name: "Tunde".to_string(),
                zone_id: Some(self.zone.id),
            })
            .unwrap();
        self.state
            .couriers
            .set_verification(courier.id, VerificationStatus::Approved)
            .unwrap();
        if let Some(position) = position {
            self.state
                .couriers
                .update_position(courier.id, position)
                .unwrap();
        }
        courier.id
    }

    pub fn courier_near_center(&self) -> Uuid {
        self.courier(Some(ZONE_CENTER))
    }

    pub async fn pending_delivery(&self) -> DeliveryOrder {
        dispatch::create_delivery(&self.state, self.request(2.0, false))
            .await
            .unwrap()
    }

    pub fn is_available(&self, courier: Uuid) -> bool {
        self.state.couriers.get(courier).unwrap().available
    }
}
