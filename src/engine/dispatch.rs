use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::lifecycle::{self, Action, TransitionContext};
use crate::engine::pricing;
use crate::error::AppError;
use crate::geo::{haversine_km, GeoPoint};
use crate::models::courier::Courier;
use crate::models::delivery::{DeliveryOrder, DeliveryStatus};
use crate::models::tracking::TrackingEvent;
use crate::models::zone::ServiceZone;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeliveryRequest {
    pub source_order_id: Uuid,
    pub merchant_location_id: Uuid,
    pub destination_address: String,
    pub destination: GeoPoint,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_assign: bool,
}

pub async fn create_delivery(
    state: &AppState,
    request: CreateDeliveryRequest,
) -> Result<DeliveryOrder, AppError> {
    let start = Instant::now();
    let result = create(state, request).await;

    let outcome = if result.is_ok() { "success" } else { "error" };
    state
        .metrics
        .dispatch_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());

    result
}

async fn create(state: &AppState, request: CreateDeliveryRequest) -> Result<DeliveryOrder, AppError> {
    request.destination.validate("destination")?;
    if request.destination_address.trim().is_empty() {
        return Err(AppError::Validation(
            "destination address cannot be empty".to_string(),
        ));
    }

    if state.deliveries.exists_for_source_order(request.source_order_id) {
        return Err(AppError::Conflict(format!(
            "duplicate: a delivery already exists for order {}",
            request.source_order_id
        )));
    }

    state
        .external
        .orders
        .find_order(request.source_order_id)
        .await?
        .filter(|order| order.merchant_location_id == request.merchant_location_id)
        .ok_or_else(|| {
            AppError::NotFound(format!("order {} not found", request.source_order_id))
        })?;

    let zone = state.zones.require_active_zone(request.merchant_location_id)?;
    check_geofence(&zone, &request.destination)?;

    let location = state
        .external
        .locations
        .find_location(request.merchant_location_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "merchant location {} not found",
                request.merchant_location_id
            ))
        })?;
    let origin = location.coordinates.ok_or_else(|| {
        AppError::Validation(format!(
            "store has no coordinates: merchant location {}",
            location.id
        ))
    })?;

    let distance_km = haversine_km(&origin, &request.destination);
    let fee = pricing::price_leg(&zone, distance_km)?;

    let courier = if request.auto_assign {
        let mut candidates = state.couriers.eligible_in_zone(zone.id);
        candidates.sort_by_key(|courier| courier.id);
        let (courier, courier_distance_km) = nearest_courier(&candidates, &origin)?;
        debug!(
            courier_id = %courier.id,
            distance_km = courier_distance_km,
            "nearest eligible courier selected"
        );
        Some(courier.id)
    } else {
        None
    };

    let now = Utc::now();
    let delivery = DeliveryOrder {
        id: Uuid::new_v4(),
        source_order_id: request.source_order_id,
        merchant_location_id: request.merchant_location_id,
        zone_id: zone.id,
        origin_address: location.address,
        destination_address: request.destination_address,
        destination: request.destination,
        status: if courier.is_some() {
            DeliveryStatus::Assigned
        } else {
            DeliveryStatus::Pending
        },
        courier_id: courier,
        delivered_by: None,
        distance_km,
        fee,
        currency: location.currency,
        scheduled_at: request.scheduled_at,
        failure_reason: None,
        completed_at: None,
        version: 0,
        created_at: now,
        updated_at: now,
    };

    // The courier flip and the insert commit together or not at all.
    let stored = state.deliveries.insert_unique(delivery, |pending| {
        match pending.courier_id {
            Some(courier_id) => state
                .couriers
                .reserve(courier_id, pending.zone_id),
            None => Ok(()),
        }
    })?;

    state
        .tracking
        .append(stored.id, stored.status, None, Some("delivery created".to_string()));

    let mode = if request.auto_assign { "auto" } else { "pool" };
    state
        .metrics
        .deliveries_created_total
        .with_label_values(&[mode])
        .inc();

    if let Some(courier_id) = stored.courier_id {
        state.notifications.status_changed(
            stored.id,
            DeliveryStatus::Pending,
            DeliveryStatus::Assigned,
            Some(courier_id),
        );
        state.notifications.courier_availability(courier_id, false);
    }

    info!(
        delivery_id = %stored.id,
        zone_id = %stored.zone_id,
        status = %stored.status,
        courier_id = ?stored.courier_id,
        distance_km = stored.distance_km,
        fee = %stored.fee,
        mode,
        "delivery created"
    );

    Ok(stored)
}

/// Destination must lie within the zone's radius of its center.
pub fn check_geofence(zone: &ServiceZone, destination: &GeoPoint) -> Result<f64, AppError> {
    let distance_km = haversine_km(&zone.center, destination);
    if distance_km > zone.radius_km {
        warn!(
            zone_id = %zone.id,
            distance_km,
            radius_km = zone.radius_km,
            "destination outside delivery zone"
        );
        return Err(AppError::Validation(format!(
            "outside delivery zone: destination is {distance_km:.2} km from zone center, radius is {} km",
            zone.radius_km
        )));
    }
    Ok(distance_km)
}

/// Closest candidate with a known position; the first one wins ties.
pub fn nearest_courier<'a>(
    candidates: &'a [Courier],
    origin: &GeoPoint,
) -> Result<(&'a Courier, f64), AppError> {
    if candidates.is_empty() {
        return Err(AppError::Validation(
            "no available couriers in zone".to_string(),
        ));
    }

    let mut best: Option<(&Courier, f64)> = None;
    for courier in candidates {
        let Some(position) = courier.position else {
            continue;
        };
        let distance_km = haversine_km(&position, origin);
        match best {
            Some((_, best_km)) if best_km <= distance_km => {}
            _ => best = Some((courier, distance_km)),
        }
    }

    best.ok_or_else(|| {
        AppError::Validation("no couriers with location in zone".to_string())
    })
}

/// Operator assignment of a PENDING delivery to an approved, available
/// courier serving the delivery's zone.
pub fn assign_courier(
    state: &AppState,
    delivery_id: Uuid,
    courier_id: Uuid,
) -> Result<DeliveryOrder, AppError> {
    let delivery = state.deliveries.require(delivery_id)?;
    state.couriers.require(courier_id)?;

    lifecycle::commit(
        state,
        &delivery,
        Action::Assign,
        TransitionContext {
            note: Some("assigned by operator".to_string()),
            ..TransitionContext::bind(courier_id)
        },
        |_| {},
    )
}

/// Reopens a FAILED or RETURNED delivery for dispatch.
pub fn reschedule(
    state: &AppState,
    delivery_id: Uuid,
    scheduled_at: Option<DateTime<Utc>>,
) -> Result<DeliveryOrder, AppError> {
    let delivery = state.deliveries.require(delivery_id)?;

    lifecycle::commit(
        state,
        &delivery,
        Action::Reschedule,
        TransitionContext::note("rescheduled"),
        |next| {
            next.courier_id = None;
            next.failure_reason = None;
            if scheduled_at.is_some() {
                next.scheduled_at = scheduled_at;
            }
        },
    )
}

/// Newest first.
pub fn list_for_merchant(
    state: &AppState,
    location_id: Uuid,
    status: Option<DeliveryStatus>,
) -> Vec<DeliveryOrder> {
    let mut deliveries = state.deliveries.filter(|delivery| {
        delivery.merchant_location_id == location_id
            && status.is_none_or(|wanted| delivery.status == wanted)
    });
    deliveries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    deliveries
}

pub fn get_for_merchant(
    state: &AppState,
    location_id: Uuid,
    delivery_id: Uuid,
) -> Result<DeliveryOrder, AppError> {
    state
        .deliveries
        .get(delivery_id)
        .filter(|delivery| delivery.merchant_location_id == location_id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))
}

pub fn tracking_history(
    state: &AppState,
    delivery_id: Uuid,
) -> Result<Vec<TrackingEvent>, AppError> {
    state.deliveries.require(delivery_id)?;
    Ok(state.tracking.history(delivery_id))
}
