use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::lifecycle::{self, Action, TransitionContext};
use crate::error::AppError;
use crate::geo::{haversine_km, GeoPoint};
use crate::models::delivery::{DeliveryOrder, DeliveryStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimableDelivery {
    #[serde(flatten)]
    pub delivery: DeliveryOrder,
    pub pickup: GeoPoint,
    pub pickup_distance_km: f64,
}

/// PENDING deliveries in the courier's zone whose pickup lies within the
/// radius of the query point (or the courier's last position), nearest first.
pub async fn list_available(
    state: &AppState,
    courier_id: Uuid,
    query: PoolQuery,
) -> Result<Vec<ClaimableDelivery>, AppError> {
    let courier = state.couriers.require(courier_id)?;

    let origin = match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => GeoPoint::new(lat, lng),
        (None, None) => courier.position.ok_or_else(|| {
            AppError::Validation(
                "no known position: provide lat and lng or update your location".to_string(),
            )
        })?,
        _ => {
            return Err(AppError::Validation(
                "lat and lng must be provided together".to_string(),
            ));
        }
    };
    origin.validate("query point")?;

    let radius_km = query
        .radius
        .unwrap_or(state.settings.default_claim_radius_km);
    if !(radius_km.is_finite() && radius_km > 0.0) {
        return Err(AppError::Validation(format!(
            "radius must be > 0, got {radius_km}"
        )));
    }

    let Some(zone_id) = courier.zone_id else {
        return Ok(Vec::new());
    };

    let pending = state.deliveries.filter(|delivery| {
        delivery.status == DeliveryStatus::Pending && delivery.zone_id == zone_id
    });

    let mut pickups: HashMap<Uuid, Option<GeoPoint>> = HashMap::new();
    let mut claimable = Vec::new();
    for delivery in pending {
        let pickup = match pickups.get(&delivery.merchant_location_id) {
            Some(cached) => *cached,
            None => {
                let coordinates = state
                    .external
                    .locations
                    .find_location(delivery.merchant_location_id)
                    .await?
                    .and_then(|location| location.coordinates);
                pickups.insert(delivery.merchant_location_id, coordinates);
                coordinates
            }
        };

        let Some(pickup) = pickup else {
            continue;
        };
        let pickup_distance_km = haversine_km(&origin, &pickup);
        if pickup_distance_km <= radius_km {
            claimable.push(ClaimableDelivery {
                delivery,
                pickup,
                pickup_distance_km,
            });
        }
    }

    claimable.sort_by(|a, b| a.pickup_distance_km.total_cmp(&b.pickup_distance_km));
    Ok(claimable)
}

/// First-come claim of a PENDING delivery. Losing a race is reported as a
/// conflict; nothing is retried.
pub fn claim(
    state: &AppState,
    courier_id: Uuid,
    delivery_id: Uuid,
) -> Result<DeliveryOrder, AppError> {
    state.couriers.require(courier_id)?;
    let delivery = state.deliveries.require(delivery_id)?;

    if delivery.status != DeliveryStatus::Pending {
        state.metrics.claim_conflicts_total.inc();
        return Err(AppError::Conflict(format!(
            "delivery was already claimed/modified (status {})",
            delivery.status
        )));
    }

    let result = lifecycle::commit(
        state,
        &delivery,
        Action::Claim,
        TransitionContext {
            note: Some("claimed from pool".to_string()),
            ..TransitionContext::bind(courier_id)
        },
        |_| {},
    );

    match &result {
        Ok(_) => info!(delivery_id = %delivery_id, courier_id = %courier_id, "delivery claimed"),
        Err(err) if err.is_conflict() => {
            state.metrics.claim_conflicts_total.inc();
            warn!(
                delivery_id = %delivery_id,
                courier_id = %courier_id,
                error = %err,
                "claim lost"
            );
        }
        Err(_) => {}
    }

    result
}
