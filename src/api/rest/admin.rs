use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::dispatch::{self, CreateDeliveryRequest};
use crate::error::AppError;
use crate::models::courier::{Courier, VerificationStatus};
use crate::models::delivery::{DeliveryOrder, DeliveryStatus};
use crate::models::tracking::TrackingEvent;
use crate::models::zone::ServiceZone;
use crate::registry::couriers::CourierDraft;
use crate::registry::zones::{ZoneDraft, ZonePatch};
use crate::state::AppState;
use super::optional_json;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/zones", post(create_zone).get(list_zones))
        .route("/zones/:id", get(get_zone).patch(update_zone))
        .route("/merchants/:id/zone", put(assign_merchant_zone))
        .route("/couriers", post(register_courier).get(list_couriers))
        .route("/couriers/:id", get(get_courier))
        .route("/couriers/:id/verification", patch(set_verification))
        .route("/couriers/:id/zone", patch(assign_courier_zone))
        .route("/deliveries", post(create_delivery))
        .route("/merchants/:id/deliveries", get(list_merchant_deliveries))
        .route(
            "/merchants/:id/deliveries/:delivery_id",
            get(get_merchant_delivery),
        )
        .route("/deliveries/:id/assign", post(assign_delivery))
        .route("/deliveries/:id/reschedule", post(reschedule_delivery))
        .route("/deliveries/:id/tracking", get(delivery_tracking))
}

#[derive(Deserialize)]
pub struct ZoneAssignment {
    pub zone_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct VerificationUpdate {
    pub verification: VerificationStatus,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub courier_id: Uuid,
}

#[derive(Deserialize)]
pub struct RescheduleRequest {
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct MerchantDeliveriesQuery {
    pub status: Option<DeliveryStatus>,
}

async fn create_zone(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ZoneDraft>,
) -> Result<(StatusCode, Json<ServiceZone>), AppError> {
    let zone = state.zones.create_zone(payload)?;
    Ok((StatusCode::CREATED, Json(zone)))
}

async fn list_zones(State(state): State<Arc<AppState>>) -> Json<Vec<ServiceZone>> {
    Json(state.zones.list())
}

async fn get_zone(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceZone>, AppError> {
    state
        .zones
        .get(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("zone {id} not found")))
}

async fn update_zone(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ZonePatch>,
) -> Result<Json<ServiceZone>, AppError> {
    Ok(Json(state.zones.update_zone(id, payload)?))
}

async fn assign_merchant_zone(
    State(state): State<Arc<AppState>>,
    Path(location_id): Path<Uuid>,
    Json(payload): Json<ZoneAssignment>,
) -> Result<StatusCode, AppError> {
    state
        .zones
        .assign_merchant_to_zone(location_id, payload.zone_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn register_courier(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CourierDraft>,
) -> Result<(StatusCode, Json<Courier>), AppError> {
    if let Some(zone_id) = payload.zone_id {
        require_zone(&state, zone_id)?;
    }
    let courier = state.couriers.register(payload)?;
    Ok((StatusCode::CREATED, Json(courier)))
}

async fn list_couriers(State(state): State<Arc<AppState>>) -> Json<Vec<Courier>> {
    Json(state.couriers.list())
}

async fn get_courier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Courier>, AppError> {
    Ok(Json(state.couriers.require(id)?))
}

async fn set_verification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerificationUpdate>,
) -> Result<Json<Courier>, AppError> {
    Ok(Json(
        state.couriers.set_verification(id, payload.verification)?,
    ))
}

async fn assign_courier_zone(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ZoneAssignment>,
) -> Result<Json<Courier>, AppError> {
    if let Some(zone_id) = payload.zone_id {
        require_zone(&state, zone_id)?;
    }
    Ok(Json(state.couriers.assign_zone(id, payload.zone_id)?))
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDeliveryRequest>,
) -> Result<(StatusCode, Json<DeliveryOrder>), AppError> {
    let delivery = dispatch::create_delivery(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(delivery)))
}

async fn list_merchant_deliveries(
    State(state): State<Arc<AppState>>,
    Path(location_id): Path<Uuid>,
    Query(query): Query<MerchantDeliveriesQuery>,
) -> Json<Vec<DeliveryOrder>> {
    Json(dispatch::list_for_merchant(
        &state,
        location_id,
        query.status,
    ))
}

async fn get_merchant_delivery(
    State(state): State<Arc<AppState>>,
    Path((location_id, delivery_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(dispatch::get_for_merchant(
        &state,
        location_id,
        delivery_id,
    )?))
}

async fn assign_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(dispatch::assign_courier(
        &state,
        id,
        payload.courier_id,
    )?))
}

async fn reschedule_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<DeliveryOrder>, AppError> {
    let scheduled_at =
        optional_json::<RescheduleRequest>(&body)?.and_then(|reschedule| reschedule.scheduled_at);
    Ok(Json(dispatch::reschedule(&state, id, scheduled_at)?))
}

async fn delivery_tracking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TrackingEvent>>, AppError> {
    Ok(Json(dispatch::tracking_history(&state, id)?))
}

fn require_zone(state: &AppState, zone_id: Uuid) -> Result<ServiceZone, AppError> {
    state
        .zones
        .get(zone_id)
        .ok_or_else(|| AppError::NotFound(format!("zone {zone_id} not found")))
}
