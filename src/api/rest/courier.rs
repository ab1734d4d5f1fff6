//! Courier self-service endpoints. The caller is identified by the
//! `x-courier-id` header; authenticating it happens upstream.

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use futures::Stream;
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::warn;
use uuid::Uuid;

use crate::engine::courier_ops;
use crate::engine::pool::{self, ClaimableDelivery, PoolQuery};
use crate::error::AppError;
use crate::external::ProofFile;
use crate::geo::GeoPoint;
use crate::models::courier::Courier;
use crate::models::delivery::DeliveryOrder;
use crate::models::proof::{InlineProof, ProofKind, ProofOfDelivery};
use crate::models::tracking::TrackingEvent;
use crate::state::AppState;
use super::optional_json;

pub const COURIER_HEADER: &str = "x-courier-id";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/courier/location", put(update_my_location))
        .route("/courier/deliveries", get(assigned_deliveries))
        .route("/courier/deliveries/available", get(available_deliveries))
        .route("/courier/deliveries/:id", get(get_delivery))
        .route("/courier/deliveries/:id/claim", post(claim_delivery))
        .route("/courier/deliveries/:id/accept", post(accept_delivery))
        .route("/courier/deliveries/:id/reject", post(reject_delivery))
        .route("/courier/deliveries/:id/start", post(start_delivery))
        .route("/courier/deliveries/:id/location", post(report_location))
        .route("/courier/deliveries/:id/complete", post(complete_delivery))
        .route("/courier/deliveries/:id/fail", post(fail_delivery))
        .route("/courier/deliveries/:id/proof", post(upload_proof))
        .route("/courier/events", get(courier_events))
}

pub struct CallerCourier(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CallerCourier
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(COURIER_HEADER)
            .ok_or_else(|| AppError::Validation(format!("missing {COURIER_HEADER} header")))?;

        raw.to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(CallerCourier)
            .ok_or_else(|| AppError::Validation(format!("invalid {COURIER_HEADER} header")))
    }
}

#[derive(Deserialize)]
pub struct StartRequest {
    #[serde(default = "default_picked_up")]
    pub picked_up: bool,
}

fn default_picked_up() -> bool {
    true
}

#[derive(Deserialize)]
pub struct LocationReport {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct CompleteRequest {
    #[serde(default)]
    pub proof: Option<InlineProof>,
}

#[derive(Deserialize)]
pub struct FailRequest {
    pub reason: String,
    #[serde(default)]
    pub returned: bool,
}

#[derive(Deserialize)]
pub struct ProofUploadQuery {
    pub kind: ProofKind,
    #[serde(default)]
    pub filename: Option<String>,
}

async fn update_my_location(
    State(state): State<Arc<AppState>>,
    CallerCourier(courier_id): CallerCourier,
    Json(position): Json<GeoPoint>,
) -> Result<Json<Courier>, AppError> {
    Ok(Json(courier_ops::update_my_location(
        &state, courier_id, position,
    )?))
}

async fn assigned_deliveries(
    State(state): State<Arc<AppState>>,
    CallerCourier(courier_id): CallerCourier,
) -> Result<Json<Vec<DeliveryOrder>>, AppError> {
    Ok(Json(courier_ops::assigned_deliveries(&state, courier_id)?))
}

async fn available_deliveries(
    State(state): State<Arc<AppState>>,
    CallerCourier(courier_id): CallerCourier,
    Query(query): Query<PoolQuery>,
) -> Result<Json<Vec<ClaimableDelivery>>, AppError> {
    Ok(Json(pool::list_available(&state, courier_id, query).await?))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    CallerCourier(courier_id): CallerCourier,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(courier_ops::get_delivery(&state, courier_id, id)?))
}

async fn claim_delivery(
    State(state): State<Arc<AppState>>,
    CallerCourier(courier_id): CallerCourier,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(pool::claim(&state, courier_id, id)?))
}

async fn accept_delivery(
    State(state): State<Arc<AppState>>,
    CallerCourier(courier_id): CallerCourier,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(courier_ops::accept_delivery(&state, courier_id, id)?))
}

async fn reject_delivery(
    State(state): State<Arc<AppState>>,
    CallerCourier(courier_id): CallerCourier,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(courier_ops::reject_delivery(&state, courier_id, id)?))
}

async fn start_delivery(
    State(state): State<Arc<AppState>>,
    CallerCourier(courier_id): CallerCourier,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<DeliveryOrder>, AppError> {
    let picked_up = optional_json::<StartRequest>(&body)?.is_none_or(|start| start.picked_up);
    Ok(Json(courier_ops::start_delivery(
        &state, courier_id, id, picked_up,
    )?))
}

async fn report_location(
    State(state): State<Arc<AppState>>,
    CallerCourier(courier_id): CallerCourier,
    Path(id): Path<Uuid>,
    Json(payload): Json<LocationReport>,
) -> Result<Json<TrackingEvent>, AppError> {
    Ok(Json(courier_ops::update_location(
        &state,
        courier_id,
        id,
        GeoPoint::new(payload.lat, payload.lng),
        payload.note,
    )?))
}

async fn complete_delivery(
    State(state): State<Arc<AppState>>,
    CallerCourier(courier_id): CallerCourier,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<DeliveryOrder>, AppError> {
    let proof = optional_json::<CompleteRequest>(&body)?.and_then(|complete| complete.proof);
    Ok(Json(courier_ops::complete_delivery(
        &state, courier_id, id, proof,
    )?))
}

async fn fail_delivery(
    State(state): State<Arc<AppState>>,
    CallerCourier(courier_id): CallerCourier,
    Path(id): Path<Uuid>,
    Json(payload): Json<FailRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(courier_ops::fail_delivery(
        &state,
        courier_id,
        id,
        payload.reason,
        payload.returned,
    )?))
}

async fn upload_proof(
    State(state): State<Arc<AppState>>,
    CallerCourier(courier_id): CallerCourier,
    Path(id): Path<Uuid>,
    Query(query): Query<ProofUploadQuery>,
    body: Bytes,
) -> Result<Json<ProofOfDelivery>, AppError> {
    let file = ProofFile {
        filename: query.filename.unwrap_or_else(|| "proof".to_string()),
        bytes: body.to_vec(),
    };
    Ok(Json(
        courier_ops::upload_proof(&state, courier_id, id, query.kind, file).await?,
    ))
}

/// Server-sent stream of the caller's own status and availability events.
async fn courier_events(
    State(state): State<Arc<AppState>>,
    CallerCourier(courier_id): CallerCourier,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    state.couriers.require(courier_id)?;

    let stream = BroadcastStream::new(state.notifications.subscribe()).filter_map(move |message| {
        let event = match message {
            Ok(event) => event,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(courier_id = %courier_id, skipped, "courier event stream lagged");
                return None;
            }
        };
        if !event.concerns_courier(courier_id) {
            return None;
        }
        Event::default()
            .event(event.kind())
            .json_data(&event)
            .ok()
            .map(Ok)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
