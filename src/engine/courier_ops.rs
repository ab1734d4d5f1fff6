use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::lifecycle::{self, Action, TransitionContext};
use crate::error::AppError;
use crate::external::ProofFile;
use crate::geo::GeoPoint;
use crate::models::courier::Courier;
use crate::models::delivery::{DeliveryOrder, DeliveryStatus};
use crate::models::proof::{InlineProof, ProofKind, ProofOfDelivery};
use crate::models::tracking::TrackingEvent;
use crate::state::AppState;

/// Deliveries the caller does not hold are reported as missing, not forbidden.
fn ensure_ownership(
    state: &AppState,
    courier_id: Uuid,
    delivery_id: Uuid,
) -> Result<DeliveryOrder, AppError> {
    state.couriers.require(courier_id)?;
    state
        .deliveries
        .get(delivery_id)
        .filter(|delivery| delivery.courier_id == Some(courier_id))
        .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))
}

/// Like [`ensure_ownership`], but also admits the courier that completed it.
fn ensure_handled_by(
    state: &AppState,
    courier_id: Uuid,
    delivery_id: Uuid,
) -> Result<DeliveryOrder, AppError> {
    state.couriers.require(courier_id)?;
    state
        .deliveries
        .get(delivery_id)
        .filter(|delivery| delivery.is_handled_by(courier_id))
        .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))
}

pub fn update_my_location(
    state: &AppState,
    courier_id: Uuid,
    position: GeoPoint,
) -> Result<Courier, AppError> {
    let courier = state.couriers.update_position(courier_id, position)?;
    debug!(courier_id = %courier_id, lat = position.lat, lng = position.lng, "courier position updated");
    Ok(courier)
}

/// Active deliveries bound to the caller, oldest first.
pub fn assigned_deliveries(
    state: &AppState,
    courier_id: Uuid,
) -> Result<Vec<DeliveryOrder>, AppError> {
    state.couriers.require(courier_id)?;

    let mut deliveries = state.deliveries.filter(|delivery| {
        delivery.courier_id == Some(courier_id) && delivery.status.is_active()
    });
    deliveries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(deliveries)
}

pub fn get_delivery(
    state: &AppState,
    courier_id: Uuid,
    delivery_id: Uuid,
) -> Result<DeliveryOrder, AppError> {
    ensure_handled_by(state, courier_id, delivery_id)
}

/// Confirmation only; nothing is written.
pub fn accept_delivery(
    state: &AppState,
    courier_id: Uuid,
    delivery_id: Uuid,
) -> Result<DeliveryOrder, AppError> {
    let delivery = ensure_ownership(state, courier_id, delivery_id)?;
    lifecycle::transition(delivery.status, Action::Accept)?;

    info!(delivery_id = %delivery_id, courier_id = %courier_id, "delivery accepted");
    Ok(delivery)
}

pub fn reject_delivery(
    state: &AppState,
    courier_id: Uuid,
    delivery_id: Uuid,
) -> Result<DeliveryOrder, AppError> {
    let delivery = ensure_ownership(state, courier_id, delivery_id)?;
    lifecycle::commit(
        state,
        &delivery,
        Action::Reject,
        TransitionContext::note("rejected by courier"),
        |_| {},
    )
}

pub fn start_delivery(
    state: &AppState,
    courier_id: Uuid,
    delivery_id: Uuid,
    picked_up: bool,
) -> Result<DeliveryOrder, AppError> {
    let delivery = ensure_ownership(state, courier_id, delivery_id)?;
    let position = state
        .couriers
        .get(courier_id)
        .and_then(|courier| courier.position);

    lifecycle::commit(
        state,
        &delivery,
        Action::Start { picked_up },
        TransitionContext {
            position,
            note: Some(if picked_up { "picked up" } else { "in transit" }.to_string()),
            ..TransitionContext::default()
        },
        |_| {},
    )
}

/// Position report for an in-flight delivery; mirrored onto the courier.
/// The event is appended only while the delivery is still in the status
/// that was checked, so it can never land after a completion.
pub fn update_location(
    state: &AppState,
    courier_id: Uuid,
    delivery_id: Uuid,
    position: GeoPoint,
    note: Option<String>,
) -> Result<TrackingEvent, AppError> {
    position.validate("position")?;
    let delivery = ensure_ownership(state, courier_id, delivery_id)?;
    lifecycle::transition(delivery.status, Action::UpdateLocation)?;

    let event = state.deliveries.read_if_unchanged(
        delivery_id,
        delivery.version,
        delivery.status,
        |current| {
            state.couriers.update_position(courier_id, position)?;
            Ok(state
                .tracking
                .append(current.id, current.status, Some(position), note))
        },
    )?;

    debug!(delivery_id = %delivery_id, courier_id = %courier_id, "delivery position recorded");
    Ok(event)
}

pub fn complete_delivery(
    state: &AppState,
    courier_id: Uuid,
    delivery_id: Uuid,
    proof: Option<InlineProof>,
) -> Result<DeliveryOrder, AppError> {
    if proof
        .as_ref()
        .is_some_and(|proof| proof.payload.trim().is_empty())
    {
        return Err(AppError::Validation(
            "proof payload cannot be empty".to_string(),
        ));
    }

    let delivery = ensure_ownership(state, courier_id, delivery_id)?;
    let position = state
        .couriers
        .get(courier_id)
        .and_then(|courier| courier.position);

    let completed = lifecycle::commit(
        state,
        &delivery,
        Action::Complete,
        TransitionContext {
            position,
            note: Some("delivered".to_string()),
            ..TransitionContext::default()
        },
        |next| {
            next.completed_at = Some(Utc::now());
            next.delivered_by = next.courier_id;
        },
    )?;

    if let Some(proof) = proof {
        state
            .proofs
            .record(delivery_id, proof.kind, None, Some(proof.payload));
    }

    Ok(completed)
}

/// Courier reports the drop-off could not happen; `returned` marks goods sent back.
pub fn fail_delivery(
    state: &AppState,
    courier_id: Uuid,
    delivery_id: Uuid,
    reason: String,
    returned: bool,
) -> Result<DeliveryOrder, AppError> {
    if reason.trim().is_empty() {
        return Err(AppError::Validation(
            "failure reason cannot be empty".to_string(),
        ));
    }

    let delivery = ensure_ownership(state, courier_id, delivery_id)?;
    lifecycle::commit(
        state,
        &delivery,
        Action::Fail { returned },
        TransitionContext::note(reason.clone()),
        |next| next.failure_reason = Some(reason),
    )
}

/// Stores the file when storage is configured; the record is kept either way.
pub async fn upload_proof(
    state: &AppState,
    courier_id: Uuid,
    delivery_id: Uuid,
    kind: ProofKind,
    file: ProofFile,
) -> Result<ProofOfDelivery, AppError> {
    if file.bytes.is_empty() {
        return Err(AppError::Validation("proof file is empty".to_string()));
    }

    let delivery = ensure_handled_by(state, courier_id, delivery_id)?;
    if !matches!(
        delivery.status,
        DeliveryStatus::PickedUp | DeliveryStatus::InTransit | DeliveryStatus::Delivered
    ) {
        return Err(AppError::InvalidTransition {
            action: "attach proof to",
            current: delivery.status,
            required: "PICKED_UP, IN_TRANSIT or DELIVERED",
        });
    }

    let file_url = state.external.storage.store(delivery_id, file).await?;
    if file_url.is_none() {
        debug!(delivery_id = %delivery_id, "file storage not configured; proof kept without file");
    }

    Ok(state.proofs.record(delivery_id, kind, file_url, None))
}
