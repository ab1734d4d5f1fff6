//! Delivery state machine.
//!
//! [`transition`] is the single table of legal `(status, action)` pairs;
//! [`commit`] applies one of them through the store's conditional write,
//! flipping courier availability in the same step and then recording the
//! tracking event and notifications.

use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::delivery::{DeliveryOrder, DeliveryStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Assign,
    Claim,
    Accept,
    Reject,
    Start { picked_up: bool },
    UpdateLocation,
    Complete,
    Fail { returned: bool },
    Reschedule,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Assign => "assign",
            Action::Claim => "claim",
            Action::Accept => "accept",
            Action::Reject => "reject",
            Action::Start { .. } => "start",
            Action::UpdateLocation => "update location of",
            Action::Complete => "complete",
            Action::Fail { .. } => "fail",
            Action::Reschedule => "reschedule",
        }
    }

    fn required(&self) -> &'static str {
        match self {
            Action::Assign | Action::Claim => "PENDING",
            Action::Accept | Action::Reject | Action::Start { .. } => "ASSIGNED",
            Action::UpdateLocation | Action::Complete => "PICKED_UP or IN_TRANSIT",
            Action::Fail { .. } => "ASSIGNED, PICKED_UP or IN_TRANSIT",
            Action::Reschedule => "FAILED or RETURNED",
        }
    }

    fn metric_label(&self) -> &'static str {
        match self {
            Action::Assign => "assign",
            Action::Claim => "claim",
            Action::Accept => "accept",
            Action::Reject => "reject",
            Action::Start { .. } => "start",
            Action::UpdateLocation => "update_location",
            Action::Complete => "complete",
            Action::Fail { .. } => "fail",
            Action::Reschedule => "reschedule",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourierEffect {
    Keep,
    Bind,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: DeliveryStatus,
    pub to: DeliveryStatus,
    pub courier: CourierEffect,
}

impl Transition {
    pub fn changes_status(&self) -> bool {
        self.from != self.to
    }
}

pub fn transition(current: DeliveryStatus, action: Action) -> Result<Transition, AppError> {
    use DeliveryStatus::*;

    let (to, courier) = match (current, action) {
        (Pending, Action::Assign | Action::Claim) => (Assigned, CourierEffect::Bind),
        (Assigned, Action::Accept) => (Assigned, CourierEffect::Keep),
        (Assigned, Action::Reject) => (Pending, CourierEffect::Release),
        (Assigned, Action::Start { picked_up: true }) => (PickedUp, CourierEffect::Keep),
        (Assigned, Action::Start { picked_up: false }) => (InTransit, CourierEffect::Keep),
        (PickedUp | InTransit, Action::UpdateLocation) => (current, CourierEffect::Keep),
        (PickedUp | InTransit, Action::Complete) => (Delivered, CourierEffect::Release),
        (Assigned | PickedUp | InTransit, Action::Fail { returned }) => {
            let to = if returned { Returned } else { Failed };
            (to, CourierEffect::Release)
        }
        (Failed | Returned, Action::Reschedule) => (Pending, CourierEffect::Keep),
        _ => {
            return Err(AppError::InvalidTransition {
                action: action.name(),
                current,
                required: action.required(),
            });
        }
    };

    Ok(Transition {
        from: current,
        to,
        courier,
    })
}

/// Extra data recorded alongside a committed transition.
#[derive(Debug, Default)]
pub struct TransitionContext {
    /// Courier to bind; it must be approved and serve the delivery's zone.
    pub bind: Option<Uuid>,
    pub position: Option<GeoPoint>,
    pub note: Option<String>,
}

impl TransitionContext {
    pub fn bind(courier_id: Uuid) -> Self {
        Self {
            bind: Some(courier_id),
            ..Self::default()
        }
    }

    pub fn note(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::default()
        }
    }
}

/// Applies `action` to the delivery as it was read in `snapshot`.
///
/// Fails with a conflict if the stored delivery moved on since the read; the
/// courier binding and availability change commit together with the status.
pub fn commit<F>(
    state: &AppState,
    snapshot: &DeliveryOrder,
    action: Action,
    context: TransitionContext,
    edit: F,
) -> Result<DeliveryOrder, AppError>
where
    F: FnOnce(&mut DeliveryOrder),
{
    let plan = transition(snapshot.status, action)?;
    let mut bound = None;
    let mut released = None;

    let updated = state.deliveries.compare_and_set(
        snapshot.id,
        snapshot.version,
        snapshot.status,
        |next| {
            edit(next);
            next.status = plan.to;
            match plan.courier {
                CourierEffect::Keep => {}
                CourierEffect::Bind => {
                    let courier_id = context.bind.ok_or_else(|| {
                        AppError::Internal(format!("{} requires a courier", action.name()))
                    })?;
                    state.couriers.reserve(courier_id, next.zone_id)?;
                    next.courier_id = Some(courier_id);
                    bound = Some(courier_id);
                }
                CourierEffect::Release => {
                    if let Some(courier_id) = next.courier_id.take() {
                        state.couriers.release(courier_id)?;
                        released = Some(courier_id);
                    }
                }
            }
            Ok(())
        },
    )?;

    state
        .metrics
        .delivery_transitions_total
        .with_label_values(&[action.metric_label()])
        .inc();

    state
        .tracking
        .append(updated.id, updated.status, context.position, context.note);

    if plan.changes_status() {
        state.notifications.status_changed(
            updated.id,
            plan.from,
            plan.to,
            updated.courier_id.or(released),
        );
    }
    if let Some(courier_id) = bound {
        state.notifications.courier_availability(courier_id, false);
    }
    if let Some(courier_id) = released {
        state.notifications.courier_availability(courier_id, true);
    }

    info!(
        delivery_id = %updated.id,
        action = action.name(),
        from = %plan.from,
        to = %plan.to,
        courier_id = ?updated.courier_id.or(released),
        version = updated.version,
        "delivery transition committed"
    );

    Ok(updated)
}
