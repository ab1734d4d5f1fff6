use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::courier::{Courier, VerificationStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct CourierDraft {
    pub name: String,
    #[serde(default)]
    pub zone_id: Option<Uuid>,
}

#[derive(Default)]
pub struct CourierDirectory {
    couriers: DashMap<Uuid, Courier>,
}

impl CourierDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, draft: CourierDraft) -> Result<Courier, AppError> {
        if draft.name.trim().is_empty() {
            return Err(AppError::Validation("name cannot be empty".to_string()));
        }

        let courier = Courier {
            id: Uuid::new_v4(),
            name: draft.name,
            position: None,
            available: true,
            zone_id: draft.zone_id,
            verification: VerificationStatus::Pending,
            updated_at: Utc::now(),
        };

        self.couriers.insert(courier.id, courier.clone());
        Ok(courier)
    }

    pub fn get(&self, id: Uuid) -> Option<Courier> {
        self.couriers.get(&id).map(|entry| entry.value().clone())
    }

    pub fn require(&self, id: Uuid) -> Result<Courier, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))
    }

    pub fn list(&self) -> Vec<Courier> {
        self.couriers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.couriers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.couriers.is_empty()
    }

    /// Approved, available couriers serving `zone_id`.
    pub fn eligible_in_zone(&self, zone_id: Uuid) -> Vec<Courier> {
        self.couriers
            .iter()
            .filter(|entry| entry.value().can_serve(zone_id))
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn set_verification(
        &self,
        id: Uuid,
        verification: VerificationStatus,
    ) -> Result<Courier, AppError> {
        self.modify(id, |courier| courier.verification = verification)
    }

    pub fn assign_zone(&self, id: Uuid, zone_id: Option<Uuid>) -> Result<Courier, AppError> {
        self.modify(id, |courier| courier.zone_id = zone_id)
    }

    pub fn update_position(&self, id: Uuid, position: GeoPoint) -> Result<Courier, AppError> {
        position.validate("position")?;
        self.modify(id, |courier| courier.position = Some(position))
    }

    /// Flips availability to false for an approved courier serving `zone_id`.
    /// Availability is re-checked under the entry lock, so two deliveries can
    /// never reserve the same courier.
    pub fn reserve(&self, id: Uuid, zone_id: Uuid) -> Result<(), AppError> {
        let mut courier = self
            .couriers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;

        if courier.verification != VerificationStatus::Approved {
            return Err(AppError::Validation(format!(
                "courier {id} is not approved"
            )));
        }
        if courier.zone_id != Some(zone_id) {
            return Err(AppError::Validation(format!(
                "courier {id} does not serve zone {zone_id}"
            )));
        }
        if !courier.available {
            return Err(AppError::Conflict(format!("courier {id} is not available")));
        }

        courier.available = false;
        courier.updated_at = Utc::now();
        Ok(())
    }

    pub fn release(&self, id: Uuid) -> Result<(), AppError> {
        self.modify(id, |courier| courier.available = true).map(|_| ())
    }

    fn modify<F>(&self, id: Uuid, apply: F) -> Result<Courier, AppError>
    where
        F: FnOnce(&mut Courier),
    {
        let mut courier = self
            .couriers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;

        apply(courier.value_mut());
        courier.updated_at = Utc::now();
        Ok(courier.clone())
    }
}
