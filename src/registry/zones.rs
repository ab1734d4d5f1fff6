use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::engine::pricing::MAX_FEE_UNITS;
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::zone::ServiceZone;

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneDraft {
    pub name: String,
    pub center: GeoPoint,
    pub radius_km: f64,
    pub base_fee: Decimal,
    pub fee_per_km: Decimal,
    #[serde(default)]
    pub max_distance_km: Option<f64>,
    #[serde(default)]
    pub min_order_amount: Option<Decimal>,
    #[serde(default)]
    pub surge: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZonePatch {
    pub name: Option<String>,
    pub center: Option<GeoPoint>,
    pub radius_km: Option<f64>,
    pub base_fee: Option<Decimal>,
    pub fee_per_km: Option<Decimal>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub max_distance_km: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub min_order_amount: Option<Option<Decimal>>,
    pub surge: Option<bool>,
    pub active: Option<bool>,
}

/// Distinguishes an explicit `null` (clear) from an absent field (keep).
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Delivery zones and the merchant-location-to-zone assignment.
#[derive(Default)]
pub struct ServiceAreaRegistry {
    zones: DashMap<Uuid, ServiceZone>,
    merchant_zones: DashMap<Uuid, Uuid>,
}

impl ServiceAreaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_zone(&self, draft: ZoneDraft) -> Result<ServiceZone, AppError> {
        let zone = ServiceZone {
            id: Uuid::new_v4(),
            name: draft.name,
            center: draft.center,
            radius_km: draft.radius_km,
            active: draft.active,
            base_fee: draft.base_fee,
            fee_per_km: draft.fee_per_km,
            max_distance_km: draft.max_distance_km,
            min_order_amount: draft.min_order_amount,
            surge: draft.surge,
            updated_at: Utc::now(),
        };
        validate_zone(&zone)?;

        self.zones.insert(zone.id, zone.clone());
        Ok(zone)
    }

    pub fn update_zone(&self, id: Uuid, patch: ZonePatch) -> Result<ServiceZone, AppError> {
        let mut entry = self
            .zones
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("zone {id} not found")))?;

        let mut next = entry.clone();
        if let Some(name) = patch.name {
            next.name = name;
        }
        if let Some(center) = patch.center {
            next.center = center;
        }
        if let Some(radius_km) = patch.radius_km {
            next.radius_km = radius_km;
        }
        if let Some(base_fee) = patch.base_fee {
            next.base_fee = base_fee;
        }
        if let Some(fee_per_km) = patch.fee_per_km {
            next.fee_per_km = fee_per_km;
        }
        if let Some(max_distance_km) = patch.max_distance_km {
            next.max_distance_km = max_distance_km;
        }
        if let Some(min_order_amount) = patch.min_order_amount {
            next.min_order_amount = min_order_amount;
        }
        if let Some(surge) = patch.surge {
            next.surge = surge;
        }
        if let Some(active) = patch.active {
            next.active = active;
        }
        validate_zone(&next)?;

        next.updated_at = Utc::now();
        *entry = next.clone();
        Ok(next)
    }

    pub fn get(&self, id: Uuid) -> Option<ServiceZone> {
        self.zones.get(&id).map(|entry| entry.value().clone())
    }

    pub fn list(&self) -> Vec<ServiceZone> {
        let mut zones: Vec<ServiceZone> =
            self.zones.iter().map(|entry| entry.value().clone()).collect();
        zones.sort_by(|a, b| a.name.cmp(&b.name));
        zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// `None` unassigns the merchant location.
    pub fn assign_merchant_to_zone(
        &self,
        location_id: Uuid,
        zone_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        match zone_id {
            Some(zone_id) => {
                if !self.zones.contains_key(&zone_id) {
                    return Err(AppError::NotFound(format!("zone {zone_id} not found")));
                }
                self.merchant_zones.insert(location_id, zone_id);
            }
            None => {
                self.merchant_zones.remove(&location_id);
            }
        }
        Ok(())
    }

    pub fn resolve_zone_for_merchant(&self, location_id: Uuid) -> Option<ServiceZone> {
        let zone_id = *self.merchant_zones.get(&location_id)?;
        self.get(zone_id)
    }

    /// Zone usable for new deliveries from this merchant location.
    pub fn require_active_zone(&self, location_id: Uuid) -> Result<ServiceZone, AppError> {
        let zone = self.resolve_zone_for_merchant(location_id).ok_or_else(|| {
            AppError::Validation(format!(
                "no zone assigned to merchant location {location_id}"
            ))
        })?;

        if !zone.active {
            return Err(AppError::Validation(format!(
                "zone {} is not active",
                zone.name
            )));
        }
        Ok(zone)
    }
}

fn validate_zone(zone: &ServiceZone) -> Result<(), AppError> {
    if zone.name.trim().is_empty() {
        return Err(AppError::Validation("zone name cannot be empty".to_string()));
    }
    zone.center.validate("center")?;
    if !(zone.radius_km.is_finite() && zone.radius_km > 0.0) {
        return Err(AppError::Validation(format!(
            "radius must be > 0, got {}",
            zone.radius_km
        )));
    }
    if zone.base_fee.is_sign_negative() || zone.fee_per_km.is_sign_negative() {
        return Err(AppError::Validation("fees must be >= 0".to_string()));
    }
    let max_fee = Decimal::new(MAX_FEE_UNITS, 0);
    if zone.base_fee > max_fee || zone.fee_per_km > max_fee {
        return Err(AppError::Validation(format!(
            "fees must be <= {max_fee}"
        )));
    }
    if let Some(max) = zone.max_distance_km {
        if !(max.is_finite() && max > 0.0) {
            return Err(AppError::Validation(format!(
                "max distance must be > 0, got {max}"
            )));
        }
    }
    if zone.min_order_amount.is_some_and(|min| min.is_sign_negative()) {
        return Err(AppError::Validation(
            "minimum order amount must be >= 0".to_string(),
        ));
    }
    Ok(())
}
