use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Circular delivery coverage area with its own pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceZone {
    pub id: Uuid,
    pub name: String,
    pub center: GeoPoint,
    pub radius_km: f64,
    pub active: bool,
    pub base_fee: Decimal,
    pub fee_per_km: Decimal,
    pub max_distance_km: Option<f64>,
    pub min_order_amount: Option<Decimal>,
    pub surge: bool,
    pub updated_at: DateTime<Utc>,
}
