use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: Uuid,
    pub name: String,
    pub position: Option<GeoPoint>,
    pub available: bool,
    pub zone_id: Option<Uuid>,
    pub verification: VerificationStatus,
    pub updated_at: DateTime<Utc>,
}

impl Courier {
    /// Eligible for automatic matching or claiming within `zone_id`.
    pub fn can_serve(&self, zone_id: Uuid) -> bool {
        self.available
            && self.verification == VerificationStatus::Approved
            && self.zone_id == Some(zone_id)
    }
}
