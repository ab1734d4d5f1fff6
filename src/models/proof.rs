use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProofKind {
    Signature,
    Photo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofOfDelivery {
    pub delivery_id: Uuid,
    pub kind: ProofKind,
    pub file_url: Option<String>,
    pub payload: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Evidence sent inline with a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineProof {
    pub kind: ProofKind,
    pub payload: String,
}
