use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::proof::{ProofKind, ProofOfDelivery};

#[derive(Default)]
pub struct ProofOfDeliveryStore {
    proofs: DashMap<Uuid, Vec<ProofOfDelivery>>,
}

impl ProofOfDeliveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        delivery_id: Uuid,
        kind: ProofKind,
        file_url: Option<String>,
        payload: Option<String>,
    ) -> ProofOfDelivery {
        let proof = ProofOfDelivery {
            delivery_id,
            kind,
            file_url,
            payload,
            recorded_at: Utc::now(),
        };

        self.proofs
            .entry(delivery_id)
            .or_default()
            .push(proof.clone());
        proof
    }

    pub fn for_delivery(&self, delivery_id: Uuid) -> Vec<ProofOfDelivery> {
        self.proofs
            .get(&delivery_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}
