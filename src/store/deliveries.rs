use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::delivery::{DeliveryOrder, DeliveryStatus};

/// Delivery orders keyed by id, plus the one-delivery-per-source-order index.
///
/// Every mutation goes through [`DeliveryStore::compare_and_set`], which only
/// writes when the stored status and version still match what the caller read.
#[derive(Default)]
pub struct DeliveryStore {
    deliveries: DashMap<Uuid, DeliveryOrder>,
    by_source_order: DashMap<Uuid, Uuid>,
}

impl DeliveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<DeliveryOrder> {
        self.deliveries.get(&id).map(|entry| entry.value().clone())
    }

    pub fn require(&self, id: Uuid) -> Result<DeliveryOrder, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))
    }

    pub fn exists_for_source_order(&self, source_order_id: Uuid) -> bool {
        self.by_source_order.contains_key(&source_order_id)
    }

    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    /// Snapshot of every delivery matching `predicate`.
    pub fn filter<P>(&self, predicate: P) -> Vec<DeliveryOrder>
    where
        P: Fn(&DeliveryOrder) -> bool,
    {
        self.deliveries
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Inserts a new delivery unless one already exists for its source order.
    ///
    /// `before_commit` runs while the source-order slot is held; if it fails,
    /// nothing is written.
    pub fn insert_unique<F>(
        &self,
        delivery: DeliveryOrder,
        before_commit: F,
    ) -> Result<DeliveryOrder, AppError>
    where
        F: FnOnce(&DeliveryOrder) -> Result<(), AppError>,
    {
        match self.by_source_order.entry(delivery.source_order_id) {
            Entry::Occupied(existing) => Err(AppError::Conflict(format!(
                "duplicate: delivery {} already exists for order {}",
                existing.get(),
                delivery.source_order_id
            ))),
            Entry::Vacant(slot) => {
                before_commit(&delivery)?;
                self.deliveries.insert(delivery.id, delivery.clone());
                slot.insert(delivery.id);
                Ok(delivery)
            }
        }
    }

    /// Conditional update: applies `apply` to a copy of the stored delivery and
    /// writes it back with `version + 1`, provided status and version are
    /// unchanged since the caller's read. A failing `apply` writes nothing.
    pub fn compare_and_set<F>(
        &self,
        id: Uuid,
        expected_version: u64,
        expected_status: DeliveryStatus,
        apply: F,
    ) -> Result<DeliveryOrder, AppError>
    where
        F: FnOnce(&mut DeliveryOrder) -> Result<(), AppError>,
    {
        let mut entry = self
            .deliveries
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;

        if entry.version != expected_version || entry.status != expected_status {
            return Err(AppError::Conflict(
                "delivery was already claimed/modified".to_string(),
            ));
        }

        let mut next = entry.value().clone();
        apply(&mut next)?;
        next.version = expected_version + 1;
        next.updated_at = Utc::now();

        *entry = next.clone();
        Ok(next)
    }

    /// Runs `read` while holding the delivery's entry, provided status and
    /// version are unchanged since the caller's read. Conditional writes to
    /// the same delivery wait until `read` returns.
    pub fn read_if_unchanged<F, T>(
        &self,
        id: Uuid,
        expected_version: u64,
        expected_status: DeliveryStatus,
        read: F,
    ) -> Result<T, AppError>
    where
        F: FnOnce(&DeliveryOrder) -> Result<T, AppError>,
    {
        let entry = self
            .deliveries
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;

        if entry.version != expected_version || entry.status != expected_status {
            return Err(AppError::Conflict(format!(
                "delivery moved to {} while recording",
                entry.status
            )));
        }

        read(entry.value())
    }
}
