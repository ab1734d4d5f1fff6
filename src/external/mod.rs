//! Contracts of the commerce-side systems the dispatch core calls into,
//! with in-process implementations used by the binary and the tests.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRef {
    pub order_id: Uuid,
    pub merchant_location_id: Uuid,
    pub public_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantLocation {
    pub id: Uuid,
    pub address: String,
    pub coordinates: Option<GeoPoint>,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct ProofFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait OrderDirectory: Send + Sync {
    async fn find_order(&self, order_id: Uuid) -> Result<Option<OrderRef>, AppError>;
}

#[async_trait]
pub trait LocationDirectory: Send + Sync {
    async fn find_location(&self, location_id: Uuid)
    -> Result<Option<MerchantLocation>, AppError>;
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// `Ok(None)` means storage is not configured.
    async fn store(&self, delivery_id: Uuid, file: ProofFile) -> Result<Option<String>, AppError>;
}

#[derive(Clone)]
pub struct Collaborators {
    pub orders: Arc<dyn OrderDirectory>,
    pub locations: Arc<dyn LocationDirectory>,
    pub storage: Arc<dyn FileStorage>,
}

#[derive(Default)]
pub struct InMemoryOrders {
    orders: DashMap<Uuid, OrderRef>,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: OrderRef) {
        self.orders.insert(order.order_id, order);
    }
}

#[async_trait]
impl OrderDirectory for InMemoryOrders {
    async fn find_order(&self, order_id: Uuid) -> Result<Option<OrderRef>, AppError> {
        Ok(self.orders.get(&order_id).map(|entry| entry.value().clone()))
    }
}

#[derive(Default)]
pub struct InMemoryLocations {
    locations: DashMap<Uuid, MerchantLocation>,
}

impl InMemoryLocations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, location: MerchantLocation) {
        self.locations.insert(location.id, location);
    }
}

#[async_trait]
impl LocationDirectory for InMemoryLocations {
    async fn find_location(
        &self,
        location_id: Uuid,
    ) -> Result<Option<MerchantLocation>, AppError> {
        Ok(self
            .locations
            .get(&location_id)
            .map(|entry| entry.value().clone()))
    }
}

/// Writes proof files under `root/<delivery_id>/`; without a root nothing is stored.
pub struct LocalFileStorage {
    root: Option<PathBuf>,
}

impl LocalFileStorage {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn unconfigured() -> Self {
        Self { root: None }
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, delivery_id: Uuid, file: ProofFile) -> Result<Option<String>, AppError> {
        let Some(root) = &self.root else {
            return Ok(None);
        };

        let name = sanitize_filename(&file.filename);
        let dir = root.join(delivery_id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|err| AppError::Storage(format!("failed to create {}: {err}", dir.display())))?;

        let path = dir.join(format!("{}-{name}", Uuid::new_v4()));
        tokio::fs::write(&path, &file.bytes)
            .await
            .map_err(|err| AppError::Storage(format!("failed to write {}: {err}", path.display())))?;

        info!(delivery_id = %delivery_id, path = %path.display(), "proof file stored");
        Ok(Some(format!("file://{}", path.display())))
    }
}

fn sanitize_filename(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "proof".to_string()
    } else {
        trimmed.to_string()
    }
}
