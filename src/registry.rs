use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    local_store::LocalStore,
    mirror::{self, Mirror, MirrorError},
    model::{AssetInput, AssetRecord, DuplicateKind},
    time::registration_stamp,
    validation::ValidationError,
    AppError, AppResult,
};

pub const REGISTRY_NOT_FOUND: &str = "REGISTRY/NOT_FOUND";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    DuplicateAsset(DuplicateKind),
    #[error("No item is registered with serial number {0}.")]
    NotFound(String),
    #[error("{}", .0.message())]
    LocalStore(AppError),
}

impl From<RegistryError> for AppError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::Validation(err) => err.into(),
            RegistryError::DuplicateAsset(kind) => AppError::new(kind.code(), kind.to_string()),
            RegistryError::NotFound(serial) => AppError::new(
                REGISTRY_NOT_FOUND,
                format!("No item is registered with serial number {serial}."),
            )
            .with_context("serial_number", serial),
            RegistryError::LocalStore(err) => err,
        }
    }
}

/// A mirror that did not accept a created record.
#[derive(Debug)]
pub struct MirrorFailure {
    pub sink: &'static str,
    pub error: MirrorError,
}

/// Result of a successful create. Mirror failures are warnings; the record is
/// already stored locally.
#[derive(Debug)]
pub struct CreateOutcome {
    pub record: AssetRecord,
    pub mirror_failures: Vec<MirrorFailure>,
}

impl CreateOutcome {
    pub fn fully_mirrored(&self) -> bool {
        self.mirror_failures.is_empty()
    }
}

/// Coordinates the local store, the in-memory working set and the mirrors.
///
/// Serial numbers and asset tags are unique across the working set. Every
/// check runs before any store is touched, and the working set only changes
/// after the local write succeeded.
pub struct AssetRegistry {
    store: Arc<dyn LocalStore>,
    mirrors: Vec<Arc<dyn Mirror>>,
    items: Vec<AssetRecord>,
}

impl AssetRegistry {
    /// Load the working set from the store. The store is not read again.
    pub async fn open(
        store: Arc<dyn LocalStore>,
        mirrors: Vec<Arc<dyn Mirror>>,
    ) -> AppResult<Self> {
        let items = store.get_all().await?;
        info!(
            target: "edu_inventory",
            event = "registry_loaded",
            items = items.len(),
            mirrors = mirrors.len()
        );
        Ok(Self {
            store,
            mirrors,
            items,
        })
    }

    pub fn list(&self) -> &[AssetRecord] {
        &self.items
    }

    pub fn get(&self, serial_number: &str) -> Option<&AssetRecord> {
        self.items
            .iter()
            .find(|item| item.serial_number == serial_number)
    }

    pub fn mirror_names(&self) -> Vec<&'static str> {
        self.mirrors.iter().map(|m| m.name()).collect()
    }

    fn collision(&self, serial_number: &str, asset_tag: &str) -> Option<DuplicateKind> {
        let serial_taken = self.items.iter().any(|i| i.serial_number == serial_number);
        let tag_taken = self.items.iter().any(|i| i.asset_tag == asset_tag);
        DuplicateKind::classify(serial_taken, tag_taken)
    }

    pub async fn create(&mut self, input: AssetInput) -> Result<CreateOutcome, RegistryError> {
        if let Some(kind) = self.collision(input.serial_number(), input.asset_tag()) {
            warn!(
                target: "edu_inventory",
                event = "create_duplicate_rejected",
                serial_number = %input.serial_number(),
                asset_tag = %input.asset_tag(),
                kind = kind.code()
            );
            return Err(RegistryError::DuplicateAsset(kind));
        }

        let record = AssetRecord::from_input(input, registration_stamp());
        self.store
            .put(&record)
            .await
            .map_err(RegistryError::LocalStore)?;
        self.items.push(record.clone());
        info!(
            target: "edu_inventory",
            event = "item_created",
            serial_number = %record.serial_number,
            asset_tag = %record.asset_tag
        );

        let mut mirror_failures = Vec::new();
        for sink in &self.mirrors {
            if let Err(error) = sink.mirror(&record).await {
                mirror::log_failure(sink.name(), &record.serial_number, &error);
                mirror_failures.push(MirrorFailure {
                    sink: sink.name(),
                    error,
                });
            }
        }

        Ok(CreateOutcome {
            record,
            mirror_failures,
        })
    }

    /// Replace the record stored under `serial_number`, keeping its
    /// registration stamp. Stays local.
    pub async fn update(
        &mut self,
        serial_number: &str,
        input: AssetInput,
    ) -> Result<AssetRecord, RegistryError> {
        let position = self
            .items
            .iter()
            .position(|i| i.serial_number == serial_number)
            .ok_or_else(|| RegistryError::NotFound(serial_number.to_string()))?;

        if input.serial_number() != serial_number {
            return Err(ValidationError::SerialImmutable {
                expected: serial_number.to_string(),
                submitted: input.serial_number().to_string(),
            }
            .into());
        }

        let tag_taken = self
            .items
            .iter()
            .any(|i| i.serial_number != serial_number && i.asset_tag == input.asset_tag());
        if tag_taken {
            return Err(RegistryError::DuplicateAsset(DuplicateKind::AssetTag));
        }

        let registered_at = self.items[position].registered_at.clone();
        let record = AssetRecord::from_input(input, registered_at);
        self.store
            .put(&record)
            .await
            .map_err(RegistryError::LocalStore)?;
        self.items[position] = record.clone();
        info!(
            target: "edu_inventory",
            event = "item_updated",
            serial_number = %record.serial_number
        );
        Ok(record)
    }

    /// Remove by serial number. Deleting an absent serial is a no-op that
    /// returns `false`. Stays local.
    pub async fn delete(&mut self, serial_number: &str) -> Result<bool, RegistryError> {
        let removed_from_store = self
            .store
            .delete(serial_number)
            .await
            .map_err(RegistryError::LocalStore)?;
        let before = self.items.len();
        self.items.retain(|i| i.serial_number != serial_number);
        let removed = removed_from_store || self.items.len() != before;
        info!(
            target: "edu_inventory",
            event = "item_deleted",
            serial_number,
            removed
        );
        Ok(removed)
    }
}
