#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use edu_inventory_lib::{
    db,
    local_store::{LocalStore, SqliteLocalStore},
    mirror::{Mirror, MirrorError},
    validation::validate_form,
    AppError, AppResult, AssetForm, AssetInput, AssetRecord,
};
use futures::future::BoxFuture;
use futures::FutureExt;

pub fn form(serial: &str, tag: &str) -> AssetForm {
    AssetForm {
        brand: "Positivo".into(),
        serial_number: serial.into(),
        asset_tag: tag.into(),
        model: "Notebook".into(),
        ram_spec: "4GBDDR4".into(),
        processor: "Intel Celeron N4020".into(),
        motherboard: "Positivo N14".into(),
        storage: "64GB eMMC".into(),
        location: "escola_tunel".into(),
        sector: "Laboratório de informática".into(),
    }
}

pub fn input(serial: &str, tag: &str) -> AssetInput {
    validate_form(&form(serial, tag)).expect("fixture form is valid")
}

pub async fn memory_store() -> Arc<SqliteLocalStore> {
    let pool = db::open_memory_pool().await.expect("open sqlite::memory:");
    Arc::new(SqliteLocalStore::from_pool(pool).await.expect("local schema"))
}

/// Reads succeed and are empty; every write fails.
pub struct FailingStore;

impl LocalStore for FailingStore {
    fn put<'a>(&'a self, record: &'a AssetRecord) -> BoxFuture<'a, AppResult<()>> {
        async move {
            Err(AppError::new("LOCAL/PUT", "disk is read-only")
                .with_context("serial_number", record.serial_number.clone()))
        }
        .boxed()
    }

    fn get_all(&self) -> BoxFuture<'_, AppResult<Vec<AssetRecord>>> {
        async { Ok(Vec::new()) }.boxed()
    }

    fn delete<'a>(&'a self, _serial_number: &'a str) -> BoxFuture<'a, AppResult<bool>> {
        async { Err(AppError::new("LOCAL/DELETE", "disk is read-only")) }.boxed()
    }
}

/// Remembers every serial it was asked to mirror; optionally refuses them all.
#[derive(Default)]
pub struct RecordingMirror {
    pub seen: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingMirror {
    pub fn failing() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Mirror for RecordingMirror {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn mirror<'a>(&'a self, record: &'a AssetRecord) -> BoxFuture<'a, Result<(), MirrorError>> {
        async move {
            self.seen.lock().unwrap().push(record.serial_number.clone());
            if self.fail {
                Err(MirrorError::Status {
                    status: 503,
                    body: "unavailable".into(),
                })
            } else {
                Ok(())
            }
        }
        .boxed()
    }
}
