use std::path::Path;
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::FutureExt;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

use crate::{
    db::{self, run_in_tx},
    migrate::{self, LOCAL_MIGRATIONS},
    model::AssetRecord,
    AppError, AppResult,
};

pub const LOCAL_OPEN_FAILED: &str = "LOCAL/OPEN";
pub const LOCAL_PUT_FAILED: &str = "LOCAL/PUT";
pub const LOCAL_READ_FAILED: &str = "LOCAL/GET_ALL";
pub const LOCAL_DELETE_FAILED: &str = "LOCAL/DELETE";

/// Persistent key-value store of asset records keyed by serial number.
///
/// Every call is one transaction over one key (or one read); a failure leaves
/// the store as it was.
pub trait LocalStore: Send + Sync {
    /// Insert or overwrite the record stored under its serial number.
    fn put<'a>(&'a self, record: &'a AssetRecord) -> BoxFuture<'a, AppResult<()>>;

    fn get_all(&self) -> BoxFuture<'_, AppResult<Vec<AssetRecord>>>;

    /// Remove by key. Returns whether a record was present.
    fn delete<'a>(&'a self, serial_number: &'a str) -> BoxFuture<'a, AppResult<bool>>;
}

fn store_error(code: &'static str, message: &'static str, cause: AppError) -> AppError {
    AppError::new(code, message).with_cause(cause)
}

#[derive(Clone)]
pub struct SqliteLocalStore {
    pool: SqlitePool,
}

impl SqliteLocalStore {
    /// Open the store file, creating it and its schema on first use.
    pub async fn open(db_path: &Path) -> AppResult<Self> {
        let pool = db::open_sqlite_pool(db_path).await.map_err(|err| {
            store_error(LOCAL_OPEN_FAILED, "Could not open the local inventory.", err)
        })?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, running the schema upgrade once.
    pub async fn from_pool(pool: SqlitePool) -> AppResult<Self> {
        let version = migrate::apply_migrations(&pool, &LOCAL_MIGRATIONS)
            .await
            .map_err(|err| {
                store_error(LOCAL_OPEN_FAILED, "Could not prepare the local inventory.", err)
            })?;
        info!(target: "edu_inventory", event = "local_store_ready", schema_version = version);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_record(row: &SqliteRow) -> Result<AssetRecord, sqlx::Error> {
    Ok(AssetRecord {
        brand: row.try_get("brand")?,
        serial_number: row.try_get("serial_number")?,
        asset_tag: row.try_get("asset_tag")?,
        model: row.try_get("model")?,
        ram_spec: row.try_get("ram")?,
        processor: row.try_get("processor")?,
        motherboard: row.try_get("motherboard")?,
        storage: row.try_get("storage")?,
        location: row.try_get("location")?,
        sector: row.try_get("sector")?,
        registered_at: row.try_get("registered_at")?,
    })
}

impl LocalStore for SqliteLocalStore {
    fn put<'a>(&'a self, record: &'a AssetRecord) -> BoxFuture<'a, AppResult<()>> {
        async move {
            let owned = record.clone();
            run_in_tx(&self.pool, move |tx| {
                async move {
                    sqlx::query(
                        "INSERT INTO assets (serial_number, brand, asset_tag, model, ram, processor, \
                         motherboard, storage, location, sector, registered_at) \
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                         ON CONFLICT(serial_number) DO UPDATE SET \
                           brand = excluded.brand, \
                           asset_tag = excluded.asset_tag, \
                           model = excluded.model, \
                           ram = excluded.ram, \
                           processor = excluded.processor, \
                           motherboard = excluded.motherboard, \
                           storage = excluded.storage, \
                           location = excluded.location, \
                           sector = excluded.sector, \
                           registered_at = excluded.registered_at",
                    )
                    .bind(&owned.serial_number)
                    .bind(&owned.brand)
                    .bind(&owned.asset_tag)
                    .bind(&owned.model)
                    .bind(&owned.ram_spec)
                    .bind(&owned.processor)
                    .bind(&owned.motherboard)
                    .bind(&owned.storage)
                    .bind(&owned.location)
                    .bind(&owned.sector)
                    .bind(&owned.registered_at)
                    .execute(&mut **tx)
                    .await?;
                    Ok::<_, AppError>(())
                }
                .boxed()
            })
            .await
            .map_err(|err| {
                store_error(LOCAL_PUT_FAILED, "Could not save the item locally.", err)
                    .with_context("serial_number", record.serial_number.clone())
            })
        }
        .boxed()
    }

    fn get_all(&self) -> BoxFuture<'_, AppResult<Vec<AssetRecord>>> {
        async move {
            let rows = sqlx::query(
                "SELECT serial_number, brand, asset_tag, model, ram, processor, motherboard, \
                 storage, location, sector, registered_at FROM assets ORDER BY rowid",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|err| {
                store_error(LOCAL_READ_FAILED, "Could not load the local inventory.", err.into())
            })?;

            rows.iter()
                .map(|row| {
                    row_to_record(row).map_err(|err| {
                        store_error(
                            LOCAL_READ_FAILED,
                            "Could not load the local inventory.",
                            err.into(),
                        )
                    })
                })
                .collect()
        }
        .boxed()
    }

    fn delete<'a>(&'a self, serial_number: &'a str) -> BoxFuture<'a, AppResult<bool>> {
        async move {
            let key = serial_number.to_string();
            run_in_tx(&self.pool, move |tx| {
                async move {
                    let res = sqlx::query("DELETE FROM assets WHERE serial_number = ?")
                        .bind(&key)
                        .execute(&mut **tx)
                        .await?;
                    Ok::<_, AppError>(res.rows_affected() > 0)
                }
                .boxed()
            })
            .await
            .map_err(|err| {
                store_error(LOCAL_DELETE_FAILED, "Could not delete the item locally.", err)
                    .with_context("serial_number", serial_number.to_string())
            })
        }
        .boxed()
    }
}

/// Process-local store; contents vanish with the value.
#[derive(Default)]
pub struct MemoryLocalStore {
    data: Mutex<Vec<AssetRecord>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalStore for MemoryLocalStore {
    fn put<'a>(&'a self, record: &'a AssetRecord) -> BoxFuture<'a, AppResult<()>> {
        async move {
            let mut guard = self.data.lock().unwrap_or_else(|e| e.into_inner());
            match guard
                .iter_mut()
                .find(|r| r.serial_number == record.serial_number)
            {
                Some(existing) => *existing = record.clone(),
                None => guard.push(record.clone()),
            }
            Ok(())
        }
        .boxed()
    }

    fn get_all(&self) -> BoxFuture<'_, AppResult<Vec<AssetRecord>>> {
        async move { Ok(self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()) }.boxed()
    }

    fn delete<'a>(&'a self, serial_number: &'a str) -> BoxFuture<'a, AppResult<bool>> {
        async move {
            let mut guard = self.data.lock().unwrap_or_else(|e| e.into_inner());
            let before = guard.len();
            guard.retain(|r| r.serial_number != serial_number);
            Ok(guard.len() != before)
        }
        .boxed()
    }
}
