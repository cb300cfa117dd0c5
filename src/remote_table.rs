use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;

use crate::{
    db,
    migrate::{self, REMOTE_MIGRATIONS},
    model::{AssetForm, AssetRecord, DuplicateKind},
    time::now_ms,
    validation::{self, ValidationError},
    AppError, AppResult,
};

pub const TABLE_INSERT_FAILED: &str = "TABLE/INSERT";
pub const TABLE_FETCH_FAILED: &str = "TABLE/FETCH";

/// A row of the server-side `items` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RemoteItem {
    pub id: i64,
    pub brand: String,
    pub serial_number: String,
    pub asset_tag: String,
    pub model: String,
    pub ram: String,
    pub processor: String,
    pub motherboard: String,
    pub storage: String,
    pub location: String,
    #[ts(type = "number")]
    pub created_at: i64,
}

/// Columns accepted by [`RemoteTable::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub brand: String,
    pub serial_number: String,
    pub asset_tag: String,
    pub model: String,
    pub ram: String,
    pub processor: String,
    pub motherboard: String,
    pub storage: String,
    pub location: String,
}

impl NewItem {
    /// Check a request body. The table does not know the form catalogs, so only
    /// presence and the numeric asset tag are enforced here.
    pub fn from_form(form: &AssetForm) -> Result<Self, ValidationError> {
        use validation::required;

        let asset_tag = required("assetTag", &form.asset_tag)?;
        if !validation::is_numeric_tag(&asset_tag) {
            return Err(ValidationError::AssetTagNotNumeric(asset_tag));
        }
        Ok(NewItem {
            brand: required("brand", &form.brand)?,
            serial_number: required("serialNumber", &form.serial_number)?,
            asset_tag,
            model: required("model", &form.model)?,
            ram: required("ram", &form.ram_spec)?,
            processor: required("processor", &form.processor)?,
            motherboard: required("motherboard", &form.motherboard)?,
            storage: required("storage", &form.storage)?,
            location: required("location", &form.location)?,
        })
    }
}

impl From<&AssetRecord> for NewItem {
    fn from(record: &AssetRecord) -> Self {
        NewItem {
            brand: record.brand.clone(),
            serial_number: record.serial_number.clone(),
            asset_tag: record.asset_tag.clone(),
            model: record.model.clone(),
            ram: record.ram_spec.clone(),
            processor: record.processor.clone(),
            motherboard: record.motherboard.clone(),
            storage: record.storage.clone(),
            location: record.location.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error(transparent)]
    Duplicate(DuplicateKind),
    #[error(transparent)]
    Database(AppError),
}

impl From<TableError> for AppError {
    fn from(error: TableError) -> Self {
        match error {
            TableError::Duplicate(kind) => AppError::new(kind.code(), kind.to_string()),
            TableError::Database(err) => err,
        }
    }
}

/// Relational table of record. Uniqueness of serial number and asset tag is
/// enforced by unique indexes, so concurrent inserts cannot both succeed.
#[derive(Clone)]
pub struct RemoteTable {
    pool: SqlitePool,
}

fn row_to_item(row: &SqliteRow) -> Result<RemoteItem, sqlx::Error> {
    Ok(RemoteItem {
        id: row.try_get("id")?,
        brand: row.try_get("brand")?,
        serial_number: row.try_get("serial_number")?,
        asset_tag: row.try_get("asset_tag")?,
        model: row.try_get("model")?,
        ram: row.try_get("ram")?,
        processor: row.try_get("processor")?,
        motherboard: row.try_get("motherboard")?,
        storage: row.try_get("storage")?,
        location: row.try_get("location")?,
        created_at: row.try_get("created_at")?,
    })
}

impl RemoteTable {
    pub async fn open(db_path: &Path) -> AppResult<Self> {
        let pool = db::open_sqlite_pool(db_path).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> AppResult<Self> {
        let version = migrate::apply_migrations(&pool, &REMOTE_MIGRATIONS).await?;
        info!(target: "edu_inventory", event = "remote_table_ready", schema_version = version);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Which unique columns already hold these values.
    pub async fn find_collision(
        &self,
        serial_number: &str,
        asset_tag: &str,
    ) -> AppResult<Option<DuplicateKind>> {
        let rows = sqlx::query(
            "SELECT serial_number, asset_tag FROM items WHERE serial_number = ? OR asset_tag = ?",
        )
        .bind(serial_number)
        .bind(asset_tag)
        .fetch_all(&self.pool)
        .await?;

        let mut serial_taken = false;
        let mut tag_taken = false;
        for row in &rows {
            let serial: String = row.try_get("serial_number")?;
            let tag: String = row.try_get("asset_tag")?;
            serial_taken |= serial == serial_number;
            tag_taken |= tag == asset_tag;
        }
        Ok(DuplicateKind::classify(serial_taken, tag_taken))
    }

    pub async fn insert(&self, item: &NewItem) -> Result<RemoteItem, TableError> {
        let result = sqlx::query(
            "INSERT INTO items (brand, serial_number, asset_tag, model, ram, processor, \
             motherboard, storage, location, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING id, brand, serial_number, asset_tag, model, ram, processor, \
             motherboard, storage, location, created_at",
        )
        .bind(&item.brand)
        .bind(&item.serial_number)
        .bind(&item.asset_tag)
        .bind(&item.model)
        .bind(&item.ram)
        .bind(&item.processor)
        .bind(&item.motherboard)
        .bind(&item.storage)
        .bind(&item.location)
        .bind(now_ms())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                let created = row_to_item(&row).map_err(|err| {
                    TableError::Database(
                        AppError::new(TABLE_INSERT_FAILED, "Failed to add item.").with_cause(err),
                    )
                })?;
                info!(
                    target: "edu_inventory",
                    event = "table_item_inserted",
                    id = created.id,
                    serial_number = %created.serial_number
                );
                Ok(created)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let kind = self
                    .find_collision(&item.serial_number, &item.asset_tag)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| {
                        if db_err.message().contains("serial_number") {
                            DuplicateKind::SerialNumber
                        } else {
                            DuplicateKind::AssetTag
                        }
                    });
                warn!(
                    target: "edu_inventory",
                    event = "table_duplicate_rejected",
                    serial_number = %item.serial_number,
                    asset_tag = %item.asset_tag,
                    kind = kind.code()
                );
                Err(TableError::Duplicate(kind))
            }
            Err(err) => Err(TableError::Database(
                AppError::new(TABLE_INSERT_FAILED, "Failed to add item.").with_cause(err),
            )),
        }
    }

    pub async fn list_all(&self) -> AppResult<Vec<RemoteItem>> {
        let rows = sqlx::query(
            "SELECT id, brand, serial_number, asset_tag, model, ram, processor, motherboard, \
             storage, location, created_at FROM items ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|err| AppError::new(TABLE_FETCH_FAILED, "Failed to fetch items.").with_cause(err))?;

        rows.iter()
            .map(|row| {
                row_to_item(row).map_err(|err| {
                    AppError::new(TABLE_FETCH_FAILED, "Failed to fetch items.").with_cause(err)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(serial: &str, tag: &str) -> NewItem {
        NewItem {
            brand: "Lenovo".into(),
            serial_number: serial.into(),
            asset_tag: tag.into(),
            model: "ChromeBook".into(),
            ram: "4GBDDR4".into(),
            processor: "MediaTek".into(),
            motherboard: "n/a".into(),
            storage: "32GB eMMC".into(),
            location: "Universidade Aberta Brasileira".into(),
        }
    }

    async fn table() -> RemoteTable {
        let pool = db::open_memory_pool().await.unwrap();
        RemoteTable::from_pool(pool).await.unwrap()
    }

    #[tokio::test]
    async fn insert_returns_all_columns() {
        let table = table().await;
        let created = table.insert(&item("SN1", "100")).await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.serial_number, "SN1");
        assert!(created.created_at > 0);
        assert_eq!(table.list_all().await.unwrap(), vec![created]);
    }

    #[tokio::test]
    async fn duplicates_are_classified_three_ways() {
        let table = table().await;
        table.insert(&item("SN1", "100")).await.unwrap();
        table.insert(&item("SN2", "200")).await.unwrap();

        let serial = table.insert(&item("SN1", "999")).await.unwrap_err();
        assert!(matches!(serial, TableError::Duplicate(DuplicateKind::SerialNumber)));

        let tag = table.insert(&item("SN9", "100")).await.unwrap_err();
        assert!(matches!(tag, TableError::Duplicate(DuplicateKind::AssetTag)));

        let both = table.insert(&item("SN1", "100")).await.unwrap_err();
        assert!(matches!(both, TableError::Duplicate(DuplicateKind::Both)));

        // serial of one row, tag of another
        let crossed = table.insert(&item("SN1", "200")).await.unwrap_err();
        assert!(matches!(crossed, TableError::Duplicate(DuplicateKind::Both)));

        assert_eq!(table.list_all().await.unwrap().len(), 2);
    }

    #[test]
    fn request_body_needs_numeric_tag_and_fields() {
        let mut form = AssetForm {
            brand: "HP".into(),
            serial_number: "BRJ123".into(),
            asset_tag: "77".into(),
            model: "Impressora".into(),
            ram_spec: "NotFound".into(),
            processor: "-".into(),
            motherboard: "-".into(),
            storage: "-".into(),
            location: "Secretaria Municipal de Educação e Cultura".into(),
            sector: String::new(),
        };
        assert!(NewItem::from_form(&form).is_ok());

        form.asset_tag = "7x".into();
        assert!(matches!(
            NewItem::from_form(&form),
            Err(ValidationError::AssetTagNotNumeric(_))
        ));

        form.asset_tag = "77".into();
        form.brand.clear();
        assert_eq!(
            NewItem::from_form(&form).unwrap_err(),
            ValidationError::MissingField("brand")
        );
    }
}
