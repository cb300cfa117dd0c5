//! Best-effort, one-way replication of newly created records.
//!
//! A mirror never decides whether a create succeeded; the registry reports
//! each failure next to the created record and moves on. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    model::{AssetRecord, DuplicateKind},
    remote_table::{NewItem, RemoteTable, TableError},
    AppError, AppResult,
};

pub const MIRROR_TRANSPORT: &str = "MIRROR/TRANSPORT";
pub const MIRROR_STATUS: &str = "MIRROR/STATUS";
pub const MIRROR_DUPLICATE: &str = "MIRROR/DUPLICATE";
pub const MIRROR_TABLE: &str = "MIRROR/TABLE";

pub const DEFAULT_MIRROR_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("could not reach the mirror: {0}")]
    Transport(AppError),
    #[error("mirror answered with HTTP {status}")]
    Status { status: u16, body: String },
    #[error("mirror already holds this item: {0}")]
    Duplicate(DuplicateKind),
    #[error("mirror table rejected the item: {0}")]
    Table(AppError),
}

impl MirrorError {
    pub fn code(&self) -> &'static str {
        match self {
            MirrorError::Transport(_) => MIRROR_TRANSPORT,
            MirrorError::Status { .. } => MIRROR_STATUS,
            MirrorError::Duplicate(_) => MIRROR_DUPLICATE,
            MirrorError::Table(_) => MIRROR_TABLE,
        }
    }
}

impl From<reqwest::Error> for MirrorError {
    fn from(err: reqwest::Error) -> Self {
        MirrorError::Transport(err.into())
    }
}

impl From<MirrorError> for AppError {
    fn from(error: MirrorError) -> Self {
        let app = AppError::new(error.code(), error.to_string());
        match error {
            MirrorError::Transport(cause) | MirrorError::Table(cause) => app.with_cause(cause),
            MirrorError::Status { status, body } => app
                .with_context("status", status.to_string())
                .with_context("body", body),
            MirrorError::Duplicate(kind) => app.with_context("duplicate", kind.code()),
        }
    }
}

/// A replication target for create events.
pub trait Mirror: Send + Sync {
    /// Short label used in logs and warnings.
    fn name(&self) -> &'static str;

    fn mirror<'a>(&'a self, record: &'a AssetRecord) -> BoxFuture<'a, Result<(), MirrorError>>;
}

/// Shared client for the HTTP mirrors. The timeout is the only bound on a
/// mirror call.
pub fn http_client(timeout: Duration) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| {
            AppError::new("MIRROR/CLIENT", "Failed to build the HTTP client.").with_cause(err)
        })
}

/// Spreadsheet-ingestion endpoint: receives the full record as JSON.
pub struct WebhookMirror {
    client: reqwest::Client,
    url: String,
}

impl WebhookMirror {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl Mirror for WebhookMirror {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn mirror<'a>(&'a self, record: &'a AssetRecord) -> BoxFuture<'a, Result<(), MirrorError>> {
        async move {
            let response = self.client.post(&self.url).json(record).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(MirrorError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            info!(
                target: "edu_inventory",
                event = "mirror_webhook_ok",
                serial_number = %record.serial_number,
                status = status.as_u16()
            );
            Ok(())
        }
        .boxed()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ItemsApiError {
    #[serde(default)]
    error: String,
    #[serde(default)]
    code: Option<String>,
}

impl ItemsApiError {
    fn duplicate_kind(&self) -> Option<DuplicateKind> {
        if let Some(kind) = self.code.as_deref().and_then(DuplicateKind::from_code) {
            return Some(kind);
        }
        [
            DuplicateKind::SerialNumber,
            DuplicateKind::AssetTag,
            DuplicateKind::Both,
        ]
        .into_iter()
        .find(|kind| kind.to_string() == self.error)
    }
}

/// The `/items` backend in front of the remote table.
pub struct ItemsApiMirror {
    client: reqwest::Client,
    endpoint: String,
}

impl ItemsApiMirror {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/items", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Mirror for ItemsApiMirror {
    fn name(&self) -> &'static str {
        "items_api"
    }

    fn mirror<'a>(&'a self, record: &'a AssetRecord) -> BoxFuture<'a, Result<(), MirrorError>> {
        async move {
            let response = self.client.post(&self.endpoint).json(record).send().await?;
            let status = response.status();
            if status.is_success() {
                info!(
                    target: "edu_inventory",
                    event = "mirror_items_api_ok",
                    serial_number = %record.serial_number,
                    status = status.as_u16()
                );
                return Ok(());
            }

            let body = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::BAD_REQUEST {
                let parsed: ItemsApiError = serde_json::from_str(&body).unwrap_or_default();
                if let Some(kind) = parsed.duplicate_kind() {
                    return Err(MirrorError::Duplicate(kind));
                }
            }
            Err(MirrorError::Status {
                status: status.as_u16(),
                body,
            })
        }
        .boxed()
    }
}

/// Inserts straight into an in-process remote table.
pub struct TableMirror {
    table: Arc<RemoteTable>,
}

impl TableMirror {
    pub fn new(table: Arc<RemoteTable>) -> Self {
        Self { table }
    }
}

impl Mirror for TableMirror {
    fn name(&self) -> &'static str {
        "table"
    }

    fn mirror<'a>(&'a self, record: &'a AssetRecord) -> BoxFuture<'a, Result<(), MirrorError>> {
        async move {
            match self.table.insert(&NewItem::from(record)).await {
                Ok(_) => Ok(()),
                Err(TableError::Duplicate(kind)) => Err(MirrorError::Duplicate(kind)),
                Err(TableError::Database(err)) => Err(MirrorError::Table(err)),
            }
        }
        .boxed()
    }
}

pub(crate) fn log_failure(sink: &str, serial_number: &str, error: &MirrorError) {
    warn!(
        target: "edu_inventory",
        event = "mirror_failed",
        sink,
        serial_number,
        code = error.code(),
        error = %error
    );
}
