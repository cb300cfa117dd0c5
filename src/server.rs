//! HTTP backend over the remote table.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    model::AssetForm,
    remote_table::{
        NewItem, RemoteItem, RemoteTable, TableError, TABLE_FETCH_FAILED, TABLE_INSERT_FAILED,
    },
    validation::ValidationError,
    AppError, AppResult,
};

pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Every failure of the items API is a 400 carrying `{"error", "code"}`.
#[derive(Debug)]
pub struct ApiError {
    code: String,
    message: String,
}

impl ApiError {
    fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message, "code": self.code });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::new(err.code(), err.to_string())
    }
}

impl From<TableError> for ApiError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::Duplicate(kind) => ApiError::new(kind.code(), kind.to_string()),
            TableError::Database(cause) => {
                error!(
                    target: "edu_inventory",
                    event = "items_insert_failed",
                    code = %cause.code(),
                    error = %cause
                );
                ApiError::new(TABLE_INSERT_FAILED, "Failed to add item.")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        info!(
            target: "edu_inventory",
            event = "items_body_rejected",
            error = %rejection.body_text()
        );
        ApiError::new(TABLE_INSERT_FAILED, "Failed to add item.")
    }
}

pub fn build_router(table: RemoteTable) -> Router {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(table)
}

async fn health() -> &'static str {
    "ok"
}

async fn create_item(
    State(table): State<RemoteTable>,
    body: Result<Json<AssetForm>, JsonRejection>,
) -> Result<(StatusCode, Json<RemoteItem>), ApiError> {
    let Json(form) = body?;
    let item = NewItem::from_form(&form)?;
    let created = table.insert(&item).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_items(State(table): State<RemoteTable>) -> Result<Json<Vec<RemoteItem>>, ApiError> {
    table.list_all().await.map(Json).map_err(|err| {
        error!(
            target: "edu_inventory",
            event = "items_fetch_failed",
            code = %err.code(),
            error = %err
        );
        ApiError::new(TABLE_FETCH_FAILED, "Failed to fetch items.")
    })
}

/// Serve until the listener fails or the process receives Ctrl-C.
pub async fn serve(listener: TcpListener, table: RemoteTable) -> AppResult<()> {
    let addr = listener.local_addr()?;
    info!(target: "edu_inventory", event = "items_api_listening", addr = %addr);
    axum::serve(listener, build_router(table))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!(target: "edu_inventory", event = "items_api_shutdown");
        })
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "items_api_serve"))
}
