use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;
use ts_rs::TS;

use crate::{model::AssetRecord, AppError, AppResult};

mod share;
mod workbook;

pub use share::{share_link, share_text, SHARE_BASE};
pub use workbook::{workbook_bytes, SHEET_NAME};

pub const DEFAULT_EXPORT_NAME: &str = "inventario.xlsx";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ExportSummary {
    #[ts(type = "string")]
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: usize,
}

/// Replace `path` with `bytes` in one step. The parent directory must exist;
/// on failure any previous file at `path` is left as it was.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let with_path = |err: std::io::Error, operation: &'static str| {
        AppError::from(err)
            .with_context("operation", operation)
            .with_context("path", path.display().to_string())
    };

    let mut tmp =
        NamedTempFile::new_in(&parent).map_err(|err| with_path(err, "write_atomic_create"))?;
    tmp.write_all(bytes)
        .map_err(|err| with_path(err, "write_atomic_write"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| with_path(err, "write_atomic_sync"))?;
    tmp.persist(path)
        .map_err(|err| with_path(err.error, "write_atomic_persist"))?;
    Ok(())
}

/// Write every record to an `.xlsx` workbook at `path`.
pub fn export_workbook(records: &[AssetRecord], path: &Path) -> AppResult<ExportSummary> {
    let bytes = workbook_bytes(records)?;
    write_atomic(path, &bytes)?;
    info!(
        target: "edu_inventory",
        event = "workbook_exported",
        path = %path.display(),
        rows = records.len(),
        bytes = bytes.len()
    );
    Ok(ExportSummary {
        path: path.to_path_buf(),
        rows: records.len(),
        bytes: bytes.len(),
    })
}
