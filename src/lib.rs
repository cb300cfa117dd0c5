//! Equipment inventory for a municipal school network.
//!
//! Records live in a local SQLite store keyed by serial number. Each new
//! record is mirrored, best effort, to a spreadsheet webhook and to the
//! `/items` backend that fronts the remote table.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod local_store;
pub mod logging;
pub mod migrate;
pub mod mirror;
pub mod model;
pub mod registry;
pub mod remote_table;
pub mod server;
pub mod time;
pub mod validation;

pub use error::{AppError, AppResult};
pub use logging::init_logging;
pub use model::{AssetForm, AssetInput, AssetRecord, DuplicateKind};
pub use registry::{AssetRegistry, CreateOutcome, MirrorFailure, RegistryError};

/// Commit the binary was built from, or `unknown`.
pub const GIT_HASH: &str = env!("EDU_INVENTORY_GIT_HASH");
