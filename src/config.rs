use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mirror::DEFAULT_MIRROR_TIMEOUT;
use crate::{AppError, AppResult};

pub const ENV_DATA_DIR: &str = "EDU_INVENTORY_DATA_DIR";
pub const ENV_WEBHOOK_URL: &str = "EDU_INVENTORY_WEBHOOK_URL";
pub const ENV_BACKEND_URL: &str = "EDU_INVENTORY_BACKEND_URL";
pub const ENV_LISTEN: &str = "EDU_INVENTORY_LISTEN";
pub const ENV_MIRROR_TIMEOUT_SECS: &str = "EDU_INVENTORY_MIRROR_TIMEOUT_SECS";

pub const APP_DIR_NAME: &str = "edu-inventory";
pub const LOCAL_DB_FILE: &str = "inventory.sqlite3";
pub const REMOTE_DB_FILE: &str = "items.sqlite3";
pub const DEFAULT_LISTEN: &str = "0.0.0.0:3000";

const CONFIG_INVALID: &str = "CONFIG/INVALID";

/// Runtime settings. Resolved once at startup; CLI flags override afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub webhook_url: Option<String>,
    pub backend_url: Option<String>,
    pub listen: SocketAddr,
    pub mirror_timeout: Duration,
}

pub fn default_data_dir() -> PathBuf {
    let base = dirs::data_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(APP_DIR_NAME)
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_dir = get(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let listen_raw = get(ENV_LISTEN).unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen = parse_listen(&listen_raw)?;

        let mirror_timeout = match get(ENV_MIRROR_TIMEOUT_SECS) {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    AppError::new(
                        CONFIG_INVALID,
                        "Mirror timeout must be a positive number of seconds.",
                    )
                    .with_context("key", ENV_MIRROR_TIMEOUT_SECS)
                    .with_context("value", raw.clone())
                })?,
            None => DEFAULT_MIRROR_TIMEOUT,
        };

        Ok(Config {
            data_dir,
            webhook_url: get(ENV_WEBHOOK_URL),
            backend_url: get(ENV_BACKEND_URL),
            listen,
            mirror_timeout,
        })
    }

    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn local_db_path(&self) -> PathBuf {
        self.data_dir.join(LOCAL_DB_FILE)
    }

    pub fn remote_db_path(&self) -> PathBuf {
        self.data_dir.join(REMOTE_DB_FILE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

pub fn parse_listen(raw: &str) -> AppResult<SocketAddr> {
    raw.parse().map_err(|_| {
        AppError::new(CONFIG_INVALID, "Listen address must look like HOST:PORT.")
            .with_context("key", ENV_LISTEN)
            .with_context("value", raw)
    })
}
