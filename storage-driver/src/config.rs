use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::ObjectStoreDriver;
use crate::memory::MemoryDriver;
use crate::Driver;

pub const DEFAULT_STORAGE_PATH: &str = "./releases";

/// Backend selection, resolved once when the driver is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageConfig {
    Memory,
    Local {
        path: PathBuf,
    },
    InMemoryObjectStore,
    S3 {
        bucket: String,
        region: Option<String>,
        endpoint: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        allow_http: bool,
    },
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self::Memory
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local { path: path.into() }
    }

    pub fn s3(
        bucket: impl Into<String>,
        region: Option<String>,
        endpoint: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        allow_http: bool,
    ) -> Self {
        Self::S3 {
            bucket: bucket.into(),
            region,
            endpoint,
            access_key_id,
            secret_access_key,
            allow_http,
        }
    }

    /// Reads `RELEASE_STORAGE_DRIVER` (`memory`, `local`, `object-memory` or
    /// `s3`) and the variables the chosen backend needs.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let driver = var("RELEASE_STORAGE_DRIVER").unwrap_or_else(|| "memory".to_string());

        match driver.as_str() {
            "memory" => Ok(Self::memory()),
            "local" => {
                let path = var("RELEASE_STORAGE_PATH")
                    .unwrap_or_else(|| DEFAULT_STORAGE_PATH.to_string());
                Ok(Self::local(path))
            }
            "object-memory" => Ok(Self::InMemoryObjectStore),
            "s3" => {
                let bucket = var("AWS_BUCKET")
                    .ok_or_else(|| anyhow::anyhow!("AWS_BUCKET is required for S3 backend"))?;
                let allow_http = var("AWS_ALLOW_HTTP")
                    .and_then(|v| v.parse::<bool>().ok())
                    .unwrap_or(false);

                Ok(Self::s3(
                    bucket,
                    var("AWS_REGION"),
                    var("AWS_ENDPOINT"),
                    var("AWS_ACCESS_KEY_ID"),
                    var("AWS_SECRET_ACCESS_KEY"),
                    allow_http,
                ))
            }
            _ => anyhow::bail!(
                "Unknown storage driver: {}. Must be 'memory', 'local', 'object-memory' or 's3'",
                driver
            ),
        }
    }
}

/// Builds the driver selected by `config`.
pub fn new_driver(config: StorageConfig) -> anyhow::Result<Arc<dyn Driver>> {
    let driver: Arc<dyn Driver> = match config {
        StorageConfig::Memory => Arc::new(MemoryDriver::new()),
        other => Arc::new(ObjectStoreDriver::from_config(other)?),
    };
    Ok(driver)
}
