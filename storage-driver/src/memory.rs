use async_trait::async_trait;
use release_types::{Labels, Release};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::error::{DriverError, Result};
use crate::key::ReleaseKey;
use crate::labels::{release_matches, warn_shadowed_labels};
use crate::{Creator, Deletor, Driver, Predicate, Queryor, Updator};

pub const MEMORY_DRIVER_NAME: &str = "Memory";

/// In-process driver.
///
/// Each mutation holds the write lock only for a single map operation, and
/// scans hold the read lock for their whole pass, so `list` and `query` see
/// one consistent state.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    releases: RwLock<HashMap<String, Release>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.releases.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.releases.read().await.is_empty()
    }
}

#[async_trait]
impl Creator for MemoryDriver {
    #[instrument(skip(self, release))]
    async fn create(&self, key: &str, release: &Release) -> Result<()> {
        ReleaseKey::parse(key)?;
        warn_shadowed_labels(key, release);

        match self.releases.write().await.entry(key.to_string()) {
            Entry::Occupied(_) => Err(DriverError::already_exists(key)),
            Entry::Vacant(slot) => {
                slot.insert(release.clone());
                info!("Created release {}", key);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Updator for MemoryDriver {
    #[instrument(skip(self, release))]
    async fn update(&self, key: &str, release: &Release) -> Result<()> {
        ReleaseKey::parse(key)?;
        warn_shadowed_labels(key, release);

        let mut releases = self.releases.write().await;
        let stored = releases
            .get_mut(key)
            .ok_or_else(|| DriverError::not_found(key))?;
        *stored = release.clone();

        info!("Updated release {}", key);
        Ok(())
    }
}

#[async_trait]
impl Deletor for MemoryDriver {
    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<Release> {
        ReleaseKey::parse(key)?;

        let removed = self
            .releases
            .write()
            .await
            .remove(key)
            .ok_or_else(|| DriverError::not_found(key))?;

        info!("Deleted release {}", key);
        Ok(removed)
    }
}

#[async_trait]
impl Queryor for MemoryDriver {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Release> {
        ReleaseKey::parse(key)?;

        self.releases
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| DriverError::not_found(key))
    }

    #[instrument(skip(self, filter))]
    async fn list(&self, filter: &Predicate<'_>) -> Result<Vec<Release>> {
        let releases = self.releases.read().await;
        let matched: Vec<Release> = releases
            .values()
            .filter(|release| filter(*release))
            .cloned()
            .collect();

        debug!("Listed {} of {} releases", matched.len(), releases.len());
        Ok(matched)
    }

    #[instrument(skip(self))]
    async fn query(&self, labels: &Labels) -> Result<Vec<Release>> {
        let releases = self.releases.read().await;
        let matched: Vec<Release> = releases
            .values()
            .filter(|release| release_matches(labels, release))
            .cloned()
            .collect();

        debug!("Query matched {} of {} releases", matched.len(), releases.len());
        Ok(matched)
    }
}

impl Driver for MemoryDriver {
    fn name(&self) -> &'static str {
        MEMORY_DRIVER_NAME
    }
}
