use release_types::{Labels, Release, ReleaseStatus};
use std::sync::Arc;
use tracing::debug;

use crate::error::{DriverError, Result};
use crate::key::ReleaseKey;
use crate::labels::NAME_LABEL;
use crate::{Creator, Deletor, Driver, Queryor, Updator};

/// Addresses releases by name and revision on top of any [`Driver`].
#[derive(Clone)]
pub struct Storage {
    driver: Arc<dyn Driver>,
}

impl Storage {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    pub fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    pub async fn get(&self, name: &str, version: u32) -> Result<Release> {
        debug!("getting release {}.v{}", name, version);
        self.driver.get(&ReleaseKey::new(name, version).to_string()).await
    }

    pub async fn create(&self, release: &Release) -> Result<()> {
        debug!("creating release {}", release);
        self.driver
            .create(&ReleaseKey::from(release).to_string(), release)
            .await
    }

    pub async fn update(&self, release: &Release) -> Result<()> {
        debug!("updating release {}", release);
        self.driver
            .update(&ReleaseKey::from(release).to_string(), release)
            .await
    }

    pub async fn delete(&self, name: &str, version: u32) -> Result<Release> {
        debug!("deleting release {}.v{}", name, version);
        self.driver
            .delete(&ReleaseKey::new(name, version).to_string())
            .await
    }

    pub async fn list_releases(&self) -> Result<Vec<Release>> {
        debug!("listing all releases in storage");
        self.driver.list(&|_| true).await
    }

    pub async fn list_deployed(&self) -> Result<Vec<Release>> {
        debug!("listing all deployed releases in storage");
        self.driver
            .list(&|release| release.status == ReleaseStatus::Deployed)
            .await
    }

    /// Every stored revision of `name`, oldest first.
    pub async fn history(&self, name: &str) -> Result<Vec<Release>> {
        debug!("getting release history for {:?}", name);
        let filter = Labels::from([(NAME_LABEL.to_string(), name.to_string())]);
        let mut releases = self.driver.query(&filter).await?;
        releases.sort_by_key(|release| release.version);
        Ok(releases)
    }

    /// Highest stored revision of `name`.
    pub async fn last(&self, name: &str) -> Result<Release> {
        self.history(name)
            .await?
            .pop()
            .ok_or_else(|| DriverError::not_found(name))
    }

    /// Highest deployed revision of `name`.
    pub async fn deployed(&self, name: &str) -> Result<Release> {
        debug!("getting deployed release from {:?} history", name);
        self.history(name)
            .await?
            .into_iter()
            .rev()
            .find(|release| release.status == ReleaseStatus::Deployed)
            .ok_or_else(|| DriverError::not_found(name))
    }
}
