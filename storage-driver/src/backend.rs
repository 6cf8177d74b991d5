use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use object_store::aws::{AmazonS3Builder, S3ConditionalPut};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore, PutMode, PutPayload, UpdateVersion};
use once_cell::sync::Lazy;
use release_types::{Labels, Release};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::config::StorageConfig;
use crate::error::{DriverError, Result};
use crate::key::ReleaseKey;
use crate::labels::{matches, warn_shadowed_labels};
use crate::record::StoredRecord;
use crate::{Creator, Deletor, Driver, Predicate, Queryor, Updator};

pub const OBJECT_STORE_DRIVER_NAME: &str = "ObjectStore";

const DEFAULT_PREFIX: &str = "releases";
const MAX_UPDATE_ATTEMPTS: usize = 8;
const OPTIMISTIC_SCAN_ATTEMPTS: usize = 3;

// Shared by every driver in the process that points at the same store and
// prefix, so two handles on one directory still serialize per key.
static KEY_LOCKS: Lazy<DashMap<(String, String), Arc<Mutex<()>>>> = Lazy::new(DashMap::new);
static SCAN_GATES: Lazy<DashMap<String, Arc<RwLock<()>>>> = Lazy::new(DashMap::new);

/// Driver persisting each release as one JSON object under
/// `<prefix>/<key>.json`.
///
/// Creates use `PutMode::Create` and updates use `PutMode::Update` against
/// the version that was read, so a writer in another process cannot be
/// silently overwritten or resurrect a deleted key. Stores that lack
/// conditional writes (the local filesystem has no conditional update) fall
/// back to a per-key lock shared by all drivers in this process on the same
/// store.
///
/// Scans do not block writers: a listing is read, the records fetched, and
/// the listing read again. If nothing changed in between, the records are a
/// snapshot. After a few contended attempts the scan excludes in-process
/// writers instead.
pub struct ObjectStoreDriver {
    store: Arc<dyn ObjectStore>,
    prefix: Path,
    scope: String,
    pub(crate) scan_gate: Arc<RwLock<()>>,
}

impl ObjectStoreDriver {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::scoped(store, Path::from(DEFAULT_PREFIX))
    }

    #[must_use]
    pub fn with_prefix(self, prefix: impl AsRef<str>) -> Self {
        Self::scoped(self.store, Path::from(prefix.as_ref()))
    }

    fn scoped(store: Arc<dyn ObjectStore>, prefix: Path) -> Self {
        let scope = format!("{store}/{prefix}");
        let scan_gate = SCAN_GATES.entry(scope.clone()).or_default().value().clone();
        Self {
            store,
            prefix,
            scope,
            scan_gate,
        }
    }

    pub fn from_config(config: StorageConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn ObjectStore> = match config {
            StorageConfig::Local { path } => {
                info!("Initializing local release storage at: {:?}", path);
                std::fs::create_dir_all(&path)
                    .with_context(|| format!("Failed to create storage directory {path:?}"))?;
                Arc::new(LocalFileSystem::new_with_prefix(path)?)
            }
            StorageConfig::InMemoryObjectStore => {
                info!("Initializing in-memory object store");
                Arc::new(InMemory::new())
            }
            StorageConfig::S3 {
                bucket,
                region,
                endpoint,
                access_key_id,
                secret_access_key,
                allow_http,
            } => {
                info!("Initializing S3 release storage in bucket: {}", bucket);
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(bucket)
                    .with_allow_http(allow_http)
                    .with_conditional_put(S3ConditionalPut::ETagMatch);
                if let Some(region) = region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                if let Some(access_key_id) = access_key_id {
                    builder = builder.with_access_key_id(access_key_id);
                }
                if let Some(secret_access_key) = secret_access_key {
                    builder = builder.with_secret_access_key(secret_access_key);
                }
                Arc::new(builder.build()?)
            }
            StorageConfig::Memory => {
                bail!("The memory driver is not backed by an object store")
            }
        };

        Ok(Self::new(store))
    }

    fn record_path(&self, key: &str) -> Path {
        self.prefix.child(format!("{key}.json"))
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        KEY_LOCKS
            .entry((self.scope.clone(), key.to_string()))
            .or_default()
            .value()
            .clone()
    }

    async fn read_record(&self, path: &Path) -> Result<Option<StoredRecord>> {
        Ok(self.read_versioned(path).await?.map(|(record, _)| record))
    }

    async fn read_versioned(&self, path: &Path) -> Result<Option<(StoredRecord, UpdateVersion)>> {
        match self.store.get(path).await {
            Ok(result) => {
                let version = UpdateVersion {
                    e_tag: result.meta.e_tag.clone(),
                    version: result.meta.version.clone(),
                };
                let bytes = result.bytes().await?;
                Ok(Some((StoredRecord::from_json(&bytes)?, version)))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn listing(&self) -> Result<Vec<ObjectMeta>> {
        let mut listing = Vec::new();
        let mut stream = self.store.list(Some(&self.prefix));

        while let Some(meta) = stream.next().await.transpose()? {
            if meta.location.extension() == Some("json") {
                listing.push(meta);
            }
        }

        listing.sort_by(|a, b| a.location.cmp(&b.location));
        Ok(listing)
    }

    /// Fetches every listed record. Returns `None` when one has vanished
    /// since the listing, unless `skip_missing` is set.
    async fn read_listed(
        &self,
        listing: &[ObjectMeta],
        skip_missing: bool,
    ) -> Result<Option<Vec<StoredRecord>>> {
        let mut records = Vec::with_capacity(listing.len());

        for meta in listing {
            let bytes = match self.store.get(&meta.location).await {
                Ok(result) => result.bytes().await?,
                Err(object_store::Error::NotFound { .. }) if skip_missing => continue,
                Err(object_store::Error::NotFound { .. }) => return Ok(None),
                Err(e) => return Err(e.into()),
            };

            match StoredRecord::from_json(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping undecodable record {}: {}", meta.location, e),
            }
        }

        Ok(Some(records))
    }

    async fn scan(&self) -> Result<Vec<StoredRecord>> {
        for attempt in 1..=OPTIMISTIC_SCAN_ATTEMPTS {
            let before = self.listing().await?;
            let Some(records) = self.read_listed(&before, false).await? else {
                debug!("Scan attempt {} lost a record, retrying", attempt);
                continue;
            };
            if self.listing().await? == before {
                return Ok(records);
            }
            debug!("Scan attempt {} raced a write, retrying", attempt);
        }

        debug!("Falling back to an exclusive scan of {}", self.prefix);
        let _gate = self.scan_gate.write().await;
        let listing = self.listing().await?;
        Ok(self
            .read_listed(&listing, true)
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl Creator for ObjectStoreDriver {
    #[instrument(skip(self, release))]
    async fn create(&self, key: &str, release: &Release) -> Result<()> {
        ReleaseKey::parse(key)?;
        debug!("Creating release {}", key);
        warn_shadowed_labels(key, release);

        let _gate = self.scan_gate.read().await;
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let path = self.record_path(key);
        let record = StoredRecord::new(key, release);
        let payload = PutPayload::from(record.to_json()?);

        match self
            .store
            .put_opts(&path, payload.clone(), PutMode::Create.into())
            .await
        {
            Ok(_) => {}
            Err(object_store::Error::AlreadyExists { .. }) => {
                return Err(DriverError::already_exists(key));
            }
            // Stores without conditional writes rely on the per-key lock.
            Err(object_store::Error::NotImplemented) => {
                if self.read_record(&path).await?.is_some() {
                    return Err(DriverError::already_exists(key));
                }
                self.store.put(&path, payload).await?;
            }
            Err(e) => return Err(e.into()),
        }

        info!("Created release {}", key);
        Ok(())
    }
}

#[async_trait]
impl Updator for ObjectStoreDriver {
    #[instrument(skip(self, release))]
    async fn update(&self, key: &str, release: &Release) -> Result<()> {
        ReleaseKey::parse(key)?;
        debug!("Updating release {}", key);
        warn_shadowed_labels(key, release);

        let _gate = self.scan_gate.read().await;
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let path = self.record_path(key);
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let (mut record, version) = self
                .read_versioned(&path)
                .await?
                .ok_or_else(|| DriverError::not_found(key))?;

            record.replace(release);
            let payload = PutPayload::from(record.to_json()?);

            match self
                .store
                .put_opts(&path, payload.clone(), PutMode::Update(version).into())
                .await
            {
                Ok(_) => {}
                // Deleted since the read.
                Err(object_store::Error::NotFound { .. }) => {
                    return Err(DriverError::not_found(key));
                }
                // Rewritten or deleted by another process since the read.
                Err(object_store::Error::Precondition { .. }) => {
                    debug!("Update attempt {} of {} lost a race", attempt, key);
                    continue;
                }
                // No conditional update: the record was read under the
                // per-key lock, which every in-process writer takes.
                Err(object_store::Error::NotImplemented) => {
                    self.store.put(&path, payload).await?;
                }
                Err(e) => return Err(e.into()),
            }

            info!("Updated release {}", key);
            return Ok(());
        }

        Err(DriverError::Backend(anyhow!(
            "release {key:?} kept changing during {MAX_UPDATE_ATTEMPTS} update attempts"
        )))
    }
}

#[async_trait]
impl Deletor for ObjectStoreDriver {
    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<Release> {
        ReleaseKey::parse(key)?;
        debug!("Deleting release {}", key);

        let _gate = self.scan_gate.read().await;
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let path = self.record_path(key);
        let record = self
            .read_record(&path)
            .await?
            .ok_or_else(|| DriverError::not_found(key))?;

        match self.store.delete(&path).await {
            Ok(()) => {}
            Err(object_store::Error::NotFound { .. }) => return Err(DriverError::not_found(key)),
            Err(e) => return Err(e.into()),
        }

        info!("Deleted release {}", key);
        Ok(record.release)
    }
}

#[async_trait]
impl Queryor for ObjectStoreDriver {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Release> {
        ReleaseKey::parse(key)?;
        debug!("Getting release {}", key);

        self.read_record(&self.record_path(key))
            .await?
            .map(|record| record.release)
            .ok_or_else(|| DriverError::not_found(key))
    }

    #[instrument(skip(self, filter))]
    async fn list(&self, filter: &Predicate<'_>) -> Result<Vec<Release>> {
        let records = self.scan().await?;
        let total = records.len();

        let matched: Vec<Release> = records
            .into_iter()
            .map(|record| record.release)
            .filter(|release| filter(release))
            .collect();

        debug!("Listed {} of {} releases", matched.len(), total);
        Ok(matched)
    }

    #[instrument(skip(self))]
    async fn query(&self, labels: &Labels) -> Result<Vec<Release>> {
        let records = self.scan().await?;
        let total = records.len();

        let matched: Vec<Release> = records
            .into_iter()
            .filter(|record| matches(labels, &record.labels))
            .map(|record| record.release)
            .collect();

        debug!("Query matched {} of {} releases", matched.len(), total);
        Ok(matched)
    }
}

impl Driver for ObjectStoreDriver {
    fn name(&self) -> &'static str {
        OBJECT_STORE_DRIVER_NAME
    }
}
