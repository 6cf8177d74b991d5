//! Pluggable storage for release records.
//!
//! A [`Driver`] is the composition of four capabilities ([`Creator`],
//! [`Updator`], [`Deletor`], [`Queryor`]) plus a name. Every backend behaves
//! identically at this seam:
//!
//! - a key holds at most one release; `create` never overwrites and `update`
//!   never creates
//! - missing keys report [`DriverError::NotFound`], occupied keys on create
//!   report [`DriverError::AlreadyExists`], unparseable keys report
//!   [`DriverError::InvalidKey`]
//! - a call that returns an error has not mutated the store
//!
//! Per release the only transitions are absent to present (`create`), present
//! to present (`update`) and present to absent (`delete`).

pub mod backend;
pub mod config;
pub mod error;
pub mod key;
pub mod labels;
pub mod memory;
pub mod record;
pub mod storage;


use async_trait::async_trait;
use release_types::{Labels, Release};

pub use backend::ObjectStoreDriver;
pub use config::{new_driver, StorageConfig};
pub use error::{DriverError, ErrorKind, Result};
pub use key::ReleaseKey;
pub use memory::MemoryDriver;
pub use storage::Storage;

/// Filter applied by [`Queryor::list`]. Must be pure.
pub type Predicate<'a> = dyn Fn(&Release) -> bool + Send + Sync + 'a;

#[async_trait]
pub trait Creator: Send + Sync {
    /// Stores `release` under `key`.
    ///
    /// # Errors
    /// `AlreadyExists` if `key` is occupied, `InvalidKey` if it does not parse.
    /// The existence check and the write are atomic with respect to other
    /// creates of the same key.
    async fn create(&self, key: &str, release: &Release) -> Result<()>;
}

#[async_trait]
pub trait Updator: Send + Sync {
    /// Replaces the release stored under `key`.
    ///
    /// # Errors
    /// `NotFound` if nothing is stored under `key`; nothing is created.
    async fn update(&self, key: &str, release: &Release) -> Result<()>;
}

#[async_trait]
pub trait Deletor: Send + Sync {
    /// Removes the release stored under `key` and returns it.
    ///
    /// # Errors
    /// `NotFound` if nothing is stored under `key`.
    async fn delete(&self, key: &str) -> Result<Release>;
}

#[async_trait]
pub trait Queryor: Send + Sync {
    /// Returns the release stored under `key`, or `NotFound`.
    async fn get(&self, key: &str) -> Result<Release>;

    /// Returns every stored release for which `filter` holds, in no
    /// particular order.
    async fn list(&self, filter: &Predicate<'_>) -> Result<Vec<Release>>;

    /// Returns every stored release whose labels contain every pair of
    /// `labels`. An empty label set matches all releases.
    async fn query(&self, labels: &Labels) -> Result<Vec<Release>>;
}

/// Storage backend for releases, e.g. in memory or on an object store.
pub trait Driver: Creator + Updator + Deletor + Queryor {
    /// Stable identifier of the backend.
    fn name(&self) -> &'static str;
}
