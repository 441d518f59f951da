//! Document collections behind the resource handlers.
//!
//! Each collection is reached through [`Collection`], keyed by a single
//! string key. Uniqueness (of the key and of any extra unique field such as a
//! project name) is enforced by the backend and surfaces as
//! [`StoreError::Conflict`].

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection}: no document with key {key:?}")]
    NotFound {
        collection: &'static str,
        key: String,
    },

    #[error("{collection}: unique constraint violated ({detail})")]
    Conflict {
        collection: &'static str,
        detail: String,
    },

    /// Connection, timeout or decoding failure. Never retried.
    #[error("store unavailable: {message}")]
    Transient { message: String },
}

impl StoreError {
    pub fn transient(err: impl std::fmt::Display) -> Self {
        Self::Transient {
            message: err.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Single-pass lazy scan over a collection. Dropping it releases the
/// underlying cursor.
pub type DocumentStream<'a, D> = BoxStream<'a, StoreResult<D>>;

/// A record stored in a [`Collection`].
pub trait Document: Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn key(&self) -> &str;

    /// Fields other than the key that must be unique across the collection.
    fn unique_fields(&self) -> Vec<(&'static str, &str)> {
        Vec::new()
    }
}

#[async_trait]
pub trait Collection<D: Document>: Send + Sync {
    async fn find_by_key(&self, key: &str) -> StoreResult<D>;

    async fn insert_unique(&self, doc: &D) -> StoreResult<()>;

    /// Replaces the whole document stored under `key` and returns the number
    /// of matched documents. Zero matches is not an error.
    async fn update_by_key(&self, key: &str, doc: &D) -> StoreResult<u64>;

    async fn delete_by_key(&self, key: &str) -> StoreResult<()>;

    fn list_all(&self) -> DocumentStream<'_, D>;
}

/// Reachability probe used by the health reporter.
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self, timeout: Duration) -> StoreResult<()>;
}
