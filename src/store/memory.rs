//! In-memory collections for tests and database-less local runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tracing::instrument;

use super::{Collection, Document, DocumentStream, Pinger, StoreError, StoreResult};

/// One collection held in a `HashMap` behind a single mutex, so that the
/// uniqueness check and the write happen atomically.
#[derive(Debug)]
pub struct MemoryCollection<D> {
    docs: Mutex<HashMap<String, D>>,
}

impl<D> Default for MemoryCollection<D> {
    fn default() -> Self {
        Self {
            docs: Mutex::new(HashMap::new()),
        }
    }
}

impl<D: Document> MemoryCollection<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, D>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the first unique field of `doc` already used by a document stored
/// under a different key.
fn clashing_field<D: Document>(
    docs: &HashMap<String, D>,
    skip_key: &str,
    doc: &D,
) -> Option<&'static str> {
    let wanted = doc.unique_fields();
    docs.iter()
        .filter(|(key, _)| key.as_str() != skip_key)
        .find_map(|(_, other)| {
            let theirs = other.unique_fields();
            wanted
                .iter()
                .find(|(field, value)| theirs.contains(&(*field, *value)))
                .map(|(field, _)| *field)
        })
}

#[async_trait]
impl<D: Document> Collection<D> for MemoryCollection<D> {
    #[instrument(skip(self), fields(collection = D::COLLECTION))]
    async fn find_by_key(&self, key: &str) -> StoreResult<D> {
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                collection: D::COLLECTION,
                key: key.to_string(),
            })
    }

    #[instrument(skip(self, doc), fields(collection = D::COLLECTION, key = doc.key()))]
    async fn insert_unique(&self, doc: &D) -> StoreResult<()> {
        let mut docs = self.lock();
        if docs.contains_key(doc.key()) {
            return Err(StoreError::Conflict {
                collection: D::COLLECTION,
                detail: "duplicate key".into(),
            });
        }
        if let Some(field) = clashing_field(&docs, doc.key(), doc) {
            return Err(StoreError::Conflict {
                collection: D::COLLECTION,
                detail: format!("duplicate {field}"),
            });
        }
        docs.insert(doc.key().to_string(), doc.clone());
        Ok(())
    }

    #[instrument(skip(self, doc), fields(collection = D::COLLECTION))]
    async fn update_by_key(&self, key: &str, doc: &D) -> StoreResult<u64> {
        let mut docs = self.lock();
        if !docs.contains_key(key) {
            return Ok(0);
        }
        if let Some(field) = clashing_field(&docs, key, doc) {
            return Err(StoreError::Conflict {
                collection: D::COLLECTION,
                detail: format!("duplicate {field}"),
            });
        }
        docs.insert(key.to_string(), doc.clone());
        Ok(1)
    }

    #[instrument(skip(self), fields(collection = D::COLLECTION))]
    async fn delete_by_key(&self, key: &str) -> StoreResult<()> {
        match self.lock().remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                collection: D::COLLECTION,
                key: key.to_string(),
            }),
        }
    }

    fn list_all(&self) -> DocumentStream<'_, D> {
        let snapshot: Vec<D> = self.lock().values().cloned().collect();
        stream::iter(snapshot.into_iter().map(Ok)).boxed()
    }
}

/// The in-memory backend is always reachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysUp;

#[async_trait]
impl Pinger for AlwaysUp {
    async fn ping(&self, _timeout: Duration) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[derive(Debug, Clone, PartialEq)]
    struct Team {
        id: String,
        name: String,
    }

    impl Document for Team {
        const COLLECTION: &'static str = "teams";

        fn key(&self) -> &str {
            &self.id
        }

        fn unique_fields(&self) -> Vec<(&'static str, &str)> {
            vec![("name", self.name.as_str())]
        }
    }

    fn team(id: &str, name: &str) -> Team {
        Team {
            id: id.into(),
            name: name.into(),
        }
    }

    #[tokio::test]
    async fn insert_then_find() {
        let teams = MemoryCollection::new();
        teams.insert_unique(&team("1", "rustaceans")).await.unwrap();
        let found = teams.find_by_key("1").await.unwrap();
        assert_eq!(found, team("1", "rustaceans"));
    }

    #[tokio::test]
    async fn find_missing_is_not_found() {
        let teams = MemoryCollection::<Team>::new();
        let err = teams.find_by_key("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { key, .. } if key == "nope"));
    }

    #[tokio::test]
    async fn duplicate_key_conflicts_and_keeps_original() {
        let teams = MemoryCollection::new();
        teams.insert_unique(&team("1", "first")).await.unwrap();
        let err = teams.insert_unique(&team("1", "second")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(teams.find_by_key("1").await.unwrap().name, "first");
    }

    #[tokio::test]
    async fn duplicate_unique_field_conflicts() {
        let teams = MemoryCollection::new();
        teams.insert_unique(&team("1", "same")).await.unwrap();
        let err = teams.insert_unique(&team("2", "same")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { detail, .. } if detail.contains("name")));
    }

    #[tokio::test]
    async fn update_reports_matched_count() {
        let teams = MemoryCollection::new();
        assert_eq!(teams.update_by_key("1", &team("1", "x")).await.unwrap(), 0);
        assert!(teams.find_by_key("1").await.is_err());

        teams.insert_unique(&team("1", "x")).await.unwrap();
        assert_eq!(teams.update_by_key("1", &team("1", "y")).await.unwrap(), 1);
        assert_eq!(teams.find_by_key("1").await.unwrap().name, "y");
    }

    #[tokio::test]
    async fn update_may_keep_its_own_unique_value() {
        let teams = MemoryCollection::new();
        teams.insert_unique(&team("1", "x")).await.unwrap();
        teams.insert_unique(&team("2", "y")).await.unwrap();
        assert_eq!(teams.update_by_key("1", &team("1", "x")).await.unwrap(), 1);
        let err = teams.update_by_key("1", &team("1", "y")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn delete_twice_is_not_found() {
        let teams = MemoryCollection::new();
        teams.insert_unique(&team("1", "x")).await.unwrap();
        teams.delete_by_key("1").await.unwrap();
        let err = teams.delete_by_key("1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_all_yields_every_document() {
        let teams = MemoryCollection::new();
        for i in 0..5 {
            teams
                .insert_unique(&team(&i.to_string(), &format!("team-{i}")))
                .await
                .unwrap();
        }
        let mut ids: Vec<String> = teams
            .list_all()
            .map_ok(|t| t.id)
            .try_collect()
            .await
            .unwrap();
        ids.sort();
        assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn always_up_pings() {
        AlwaysUp.ping(Duration::from_millis(1)).await.unwrap();
    }
}
