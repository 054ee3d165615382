use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{watch, Mutex};

use crate::models::Collection;
use crate::{Error, Result};

use super::{sort_documents, RemoteBackend};

type Key = (String, Collection);

struct State {
    documents: HashMap<Key, BTreeMap<String, Value>>,
    feeds: HashMap<Key, watch::Sender<Vec<Value>>>,
    reachable: bool,
    failing_writes: usize,
    applied_writes: usize,
}

/// In-process backend with failure injection, for tests.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                documents: HashMap::new(),
                feeds: HashMap::new(),
                reachable: true,
                failing_writes: 0,
                applied_writes: 0,
            })),
        }
    }

    /// Make the next `count` writes fail with [`Error::Remote`].
    pub async fn fail_next_writes(&self, count: usize) {
        self.state.lock().await.failing_writes = count;
    }

    /// Toggle reachability; while unreachable every call fails.
    pub async fn set_reachable(&self, reachable: bool) {
        self.state.lock().await.reachable = reachable;
    }

    /// Number of writes that reached the store
    pub async fn applied_writes(&self) -> usize {
        self.state.lock().await.applied_writes
    }

    /// Seed a document directly, as another device would.
    pub async fn insert(&self, user: &str, collection: Collection, doc: Value) -> Result<()> {
        let id = document_id(&doc)?;
        let mut state = self.state.lock().await;
        state
            .documents
            .entry((user.to_string(), collection))
            .or_default()
            .insert(id, doc);
        state.publish(user, collection);
        Ok(())
    }
}

impl State {
    fn check_reachable(&self) -> Result<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(Error::Remote("backend unreachable".to_string()))
        }
    }

    fn begin_write(&mut self) -> Result<()> {
        self.check_reachable()?;
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(Error::Remote("write rejected (503)".to_string()));
        }
        self.applied_writes += 1;
        Ok(())
    }

    fn list(&self, user: &str, collection: Collection) -> Vec<Value> {
        let mut documents: Vec<Value> = self
            .documents
            .get(&(user.to_string(), collection))
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        sort_documents(&mut documents, collection.order_field());
        documents
    }

    fn collection_mut(
        &mut self,
        user: &str,
        collection: Collection,
    ) -> &mut BTreeMap<String, Value> {
        self.documents
            .entry((user.to_string(), collection))
            .or_default()
    }

    fn publish(&self, user: &str, collection: Collection) {
        if let Some(feed) = self.feeds.get(&(user.to_string(), collection)) {
            feed.send_replace(self.list(user, collection));
        }
    }
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    async fn list(&self, user: &str, collection: Collection) -> Result<Vec<Value>> {
        let state = self.state.lock().await;
        state.check_reachable()?;
        Ok(state.list(user, collection))
    }

    async fn list_where(
        &self,
        user: &str,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Value>> {
        let state = self.state.lock().await;
        state.check_reachable()?;
        Ok(state
            .list(user, collection)
            .into_iter()
            .filter(|doc| doc.get(field) == Some(value))
            .collect())
    }

    async fn get(&self, user: &str, collection: Collection, id: &str) -> Result<Option<Value>> {
        let state = self.state.lock().await;
        state.check_reachable()?;
        Ok(state
            .documents
            .get(&(user.to_string(), collection))
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn put(&self, user: &str, collection: Collection, id: &str, doc: Value) -> Result<()> {
        let mut state = self.state.lock().await;
        state.begin_write()?;
        state
            .collection_mut(user, collection)
            .insert(id.to_string(), doc);
        state.publish(user, collection);
        Ok(())
    }

    async fn patch(
        &self,
        user: &str,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<()> {
        let Value::Object(fields) = fields else {
            return Err(Error::InvalidInput("patch body must be a JSON object".into()));
        };

        let mut state = self.state.lock().await;
        state.begin_write()?;
        let doc = state
            .collection_mut(user, collection)
            .entry(id.to_string())
            .or_insert_with(|| serde_json::json!({ "id": id }));

        if let Value::Object(existing) = doc {
            let previous = existing
                .get("updated_at")
                .and_then(Value::as_i64)
                .unwrap_or_default();
            existing.extend(fields);
            let incoming = existing
                .get("updated_at")
                .and_then(Value::as_i64)
                .unwrap_or_default();
            existing.insert(
                "updated_at".to_string(),
                Value::from(crate::util::next_timestamp(previous).max(incoming)),
            );
        }
        state.publish(user, collection);
        Ok(())
    }

    async fn delete(&self, user: &str, collection: Collection, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.begin_write()?;
        state.collection_mut(user, collection).remove(id);
        state.publish(user, collection);
        Ok(())
    }

    async fn subscribe(
        &self,
        user: &str,
        collection: Collection,
    ) -> Result<watch::Receiver<Vec<Value>>> {
        let mut state = self.state.lock().await;
        state.check_reachable()?;
        let current = state.list(user, collection);
        let feed = state
            .feeds
            .entry((user.to_string(), collection))
            .or_insert_with(|| watch::channel(current).0);
        Ok(feed.subscribe())
    }

    async fn ping(&self) -> Result<()> {
        self.state.lock().await.check_reachable()
    }
}

fn document_id(doc: &Value) -> Result<String> {
    doc.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidInput("document has no string id".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_is_ordered_and_per_user() {
        let backend = MemoryBackend::new();
        backend
            .put("u1", Collection::Fields, "b", json!({ "id": "b", "name": "Vinha" }))
            .await
            .unwrap();
        backend
            .put("u1", Collection::Fields, "a", json!({ "id": "a", "name": "Estufa" }))
            .await
            .unwrap();
        backend
            .put("u2", Collection::Fields, "c", json!({ "id": "c", "name": "Pomar" }))
            .await
            .unwrap();

        let names: Vec<_> = backend
            .list("u1", Collection::Fields)
            .await
            .unwrap()
            .iter()
            .map(|doc| doc["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Estufa", "Vinha"]);

        let filtered = backend
            .list_where("u1", Collection::Fields, "name", &json!("Vinha"))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_patch_merges_and_creates() {
        let backend = MemoryBackend::new();
        backend
            .put(
                "u1",
                Collection::Tasks,
                "t",
                json!({ "id": "t", "title": "Rega", "updated_at": 5 }),
            )
            .await
            .unwrap();
        backend
            .patch("u1", Collection::Tasks, "t", json!({ "status": "completed" }))
            .await
            .unwrap();

        let doc = backend.get("u1", Collection::Tasks, "t").await.unwrap().unwrap();
        assert_eq!(doc["title"], "Rega");
        assert_eq!(doc["status"], "completed");
        assert!(doc["updated_at"].as_i64().unwrap() > 5);

        backend
            .patch("u1", Collection::Tasks, "new", json!({ "title": "Nova" }))
            .await
            .unwrap();
        let created = backend.get("u1", Collection::Tasks, "new").await.unwrap().unwrap();
        assert_eq!(created["id"], "new");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_injection() {
        let backend = MemoryBackend::new();
        backend.fail_next_writes(1).await;
        assert!(backend
            .put("u1", Collection::Tasks, "t", json!({ "id": "t" }))
            .await
            .is_err());
        backend
            .put("u1", Collection::Tasks, "t", json!({ "id": "t" }))
            .await
            .unwrap();
        assert_eq!(backend.applied_writes().await, 1);

        backend.set_reachable(false).await;
        assert!(backend.ping().await.is_err());
        assert!(backend.list("u1", Collection::Tasks).await.is_err());
        backend.set_reachable(true).await;
        backend.delete("u1", Collection::Tasks, "missing").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_subscribe_receives_full_list() {
        let backend = MemoryBackend::new();
        let mut feed = backend.subscribe("u1", Collection::Inventory).await.unwrap();
        assert!(feed.borrow_and_update().is_empty());

        backend
            .insert("u1", Collection::Inventory, json!({ "id": "i1", "name": "Gasóleo" }))
            .await
            .unwrap();
        feed.changed().await.unwrap();
        assert_eq!(feed.borrow_and_update().len(), 1);
    }
}
