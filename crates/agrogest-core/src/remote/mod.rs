//! Remote document backend port and its adapters
//!
//! The backend stores per-user collections of JSON documents keyed by id.
//! Documents cross this boundary as untyped [`serde_json::Value`] so one
//! trait object can serve every collection.

mod http;
mod memory;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use crate::models::Collection;
use crate::Result;

pub use http::HttpBackend;
pub use memory::MemoryBackend;

/// Per-user collection CRUD plus a live feed, as consumed by the sync coordinator.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Every document, ordered by [`Collection::order_field`]
    async fn list(&self, user: &str, collection: Collection) -> Result<Vec<Value>>;

    /// Documents whose `field` equals `value`
    async fn list_where(
        &self,
        user: &str,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Value>>;

    async fn get(&self, user: &str, collection: Collection, id: &str) -> Result<Option<Value>>;

    /// Create or replace the document
    async fn put(&self, user: &str, collection: Collection, id: &str, doc: Value) -> Result<()>;

    /// Merge `fields` into the document and bump its `updated_at`; creates it when absent
    async fn patch(&self, user: &str, collection: Collection, id: &str, fields: Value)
        -> Result<()>;

    /// Delete the document; a missing id is not an error
    async fn delete(&self, user: &str, collection: Collection, id: &str) -> Result<()>;

    /// Receiver that carries the full current list after every remote change
    async fn subscribe(
        &self,
        user: &str,
        collection: Collection,
    ) -> Result<watch::Receiver<Vec<Value>>>;

    /// Cheap reachability check
    async fn ping(&self) -> Result<()>;
}

/// Sort documents by a top-level field, missing values first.
fn sort_documents(documents: &mut [Value], field: &str) {
    documents.sort_by(|a, b| {
        let key = |doc: &Value| doc.get(field).map(Value::to_string).unwrap_or_default();
        key(a).cmp(&key(b))
    });
}
