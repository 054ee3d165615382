//! Shared local store used by the domain stores and the sync coordinator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{Database, LibSqlEntityRepository, LibSqlSessionRepository, SessionRepository};
use crate::models::{
    Collection, Entity, Index, IndexValue, InventoryItem, ItemId, OperationKind,
    PendingOperation, PersistedSession, StockMovement,
};
use crate::{Error, Result};

/// Thread-safe handle over the device database.
///
/// Every call takes the database lock for its whole duration, so a tracked
/// write and its queue entry are never interleaved with another writer.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Open the store at the given filesystem path, creating parent directories.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                tracing::error!(
                    "Cannot create local store directory {}: {}",
                    parent.display(),
                    error
                );
                Error::StorageUnavailable(error.to_string())
            })?;
        }

        tracing::debug!("Opening local store at {}", db_path.display());
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem path of the database, `None` when in memory.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub async fn get<E: Entity>(&self, id: &str) -> Result<Option<E>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection()).get(id).await
    }

    /// All entities of `E`'s collection. Callers sort as needed.
    pub async fn get_all<E: Entity>(&self) -> Result<Vec<E>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection()).list().await
    }

    pub async fn get_by_index<E: Entity>(
        &self,
        index: Index,
        value: IndexValue,
    ) -> Result<Vec<E>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .list_by_index(index, value)
            .await
    }

    /// Untracked upsert; nothing is queued.
    pub async fn put<E: Entity>(&self, entity: &E) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .upsert(entity)
            .await
    }

    /// Untracked delete; a missing id is a no-op.
    pub async fn delete<E: Entity>(&self, id: &str) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .remove(E::COLLECTION, id)
            .await?;
        Ok(())
    }

    /// Upsert and queue `kind` for the remote in one transaction. The queue
    /// entry is owned by the entity's owner.
    pub async fn put_tracked<E: Entity>(
        &self,
        entity: &E,
        kind: OperationKind,
    ) -> Result<PendingOperation> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .put_tracked(entity, kind)
            .await
    }

    /// Delete and queue the delete for the remote in one transaction.
    pub async fn delete_tracked<E: Entity>(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<PendingOperation> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .delete_tracked(E::COLLECTION, id, owner_id)
            .await
    }

    /// Overwrite one collection with remote data without queueing anything.
    pub async fn replace_all<E: Entity>(&self, entities: &[E]) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .replace_collection(entities)
            .await
    }

    /// Queued operations, oldest first.
    pub async fn pending_operations(&self) -> Result<Vec<PendingOperation>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .pending_operations()
            .await
    }

    /// Operations `user` may push, oldest first. Changes made while signed
    /// out are included; other users' changes are not.
    pub async fn pending_operations_for(&self, user: &str) -> Result<Vec<PendingOperation>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .pending_operations_for(user)
            .await
    }

    pub async fn pending_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .pending_count()
            .await
    }

    /// Remove exactly the given operations from the queue.
    pub async fn acknowledge(&self, operations: &[PendingOperation]) -> Result<usize> {
        let ids: Vec<_> = operations.iter().map(|operation| operation.id).collect();
        let db = self.db.lock().await;
        let removed = LibSqlEntityRepository::new(db.connection())
            .acknowledge(&ids)
            .await?;
        tracing::debug!("Acknowledged {removed} queued operations");
        Ok(removed)
    }

    /// Persist an item's adjusted quantity with its movement and queue the update.
    pub async fn append_movement_with_item(
        &self,
        item: &InventoryItem,
        movement: &StockMovement,
    ) -> Result<PendingOperation> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .record_movement(item, movement)
            .await
    }

    /// Delete an item with its movements and queue the delete.
    pub async fn delete_item_cascade(
        &self,
        id: &ItemId,
        owner_id: &str,
    ) -> Result<PendingOperation> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .delete_item_cascade(id, owner_id)
            .await
    }

    /// Movements of one item, newest first.
    pub async fn movements_for_item(&self, id: &ItemId) -> Result<Vec<StockMovement>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .movements_for_item(id)
            .await
    }

    pub async fn all_movements(&self) -> Result<Vec<StockMovement>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .list_movements()
            .await
    }

    pub async fn load_session(&self) -> Result<PersistedSession> {
        let db = self.db.lock().await;
        LibSqlSessionRepository::new(db.connection()).load().await
    }

    pub async fn save_session(&self, session: &PersistedSession) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlSessionRepository::new(db.connection())
            .save(session)
            .await
    }

    /// Collections with at least one queued operation, for status output.
    pub async fn pending_by_collection(&self) -> Result<Vec<(Collection, usize)>> {
        let operations = self.pending_operations().await?;
        Ok(Collection::ALL
            .iter()
            .map(|collection| {
                let count = operations
                    .iter()
                    .filter(|operation| operation.collection == *collection)
                    .count();
                (*collection, count)
            })
            .filter(|(_, count)| *count > 0)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Field, FieldType, NewField, SoilType};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn field(name: &str) -> Field {
        NewField {
            name: name.to_string(),
            description: String::new(),
            field_type: FieldType::Vineyard,
            soil_type: SoilType::Loamy,
            area_ha: 2.0,
            irrigation_capacity: 100.0,
            notes: String::new(),
            coordinates: None,
            owner_id: "user-1".to_string(),
        }
        .into_field()
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_store_survives_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("agrogest.db");

        let vineyard = field("Vinha Norte");
        {
            let store = LocalStore::open_path(&path).await.unwrap();
            store
                .put_tracked(&vineyard, OperationKind::Create)
                .await
                .unwrap();
            store
                .save_session(&PersistedSession {
                    user: None,
                    last_sync_at: Some(42),
                })
                .await
                .unwrap();
        }

        let store = LocalStore::open_path(&path).await.unwrap();
        assert_eq!(store.db_path(), Some(path.as_path()));
        let fetched: Option<Field> = store.get(&vineyard.key()).await.unwrap();
        assert_eq!(fetched, Some(vineyard));
        assert_eq!(store.pending_count().await.unwrap(), 1);
        assert_eq!(store.load_session().await.unwrap().last_sync_at, Some(42));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_is_idempotent() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let f = field("Pomar");
        store.put(&f).await.unwrap();

        store.delete::<Field>(&f.key()).await.unwrap();
        store.delete::<Field>(&f.key()).await.unwrap();
        assert!(store.get_all::<Field>().await.unwrap().is_empty());
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_acknowledge_keeps_operations_added_later() {
        let store = LocalStore::open_in_memory().await.unwrap();
        store
            .put_tracked(&field("A"), OperationKind::Create)
            .await
            .unwrap();
        let snapshot = store.pending_operations().await.unwrap();

        store
            .put_tracked(&field("B"), OperationKind::Create)
            .await
            .unwrap();
        store.acknowledge(&snapshot).await.unwrap();

        let remaining = store.pending_operations().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_ne!(remaining[0].id, snapshot[0].id);
        assert_eq!(
            store.pending_by_collection().await.unwrap(),
            vec![(Collection::Fields, 1)]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unwritable_parent_is_storage_unavailable() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let error = LocalStore::open_path(blocker.join("agrogest.db"))
            .await
            .err()
            .unwrap();
        assert!(error.is_fatal());
    }
}
