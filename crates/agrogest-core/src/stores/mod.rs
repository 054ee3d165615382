//! In-memory domain stores written through to the local store
//!
//! Each store is the only writer of its collection. Mutations persist first
//! and only then touch memory, so a failed write leaves the store unchanged.

mod field_store;
mod inventory_store;
mod session_store;
mod task_store;

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::models::{Entity, OperationKind};
use crate::services::LocalStore;
use crate::Result;

pub use field_store::FieldStore;
pub use inventory_store::InventoryStore;
pub use session_store::SessionStore;
pub use task_store::TaskStore;

/// Every domain store over one local store, built once at startup.
#[derive(Clone)]
pub struct DomainStores {
    pub local: LocalStore,
    pub session: SessionStore,
    pub tasks: TaskStore,
    pub inventory: InventoryStore,
    pub fields: FieldStore,
}

impl DomainStores {
    /// Hydrate every store from `local`; `online` seeds the session flag.
    pub async fn load(local: LocalStore, online: bool) -> Result<Self> {
        let session = SessionStore::load(local.clone(), online).await?;
        Ok(Self {
            tasks: TaskStore::load(local.clone(), session.clone()).await?,
            inventory: InventoryStore::load(local.clone(), session.clone()).await?,
            fields: FieldStore::load(local.clone(), session.clone()).await?,
            session,
            local,
        })
    }

    /// Drop all synced data locally (sign-out). Queued operations are kept
    /// and stay tied to the user who made them.
    pub async fn clear(&self) -> Result<()> {
        self.tasks.clear().await?;
        self.inventory.clear().await?;
        self.fields.clear().await
    }
}

/// Shared write-through collection backing the entity stores
#[derive(Clone)]
struct Records<E> {
    local: LocalStore,
    entries: Arc<RwLock<Vec<E>>>,
}

impl<E: Entity> Records<E> {
    async fn load(local: LocalStore) -> Result<Self> {
        let entries = logged(local.get_all::<E>().await, "load")?;
        tracing::debug!("Loaded {} {} from local store", entries.len(), E::COLLECTION);
        Ok(Self {
            local,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    async fn snapshot(&self) -> Vec<E> {
        self.entries.read().await.clone()
    }

    async fn filter(&self, keep: impl Fn(&E) -> bool) -> Vec<E> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|entry| keep(entry))
            .cloned()
            .collect()
    }

    async fn find(&self, id: &str) -> Option<E> {
        self.entries
            .read()
            .await
            .iter()
            .find(|entry| entry.key() == id)
            .cloned()
    }

    async fn write(&self) -> RwLockWriteGuard<'_, Vec<E>> {
        self.entries.write().await
    }

    async fn insert(&self, entity: E) -> Result<E> {
        let mut entries = self.entries.write().await;
        logged(
            self.local.put_tracked(&entity, OperationKind::Create).await,
            "create",
        )?;
        entries.push(entity.clone());
        Ok(entity)
    }

    /// Replace the entry with `id` by `change(current)`; `None` when absent.
    async fn modify(&self, id: &str, change: impl FnOnce(&E) -> Result<E>) -> Result<Option<E>> {
        let mut entries = self.entries.write().await;
        let Some(position) = entries.iter().position(|entry| entry.key() == id) else {
            tracing::debug!("Ignoring update of missing {} {id}", E::COLLECTION);
            return Ok(None);
        };

        let updated = change(&entries[position])?;
        logged(
            self.local.put_tracked(&updated, OperationKind::Update).await,
            "update",
        )?;
        entries[position] = updated.clone();
        Ok(Some(updated))
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let Some(position) = entries.iter().position(|entry| entry.key() == id) else {
            tracing::debug!("Ignoring delete of missing {} {id}", E::COLLECTION);
            return Ok(false);
        };

        let owner = entries[position].owner().to_string();
        logged(self.local.delete_tracked::<E>(id, &owner).await, "delete")?;
        entries.remove(position);
        Ok(true)
    }

    /// Take `user`'s remote data as the new collection, except entries that
    /// still have operations queued by `user`, which keep their local version.
    ///
    /// Runs under the write lock, so no operation for this collection can be
    /// queued between reading the queue and replacing the entries.
    async fn apply_remote(&self, remote: Vec<E>, user: &str) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let queued = logged(self.local.pending_operations_for(user).await, "refresh")?;
        let pending: HashSet<String> = queued
            .into_iter()
            .filter(|operation| operation.collection == E::COLLECTION)
            .filter_map(|operation| operation.entity_id().map(str::to_string))
            .collect();

        let mut merged: Vec<E> = remote
            .into_iter()
            .filter(|entry| !pending.contains(&entry.key()))
            .collect();
        let pulled = merged.len();
        merged.extend(
            entries
                .iter()
                .filter(|entry| pending.contains(&entry.key()))
                .cloned(),
        );
        if pulled < merged.len() {
            tracing::debug!(
                "Kept {} local {} with unsynced changes",
                merged.len() - pulled,
                E::COLLECTION
            );
        }

        logged(self.local.replace_all(&merged).await, "refresh")?;
        *entries = merged;
        Ok(pulled)
    }

    async fn replace_all(&self, replacement: Vec<E>) -> Result<()> {
        let mut entries = self.entries.write().await;
        logged(self.local.replace_all(&replacement).await, "refresh")?;
        *entries = replacement;
        Ok(())
    }
}

/// Log a local store failure before handing it back to the caller.
fn logged<T>(result: Result<T>, action: &str) -> Result<T> {
    if let Err(error) = &result {
        tracing::error!("Local store {action} failed: {error}");
    }
    result
}

/// Owner to stamp on a new record: the caller's, else the signed-in user's.
async fn resolve_owner(owner_id: String, session: &SessionStore) -> String {
    if owner_id.trim().is_empty() {
        session.user_id().await.unwrap_or_default()
    } else {
        owner_id
    }
}
