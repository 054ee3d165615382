use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::models::{Entity, OperationKind, PendingOperation};
use crate::remote::RemoteBackend;
use crate::stores::DomainStores;

use super::{SyncError, SyncPhase, SyncReport, SyncResult, SyncStatus};

/// Reconciles the local queue with the remote backend.
///
/// Cloning shares the phase flag, so all clones refuse to overlap.
#[derive(Clone)]
pub struct SyncCoordinator {
    stores: DomainStores,
    remote: Arc<dyn RemoteBackend>,
    status: Arc<RwLock<SyncStatus>>,
}

impl SyncCoordinator {
    pub fn new(stores: DomainStores, remote: Arc<dyn RemoteBackend>) -> Self {
        Self {
            stores,
            remote,
            status: Arc::new(RwLock::new(SyncStatus::default())),
        }
    }

    pub const fn stores(&self) -> &DomainStores {
        &self.stores
    }

    pub fn remote(&self) -> Arc<dyn RemoteBackend> {
        Arc::clone(&self.remote)
    }

    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    pub async fn is_syncing(&self) -> bool {
        self.status.read().await.phase == SyncPhase::Syncing
    }

    /// Dismiss the last error message.
    pub async fn clear_error(&self) {
        self.status.write().await.last_error = None;
    }

    /// Push the signed-in user's queued operations, then refresh tasks,
    /// inventory and fields.
    ///
    /// Operations queued by another user stay in the queue untouched. A push
    /// failure leaves the whole queue in place for the next attempt.
    /// Guard failures (offline, signed out, already running) change nothing.
    pub async fn sync(&self) -> SyncResult<SyncReport> {
        let user = self.begin().await?;
        tracing::info!("Sync started for user {user}");

        self.stores.session.set_loading(true).await;
        let result = self.run(&user).await;
        self.stores.session.set_loading(false).await;

        let mut status = self.status.write().await;
        status.phase = SyncPhase::Idle;
        match &result {
            Ok(report) => {
                tracing::info!(
                    "Sync finished: pushed {}, pulled {} tasks, {} items, {} fields",
                    report.pushed,
                    report.pulled_tasks,
                    report.pulled_items,
                    report.pulled_fields
                );
                status.last_error = None;
                status.error_count = 0;
                status.last_report = Some(report.clone());
            }
            Err(error) => {
                tracing::error!("Sync failed: {error}");
                status.last_error = Some(error.to_string());
                status.error_count = status.error_count.saturating_add(1);
            }
        }
        result
    }

    async fn begin(&self) -> SyncResult<String> {
        let mut status = self.status.write().await;
        if status.phase == SyncPhase::Syncing {
            return Err(SyncError::AlreadySyncing);
        }
        if !self.stores.session.is_online().await {
            return Err(SyncError::Offline);
        }
        let user = self
            .stores
            .session
            .user_id()
            .await
            .ok_or(SyncError::NotAuthenticated)?;

        status.phase = SyncPhase::Syncing;
        Ok(user)
    }

    async fn run(&self, user: &str) -> SyncResult<SyncReport> {
        let snapshot = self.stores.local.pending_operations_for(user).await?;
        if snapshot.is_empty() {
            tracing::debug!("Nothing queued to push");
        }

        for operation in &snapshot {
            self.push(user, operation).await?;
        }
        self.stores.local.acknowledge(&snapshot).await?;

        let tasks = self.pull(user).await?;
        let items = self.pull(user).await?;
        let fields = self.pull(user).await?;

        let pulled_tasks = self.stores.tasks.apply_remote(tasks, user).await?;
        let pulled_items = self.stores.inventory.apply_remote(items, user).await?;
        let pulled_fields = self.stores.fields.apply_remote(fields, user).await?;

        let finished_at = self.stores.session.update_last_sync().await?;
        Ok(SyncReport {
            pushed: snapshot.len(),
            pulled_tasks,
            pulled_items,
            pulled_fields,
            finished_at,
        })
    }

    async fn push(&self, user: &str, operation: &PendingOperation) -> SyncResult<()> {
        let Some(id) = operation.entity_id() else {
            tracing::warn!(
                "Dropping queued {} on {} without an entity id",
                operation.kind,
                operation.collection
            );
            return Ok(());
        };

        let collection = operation.collection;
        let result = match operation.kind {
            OperationKind::Create => {
                self.remote
                    .put(user, collection, id, operation.payload.clone())
                    .await
            }
            OperationKind::Update => {
                self.remote
                    .patch(user, collection, id, operation.payload.clone())
                    .await
            }
            OperationKind::Delete => self.remote.delete(user, collection, id).await,
        };

        result.map_err(|error| {
            SyncError::Push(format!("{} {collection}/{id}: {error}", operation.kind))
        })
    }

    async fn pull<E: Entity>(&self, user: &str) -> SyncResult<Vec<E>> {
        let documents = self
            .remote
            .list(user, E::COLLECTION)
            .await
            .map_err(|error| SyncError::Pull(format!("{}: {error}", E::COLLECTION)))?;
        Ok(decode_documents(documents))
    }
}

/// Decode remote documents, skipping the ones that do not fit the model.
fn decode_documents<E: Entity>(documents: Vec<Value>) -> Vec<E> {
    documents
        .into_iter()
        .filter_map(|document| match serde_json::from_value::<E>(document) {
            Ok(entity) => Some(entity),
            Err(error) => {
                tracing::warn!(
                    "Skipping unreadable remote {} document: {error}",
                    E::COLLECTION
                );
                None
            }
        })
        .collect()
}
