use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::connectivity::ConnectivityMonitor;

use super::{SyncCoordinator, SyncError};

/// Background trigger that syncs on reconnect, on sign-in and on a timer.
///
/// The timer only fires a sync while online and signed in. Triggers that
/// overlap a running sync are refused by the coordinator.
#[must_use = "dropping the handle stops automatic sync"]
pub struct AutoSync {
    task: Option<JoinHandle<()>>,
}

impl AutoSync {
    pub fn spawn(
        coordinator: SyncCoordinator,
        connectivity: &ConnectivityMonitor,
        period: Duration,
    ) -> Self {
        let mut online_rx = connectivity.subscribe();
        let session = coordinator.stores().session.clone();
        let mut user_rx = session.subscribe_user();

        let task = tokio::spawn(async move {
            let online = *online_rx.borrow_and_update();
            session.set_online(online).await;

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = online_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = *online_rx.borrow_and_update();
                        session.set_online(online).await;
                        if online {
                            trigger(&coordinator, "reconnect");
                        }
                    }
                    changed = user_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if user_rx.borrow_and_update().is_some() {
                            trigger(&coordinator, "user change");
                        }
                    }
                    _ = ticker.tick() => {
                        if session.is_online().await && session.user_id().await.is_some() {
                            trigger(&coordinator, "timer");
                        }
                    }
                }
            }
            tracing::debug!("Auto-sync stopped");
        });

        Self { task: Some(task) }
    }

    /// Stop triggering syncs. A sync already running finishes on its own.
    pub fn stop(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for AutoSync {
    fn drop(&mut self) {
        self.abort();
    }
}

fn trigger(coordinator: &SyncCoordinator, reason: &'static str) {
    let coordinator = coordinator.clone();
    tokio::spawn(async move {
        tracing::debug!("Auto-sync triggered by {reason}");
        match coordinator.sync().await {
            Ok(_) => {}
            Err(SyncError::AlreadySyncing) => {
                tracing::debug!("Skipping {reason} sync, one is already running");
            }
            Err(error) if error.is_guard() => {
                tracing::debug!("Skipping {reason} sync: {error}");
            }
            // Already logged and recorded in the status by the coordinator
            Err(_) => {}
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Collection, FieldType, NewField, SoilType, User};
    use crate::remote::{MemoryBackend, RemoteBackend};
    use crate::services::LocalStore;
    use crate::stores::DomainStores;
    use std::sync::Arc;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    async fn setup() -> (MemoryBackend, DomainStores, SyncCoordinator) {
        let local = LocalStore::open_in_memory().await.unwrap();
        let stores = DomainStores::load(local, false).await.unwrap();
        let backend = MemoryBackend::new();
        let coordinator = SyncCoordinator::new(stores.clone(), Arc::new(backend.clone()));
        (backend, stores, coordinator)
    }

    fn field(name: &str) -> NewField {
        NewField {
            name: name.to_string(),
            description: String::new(),
            field_type: FieldType::Orchard,
            soil_type: SoilType::Sandy,
            area_ha: 1.0,
            irrigation_capacity: 0.0,
            notes: String::new(),
            coordinates: None,
            owner_id: String::new(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reconnect_sets_online_and_syncs() {
        let (backend, stores, coordinator) = setup().await;
        stores
            .session
            .set_user(Some(User::new("u1", "a@b.pt", "A")))
            .await
            .unwrap();
        stores.fields.add(field("Pomar")).await.unwrap();

        let connectivity = ConnectivityMonitor::new(false);
        let _auto = AutoSync::spawn(coordinator, &connectivity, Duration::from_secs(3600));
        settle().await;
        assert_eq!(stores.local.pending_count().await.unwrap(), 1);

        connectivity.set_online(true);
        settle().await;
        assert!(stores.session.is_online().await);
        assert_eq!(stores.local.pending_count().await.unwrap(), 0);
        assert_eq!(backend.list("u1", Collection::Fields).await.unwrap().len(), 1);

        connectivity.set_online(false);
        settle().await;
        assert!(!stores.session.is_online().await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sign_in_triggers_sync() {
        let (_, stores, coordinator) = setup().await;
        let connectivity = ConnectivityMonitor::new(true);
        let _auto = AutoSync::spawn(coordinator.clone(), &connectivity, Duration::from_secs(3600));
        stores.fields.add(field("Estufa")).await.unwrap();
        settle().await;
        assert_eq!(stores.local.pending_count().await.unwrap(), 1);

        stores
            .session
            .set_user(Some(User::new("u1", "a@b.pt", "A")))
            .await
            .unwrap();
        settle().await;
        assert_eq!(stores.local.pending_count().await.unwrap(), 0);
        assert!(coordinator.status().await.last_report.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_timer_only_runs_when_online_and_signed_in() {
        let (backend, stores, coordinator) = setup().await;
        let connectivity = ConnectivityMonitor::new(true);
        stores.fields.add(field("Vinha")).await.unwrap();

        let auto = AutoSync::spawn(coordinator.clone(), &connectivity, Duration::from_millis(20));
        settle().await;
        assert_eq!(backend.applied_writes().await, 0);
        assert!(coordinator.status().await.last_report.is_none());

        // Sign in while offline: the identity trigger is refused by the guard
        connectivity.set_online(false);
        settle().await;
        stores
            .session
            .set_user(Some(User::new("u1", "a@b.pt", "A")))
            .await
            .unwrap();
        settle().await;
        assert_eq!(stores.local.pending_count().await.unwrap(), 1);

        assert!(coordinator.status().await.last_report.is_none());

        connectivity.set_online(true);
        settle().await;
        assert_eq!(stores.local.pending_count().await.unwrap(), 0);
        auto.stop();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_timer_drains_queue_periodically() {
        let (_, stores, coordinator) = setup().await;
        stores
            .session
            .set_user(Some(User::new("u1", "a@b.pt", "A")))
            .await
            .unwrap();
        let connectivity = ConnectivityMonitor::new(true);
        let _auto = AutoSync::spawn(coordinator, &connectivity, Duration::from_millis(20));

        stores.fields.add(field("Campo Novo")).await.unwrap();
        settle().await;
        assert_eq!(stores.local.pending_count().await.unwrap(), 0);
    }
}
