use std::sync::Arc;

use tokio::sync::{watch, RwLock};

use crate::models::{AppSession, User};
use crate::services::LocalStore;
use crate::Result;

use super::logged;

/// Signed-in user, connectivity flags and the last successful sync.
///
/// Only `user` and `last_sync_at` are written to the local store; `online`
/// and `loading` are runtime state recomputed at startup.
#[derive(Clone)]
pub struct SessionStore {
    local: LocalStore,
    state: Arc<RwLock<AppSession>>,
    user_tx: Arc<watch::Sender<Option<String>>>,
}

impl SessionStore {
    /// Restore the persisted session and combine it with the current network state.
    pub async fn load(local: LocalStore, online: bool) -> Result<Self> {
        let persisted = logged(local.load_session().await, "session load")?;
        let session = AppSession::restore(persisted, online);
        let (user_tx, _) = watch::channel(session.user_id().map(str::to_string));

        Ok(Self {
            local,
            state: Arc::new(RwLock::new(session)),
            user_tx: Arc::new(user_tx),
        })
    }

    pub async fn snapshot(&self) -> AppSession {
        self.state.read().await.clone()
    }

    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    pub async fn user_id(&self) -> Option<String> {
        self.state.read().await.user_id().map(str::to_string)
    }

    pub async fn is_online(&self) -> bool {
        self.state.read().await.online
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn last_sync_at(&self) -> Option<i64> {
        self.state.read().await.last_sync_at
    }

    /// Sign a user in or out and notify identity subscribers.
    pub async fn set_user(&self, user: Option<User>) -> Result<()> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        next.user = user;
        logged(self.local.save_session(&next.persisted()).await, "session save")?;
        *state = next;

        let user_id = state.user_id().map(str::to_string);
        self.user_tx.send_if_modified(|current| {
            if *current == user_id {
                false
            } else {
                *current = user_id;
                true
            }
        });
        Ok(())
    }

    pub async fn set_online(&self, online: bool) {
        self.state.write().await.online = online;
    }

    pub async fn set_loading(&self, loading: bool) {
        self.state.write().await.loading = loading;
    }

    /// Record a successful sync now. The timestamp never moves backwards.
    pub async fn update_last_sync(&self) -> Result<i64> {
        let mut state = self.state.write().await;
        let now = crate::util::now_millis();
        let at = state.last_sync_at.map_or(now, |previous| previous.max(now));

        let mut next = state.clone();
        next.last_sync_at = Some(at);
        logged(self.local.save_session(&next.persisted()).await, "session save")?;
        *state = next;
        Ok(at)
    }

    /// Forget the user and the last sync time.
    pub async fn logout(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let mut next = state.clone();
            next.last_sync_at = None;
            next.user = None;
            logged(self.local.save_session(&next.persisted()).await, "session save")?;
            *state = next;
        }
        self.user_tx.send_if_modified(|current| current.take().is_some());
        tracing::info!("Signed out");
        Ok(())
    }

    /// Receiver of the current user id, changed on every sign-in or sign-out.
    pub fn subscribe_user(&self) -> watch::Receiver<Option<String>> {
        self.user_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn farmer() -> User {
        User::new("user-1", "joao@herdade.pt", "João").with_farm("Herdade da Serra")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_session_persists_user_but_not_flags() {
        let local = LocalStore::open_in_memory().await.unwrap();
        let session = SessionStore::load(local.clone(), true).await.unwrap();
        session.set_user(Some(farmer())).await.unwrap();
        session.set_loading(true).await;
        session.update_last_sync().await.unwrap();

        let restored = SessionStore::load(local, false).await.unwrap();
        let snapshot = restored.snapshot().await;
        assert_eq!(snapshot.user, Some(farmer()));
        assert!(!snapshot.online);
        assert!(!snapshot.loading);
        assert!(snapshot.last_sync_at.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_last_sync_never_moves_backwards() {
        let local = LocalStore::open_in_memory().await.unwrap();
        let future = crate::util::now_millis() + 3_600_000;
        local
            .save_session(&crate::models::PersistedSession {
                user: None,
                last_sync_at: Some(future),
            })
            .await
            .unwrap();

        let session = SessionStore::load(local, true).await.unwrap();
        assert_eq!(session.update_last_sync().await.unwrap(), future);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_user_changes_are_published() {
        let local = LocalStore::open_in_memory().await.unwrap();
        let session = SessionStore::load(local, true).await.unwrap();
        let mut rx = session.subscribe_user();
        assert_eq!(*rx.borrow_and_update(), None);

        session.set_user(Some(farmer())).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_deref(), Some("user-1"));

        // Same user again is not a change
        session.set_user(Some(farmer())).await.unwrap();
        assert!(!rx.has_changed().unwrap());

        session.logout().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), None);
        assert_eq!(session.last_sync_at().await, None);
    }
}
