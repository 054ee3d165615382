//! Online/offline state and transition listeners

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::remote::RemoteBackend;

/// Current connectivity, shared by everything that needs to know.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Feed a network-status observation. Repeats of the current state are ignored.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!("Connectivity changed: {}", if online { "online" } else { "offline" });
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Run `on_online` or `on_offline` on every transition.
    ///
    /// Both handlers live until the returned handle is removed or dropped.
    pub fn listen<On, OnFut, Off, OffFut>(&self, on_online: On, on_offline: Off) -> ListenerHandle
    where
        On: Fn() -> OnFut + Send + 'static,
        OnFut: Future<Output = ()> + Send,
        Off: Fn() -> OffFut + Send + 'static,
        OffFut: Future<Output = ()> + Send,
    {
        let mut rx = self.subscribe();
        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                if online {
                    on_online().await;
                } else {
                    on_offline().await;
                }
            }
        });
        ListenerHandle { task: Some(task) }
    }

    /// Ping `backend` every `interval` and record the outcome as connectivity.
    pub fn spawn_probe(
        &self,
        backend: Arc<dyn RemoteBackend>,
        interval: Duration,
    ) -> ListenerHandle {
        let monitor = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match backend.ping().await {
                    Ok(()) => monitor.set_online(true),
                    Err(error) => {
                        if monitor.is_online() {
                            tracing::warn!("Remote backend unreachable: {error}");
                        }
                        monitor.set_online(false);
                    }
                }
            }
        });
        ListenerHandle { task: Some(task) }
    }
}

/// Removes the registered handlers when dropped.
#[must_use = "dropping the handle removes the listener"]
pub struct ListenerHandle {
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Remove both handlers now.
    pub fn remove(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.abort();
    }
}
