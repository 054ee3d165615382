//! Queue drain and remote refresh
//!
//! [`SyncCoordinator`] pushes the pending-operations queue to the remote
//! backend and then pulls remote state back into the domain stores.
//! [`AutoSync`] decides when that happens.

mod auto;
mod coordinator;

use serde::Serialize;
use thiserror::Error;

pub use auto::AutoSync;
pub use coordinator::SyncCoordinator;

/// Coordinator phase. A sync request outside `Idle` is refused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncPhase {
    #[default]
    Idle,
    Syncing,
}

/// User-visible state of the sync subsystem
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    /// Message of the last failed attempt, until dismissed or a sync succeeds
    pub last_error: Option<String>,
    pub last_report: Option<SyncReport>,
    /// Failed attempts since the last success
    pub error_count: u32,
}

/// Outcome of a successful sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Queued operations sent to the remote
    pub pushed: usize,
    pub pulled_tasks: usize,
    pub pulled_items: usize,
    pub pulled_fields: usize,
    /// Completion time (Unix ms), also stored as the session's last sync
    pub finished_at: i64,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Cannot sync while offline")]
    Offline,
    #[error("Cannot sync without a signed-in user")]
    NotAuthenticated,
    #[error("A sync is already in progress")]
    AlreadySyncing,
    #[error("Failed to push local changes: {0}")]
    Push(String),
    #[error("Failed to refresh from remote: {0}")]
    Pull(String),
    #[error(transparent)]
    Storage(#[from] crate::Error),
}

impl SyncError {
    /// Refused before starting; nothing was touched.
    #[must_use]
    pub const fn is_guard(&self) -> bool {
        matches!(self, Self::Offline | Self::NotAuthenticated | Self::AlreadySyncing)
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
