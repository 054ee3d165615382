//! Session and user models

use serde::{Deserialize, Serialize};

/// Signed-in farmer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farm: Option<String>,
    pub created_at: i64,
}

impl User {
    #[must_use]
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            farm: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    #[must_use]
    pub fn with_farm(mut self, farm: impl Into<String>) -> Self {
        self.farm = crate::util::normalize_text_option(Some(farm.into()));
        self
    }
}

/// Application session state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSession {
    pub user: Option<User>,
    /// Runtime network state, never persisted
    pub online: bool,
    /// A sync or bulk load is running, never persisted
    pub loading: bool,
    /// Last successful sync (Unix ms)
    pub last_sync_at: Option<i64>,
}

/// The persisted subset of [`AppSession`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub user: Option<User>,
    pub last_sync_at: Option<i64>,
}

impl AppSession {
    /// Rebuild a session from its persisted part and the current network state
    #[must_use]
    pub fn restore(persisted: PersistedSession, online: bool) -> Self {
        Self {
            user: persisted.user,
            online,
            loading: false,
            last_sync_at: persisted.last_sync_at,
        }
    }

    #[must_use]
    pub fn persisted(&self) -> PersistedSession {
        PersistedSession {
            user: self.user.clone(),
            last_sync_at: self.last_sync_at,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.id.as_str())
    }
}
