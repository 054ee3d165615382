//! Session repository implementation

use crate::error::{Error, Result};
use crate::models::{PersistedSession, User};
use libsql::Connection;

const USER_KEY: &str = "user";
const LAST_SYNC_KEY: &str = "last_sync_at";

/// Trait for session storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SessionRepository {
    /// Load the persisted session; missing keys load as `None`
    async fn load(&self) -> Result<PersistedSession>;

    /// Save the whole session, clearing keys that are `None`
    async fn save(&self, session: &PersistedSession) -> Result<()>;
}

/// libSQL implementation of `SessionRepository`
pub struct LibSqlSessionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSessionRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SessionRepository for LibSqlSessionRepository<'_> {
    async fn load(&self) -> Result<PersistedSession> {
        let mut session = PersistedSession::default();

        match self.get_value(USER_KEY).await {
            Ok(value) => match serde_json::from_str::<User>(&value) {
                Ok(user) => session.user = Some(user),
                Err(error) => tracing::warn!("Ignoring unreadable stored user: {error}"),
            },
            Err(Error::NotFound(_)) => {}
            Err(error) => return Err(error),
        }

        match self.get_value(LAST_SYNC_KEY).await {
            Ok(value) => session.last_sync_at = value.trim().parse().ok(),
            Err(Error::NotFound(_)) => {}
            Err(error) => return Err(error),
        }

        Ok(session)
    }

    async fn save(&self, session: &PersistedSession) -> Result<()> {
        match &session.user {
            Some(user) => {
                self.set_value(USER_KEY, &serde_json::to_string(user)?)
                    .await?;
            }
            None => self.delete_value(USER_KEY).await?,
        }
        match session.last_sync_at {
            Some(at) => self.set_value(LAST_SYNC_KEY, &at.to_string()).await?,
            None => self.delete_value(LAST_SYNC_KEY).await?,
        }
        Ok(())
    }
}

impl LibSqlSessionRepository<'_> {
    async fn get_value(&self, key: &str) -> Result<String> {
        let mut rows = self
            .conn
            .query("SELECT value FROM session WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(value)
        } else {
            Err(Error::NotFound(key.to_string()))
        }
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO session (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }

    async fn delete_value(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM session WHERE key = ?", [key])
            .await?;
        Ok(())
    }
}
