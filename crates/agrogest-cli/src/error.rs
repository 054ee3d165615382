use std::io;

use agrogest_core::sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] agrogest_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("{0} cannot be empty")]
    EmptyValue(&'static str),
    #[error("No {kind} found for id/prefix: {query}")]
    NotFound { kind: &'static str, query: String },
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Not signed in. Run `agrogest login --id <ID> --email <EMAIL> --name <NAME>` first.")]
    NotSignedIn,
    #[error("Database already holds data; seed only runs on an empty database")]
    AlreadySeeded,
    #[error(
        "Sync is not configured. Run `agrogest config init --remote-url <URL>`, or set AGROGEST_REMOTE_URL and AGROGEST_REMOTE_TOKEN."
    )]
    SyncNotConfigured,
}
