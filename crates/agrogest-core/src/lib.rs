//! agrogest-core - Core library for AgroGest
//!
//! Offline-first data core for small-farm operations: entity models, the
//! device-local store with its pending-operations queue, the domain stores,
//! and the sync subsystem that reconciles them with a remote backend.

pub mod analytics;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod stores;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Collection, Entity, PendingOperation};
pub use services::LocalStore;
pub use stores::DomainStores;
