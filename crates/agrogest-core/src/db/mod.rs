//! Local persistence layer for AgroGest

mod connection;
mod migrations;
mod repository;
mod session_repository;

pub use connection::Database;
pub use repository::LibSqlEntityRepository;
pub use session_repository::{LibSqlSessionRepository, SessionRepository};
