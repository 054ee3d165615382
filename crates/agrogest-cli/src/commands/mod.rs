pub mod common;
pub mod config;
pub mod dashboard;
pub mod field;
pub mod inventory;
pub mod seed;
pub mod session;
pub mod sync;
pub mod task;
