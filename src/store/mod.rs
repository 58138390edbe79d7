//! Persistence layer — the lead store is the single source of truth.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use traits::LeadStore;
