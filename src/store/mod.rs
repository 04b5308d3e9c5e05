//! Persistence layer — pending-approval queue and audit/aggregation store.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{ApprovalStore, StatsStore};
