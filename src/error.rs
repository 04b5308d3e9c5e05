//! Error types for the triage pipeline.

use uuid::Uuid;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Capability (classification/generation) errors.
///
/// These are always absorbed by the pipeline with a documented fallback;
/// they never propagate to the caller as a pipeline failure.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("Capability {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Supervisor workflow errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The run is not in the pending queue — already decided or never existed.
    /// The two cases are indistinguishable by design.
    #[error("Run {0} not found in pending approvals")]
    UnknownRun(Uuid),

    /// The stats row a decision must amend is missing. Indicates the
    /// approval store and stats store have diverged.
    #[error("Stats row missing for run {run_id}: {detail}")]
    StatsInconsistency { run_id: Uuid, detail: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
