//! Error types for the lead engagement core.

use uuid::Uuid;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Input validation errors. Rejected before any persistence — nothing is
/// partially created when one of these surfaces.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("No identity field present (need profile URL, channel id, or phone)")]
    NoIdentity,

    #[error("Malformed {field}: {message}")]
    Malformed { field: String, message: String },

    #[error("Too many options for {kind}: {count} > {max}")]
    TooManyOptions {
        kind: &'static str,
        count: usize,
        max: usize,
    },
}

/// Outbound channel errors.
///
/// `Transient` failures are retried with bounded backoff and then deferred to
/// the next scheduler cycle; they never fail a whole cycle.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Transient send failure on {channel}: {reason}")]
    Transient { channel: String, reason: String },

    #[error("Permanent send failure on {channel}: {reason}")]
    Permanent { channel: String, reason: String },

    #[error("Lead {lead_id} has no reachable channel identity")]
    Unreachable { lead_id: Uuid },
}

impl ChannelError {
    /// Whether retrying this failure within the same attempt makes sense.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Routing-session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Malformed bootstrap token: {0}")]
    MalformedToken(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
