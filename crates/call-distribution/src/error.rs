use thiserror::Error;

/// Call distribution engine errors
#[derive(Error, Debug)]
pub enum DistributionError {
    /// Malformed input, rejected before any state change
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Referenced agent is unknown to the registry
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Referenced request or binding does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence collaborator unreachable
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DistributionError {
    /// Create a new InvalidRequest error
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a new AgentNotFound error
    pub fn agent_not_found<S: Into<String>>(agent_id: S) -> Self {
        Self::AgentNotFound(agent_id.into())
    }

    /// Create a new NotFound error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new Internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Errors raised by agent store adapters
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query execution error: {0}")]
    Query(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Data validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_) | sqlx::Error::Configuration(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Connection(err.to_string())
            }
            _ => StoreError::Query(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Migration(err.to_string())
    }
}

/// Notification delivery failure. Logged by the engine, never propagated.
#[derive(Error, Debug)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// Result type for call distribution operations
pub type Result<T> = std::result::Result<T, DistributionError>;
