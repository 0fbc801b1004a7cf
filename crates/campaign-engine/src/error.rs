use thiserror::Error;

/// Campaign engine errors
#[derive(Error, Debug)]
pub enum CampaignEngineError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),

    /// Campaign-related errors
    #[error("Campaign error: {0}")]
    Campaign(String),

    /// Contact-related errors
    #[error("Contact error: {0}")]
    Contact(String),

    /// Number rotation errors
    #[error("Rotation error: {0}")]
    Rotation(String),

    /// Call placement errors
    #[error("Placement error: {0}")]
    Placement(String),

    /// Scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Outcome ingestion errors
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CampaignEngineError {
    /// Create a new Campaign error
    pub fn campaign<S: Into<String>>(msg: S) -> Self {
        Self::Campaign(msg.into())
    }

    /// Create a new Contact error
    pub fn contact<S: Into<String>>(msg: S) -> Self {
        Self::Contact(msg.into())
    }

    /// Create a new Rotation error
    pub fn rotation<S: Into<String>>(msg: S) -> Self {
        Self::Rotation(msg.into())
    }

    /// Create a new Placement error
    pub fn placement<S: Into<String>>(msg: S) -> Self {
        Self::Placement(msg.into())
    }

    /// Create a new Scheduler error
    pub fn scheduler<S: Into<String>>(msg: S) -> Self {
        Self::Scheduler(msg.into())
    }

    /// Create a new Config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new InvalidInput error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new NotFound error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type for campaign engine operations
pub type Result<T> = std::result::Result<T, CampaignEngineError>;
