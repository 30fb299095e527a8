use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid thresholds for ratio '{ratio}': {details}")]
    InvalidThresholds { ratio: String, details: String },

    #[error("{service} service responded with status {status}: {message}")]
    Service {
        service: String,
        status: u16,
        message: String,
    },

    #[error("Discarded stale {service} response from generation {generation}")]
    StaleResponse { service: String, generation: u64 },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "remote")]
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
