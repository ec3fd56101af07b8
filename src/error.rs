use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not extract video ID from source: {0}")]
    InvalidSource(String),

    #[error("Platform bootstrap failed: {0}")]
    PlatformLoad(String),

    #[error("Failed to fetch metadata: {0}")]
    MetadataFetch(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
