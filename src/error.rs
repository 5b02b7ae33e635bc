use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("CSV read/write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid tolerance {0}: must be finite and non-negative")]
    InvalidTolerance(f64),
}

pub type Result<T> = std::result::Result<T, ReconcilerError>;
