use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Monitor not started")]
    NotStarted,

    #[error("Monitor already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, MonitorError>;
