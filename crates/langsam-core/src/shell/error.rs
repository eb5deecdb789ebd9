use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Shell install failed at {path}: {reason}")]
    Install { path: String, reason: String },

    #[error("Request for {path} failed: {reason}")]
    Network { path: String, reason: String },

    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache entry could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid cache tag: {0:?}")]
    InvalidTag(String),

    #[error("Cache {0} has not been installed")]
    NotInstalled(String),

    #[error("Shell worker is no longer running")]
    WorkerStopped,
}
