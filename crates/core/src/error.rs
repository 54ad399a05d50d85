use thiserror::Error;

/// Problems found while building the HEAD tree from the structure log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("No root found in structure log")]
    NoRootFound,

    /// Logged only; the first root is kept.
    #[error("Multiple roots: kept {kept}, ignored {ignored}")]
    MultipleRoots { kept: String, ignored: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Payload fetch failed: {0}")]
    PayloadFetch(String),

    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
