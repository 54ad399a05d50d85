pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{Config, FeedConfig, StorageConfig};
pub use error::{BuildError, Error, Result};
pub use paths::Paths;
pub use types::{MutationContext, Operation, Payload, PayloadWithId, StreamStructure, StreamToken};

/// Session id under which the HEAD journal is stored.
pub const HEAD_SESSION_ID: &str = "$HEAD";
