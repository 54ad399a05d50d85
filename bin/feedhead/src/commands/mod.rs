pub mod config_cmd;
pub mod import;
pub mod init;
pub mod stats;
pub mod tree;

use feedhead_core::{Config, Paths};
use feedhead_storage::{FeedStore, SqliteStore};
use std::sync::Arc;

/// Opens the configured database behind a `FeedStore`.
pub fn open_store(paths: &Paths, config: &Config) -> anyhow::Result<Arc<FeedStore>> {
    let db_path = paths.database_file(&config.storage.database);
    let sqlite = SqliteStore::open(&db_path)?;
    Ok(Arc::new(FeedStore::new(Arc::new(sqlite))))
}
