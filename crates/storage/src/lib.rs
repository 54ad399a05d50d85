pub mod ephemeral;
pub mod feed;
pub mod sqlite;
pub mod store;

pub use ephemeral::EphemeralStore;
pub use feed::{FeedStore, JournalMutation};
pub use sqlite::SqliteStore;
pub use store::{SessionMutation, StorageBackend, Store, StoreListener};
