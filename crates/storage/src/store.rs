use feedhead_core::{PayloadWithId, Result, StreamStructure};

/// Raw journal and content storage. Backends know nothing about sessions
/// beyond the id a journal is filed under.
pub trait StorageBackend: Send + Sync {
    fn read_journal(&self, session_id: &str) -> Result<Vec<StreamStructure>>;

    /// Appends all operations or none of them.
    fn append_journal(&self, session_id: &str, structures: &[StreamStructure]) -> Result<()>;

    fn delete_journal(&self, session_id: &str) -> Result<()>;

    fn journal_ids(&self) -> Result<Vec<String>>;

    /// Returns payloads for the ids that have one, in no particular order.
    fn read_content(&self, content_ids: &[String]) -> Result<Vec<PayloadWithId>>;

    fn write_content(&self, items: &[PayloadWithId]) -> Result<()>;

    fn content_count(&self) -> Result<usize>;
}

/// Batches journal operations for one session and commits them at once.
pub trait SessionMutation: Send {
    fn add(&mut self, structure: StreamStructure);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `false` if the batch could not be persisted.
    fn commit(self: Box<Self>) -> bool;
}

/// What sessions and the session manager need from storage.
pub trait Store: Send + Sync {
    fn stream_structures(&self, session_id: &str) -> Result<Vec<StreamStructure>>;

    fn payloads(&self, content_ids: &[String]) -> Result<Vec<PayloadWithId>>;

    fn write_payloads(&self, items: &[PayloadWithId]) -> Result<()>;

    fn edit_session(&self, session_id: &str) -> Box<dyn SessionMutation>;

    fn remove_session(&self, session_id: &str) -> Result<()>;

    /// Drops the HEAD journal ahead of a full refresh.
    fn clear_head(&self) -> Result<()>;

    fn session_ids(&self) -> Result<Vec<String>>;

    /// Stop trusting persisted state; later reads and writes go to memory.
    fn switch_to_ephemeral_mode(&self);

    fn is_ephemeral_mode(&self) -> bool;
}

/// Notified when a store leaves persistent mode.
pub trait StoreListener: Send + Sync {
    fn on_switched_to_ephemeral_mode(&self);
}
