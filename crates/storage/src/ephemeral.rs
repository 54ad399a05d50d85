use feedhead_core::{Error, Payload, PayloadWithId, Result, StreamStructure};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::store::StorageBackend;

#[derive(Default)]
struct EphemeralState {
    journals: HashMap<String, Vec<StreamStructure>>,
    content: HashMap<String, Payload>,
}

/// In-memory journals and content. Used as the fallback after a persistence
/// failure and as the backend in tests.
#[derive(Clone, Default)]
pub struct EphemeralStore {
    inner: Arc<Mutex<EphemeralState>>,
}

impl EphemeralStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, EphemeralState>> {
        self.inner
            .lock()
            .map_err(|e| Error::Storage(format!("Lock error: {}", e)))
    }
}

impl StorageBackend for EphemeralStore {
    fn read_journal(&self, session_id: &str) -> Result<Vec<StreamStructure>> {
        let state = self.lock()?;
        Ok(state.journals.get(session_id).cloned().unwrap_or_default())
    }

    fn append_journal(&self, session_id: &str, structures: &[StreamStructure]) -> Result<()> {
        let mut state = self.lock()?;
        state
            .journals
            .entry(session_id.to_string())
            .or_default()
            .extend_from_slice(structures);
        debug!(session_id = %session_id, count = structures.len(), "Ephemeral journal appended");
        Ok(())
    }

    fn delete_journal(&self, session_id: &str) -> Result<()> {
        let mut state = self.lock()?;
        state.journals.remove(session_id);
        Ok(())
    }

    fn journal_ids(&self) -> Result<Vec<String>> {
        let state = self.lock()?;
        let mut ids: Vec<String> = state.journals.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn read_content(&self, content_ids: &[String]) -> Result<Vec<PayloadWithId>> {
        let state = self.lock()?;
        Ok(content_ids
            .iter()
            .filter_map(|id| {
                state
                    .content
                    .get(id)
                    .map(|payload| PayloadWithId::new(id.clone(), payload.clone()))
            })
            .collect())
    }

    fn write_content(&self, items: &[PayloadWithId]) -> Result<()> {
        let mut state = self.lock()?;
        for item in items {
            state
                .content
                .insert(item.content_id.clone(), item.payload.clone());
        }
        Ok(())
    }

    fn content_count(&self) -> Result<usize> {
        Ok(self.lock()?.content.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_append_and_read() {
        let store = EphemeralStore::new();
        store
            .append_journal("$HEAD", &[StreamStructure::append("root", None)])
            .unwrap();
        store
            .append_journal("$HEAD", &[StreamStructure::append("a", Some("root"))])
            .unwrap();

        let journal = store.read_journal("$HEAD").unwrap();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[1].content_id(), Some("a"));
        assert!(store.read_journal("missing").unwrap().is_empty());
    }

    #[test]
    fn test_read_content_skips_missing() {
        let store = EphemeralStore::new();
        store
            .write_content(&[PayloadWithId::new("a", Payload::from("A"))])
            .unwrap();

        let found = store
            .read_content(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].payload.as_bytes(), b"A");
        assert_eq!(store.content_count().unwrap(), 1);
    }

    #[test]
    fn test_delete_journal() {
        let store = EphemeralStore::new();
        store
            .append_journal("s1", &[StreamStructure::ClearAll])
            .unwrap();
        assert_eq!(store.journal_ids().unwrap(), vec!["s1".to_string()]);
        store.delete_journal("s1").unwrap();
        assert!(store.journal_ids().unwrap().is_empty());
    }
}
