use feedhead_core::{PayloadWithId, Result, StreamStructure, HEAD_SESSION_ID};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::ephemeral::EphemeralStore;
use crate::store::{SessionMutation, StorageBackend, Store, StoreListener};

/// Journal operations staged against one backend and appended in one call.
pub struct JournalMutation {
    backend: Arc<dyn StorageBackend>,
    session_id: String,
    structures: Vec<StreamStructure>,
}

impl SessionMutation for JournalMutation {
    fn add(&mut self, structure: StreamStructure) {
        self.structures.push(structure);
    }

    fn len(&self) -> usize {
        self.structures.len()
    }

    fn commit(self: Box<Self>) -> bool {
        if self.structures.is_empty() {
            return true;
        }
        match self.backend.append_journal(&self.session_id, &self.structures) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, session_id = %self.session_id, "Session mutation commit failed");
                false
            }
        }
    }
}

/// Persistent backend with an in-memory fallback.
///
/// Once switched to ephemeral mode the store never switches back; the
/// persistent backend is left untouched from then on.
pub struct FeedStore {
    persistent: Arc<dyn StorageBackend>,
    ephemeral: RwLock<Option<Arc<EphemeralStore>>>,
    ephemeral_mode: AtomicBool,
    listeners: Mutex<Vec<Arc<dyn StoreListener>>>,
}

impl FeedStore {
    pub fn new(persistent: Arc<dyn StorageBackend>) -> Self {
        Self {
            persistent,
            ephemeral: RwLock::new(None),
            ephemeral_mode: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn register_listener(&self, listener: Arc<dyn StoreListener>) {
        match self.listeners.lock() {
            Ok(mut listeners) => listeners.push(listener),
            Err(e) => error!(error = %e, "Failed to register store listener"),
        }
    }

    /// Number of stored payloads in the active backend.
    pub fn content_count(&self) -> Result<usize> {
        self.active().content_count()
    }

    fn active(&self) -> Arc<dyn StorageBackend> {
        if self.ephemeral_mode.load(Ordering::Acquire) {
            match self.ephemeral.read() {
                Ok(guard) => {
                    if let Some(store) = guard.as_ref() {
                        return store.clone();
                    }
                    error!("Ephemeral mode set without an ephemeral store, using persistent backend");
                }
                Err(e) => {
                    error!(error = %e, "Ephemeral store lock poisoned, using persistent backend");
                }
            }
        }
        self.persistent.clone()
    }

    /// Seed the ephemeral backend with HEAD and its content. Failures here
    /// leave an empty HEAD rather than aborting the switch.
    fn copy_head(&self, target: &EphemeralStore) {
        let head = match self.persistent.read_journal(HEAD_SESSION_ID) {
            Ok(head) => head,
            Err(e) => {
                warn!(error = %e, "Unable to copy HEAD into ephemeral store");
                return;
            }
        };

        let mut ids: Vec<String> = head
            .iter()
            .filter_map(|s| s.content_id().map(str::to_string))
            .collect();
        ids.sort();
        ids.dedup();

        if let Err(e) = target.append_journal(HEAD_SESSION_ID, &head) {
            warn!(error = %e, "Unable to write HEAD into ephemeral store");
            return;
        }
        match self.persistent.read_content(&ids) {
            Ok(content) => {
                if let Err(e) = target.write_content(&content) {
                    warn!(error = %e, "Unable to write content into ephemeral store");
                }
            }
            Err(e) => warn!(error = %e, "Unable to copy content into ephemeral store"),
        }
        debug!(structures = head.len(), content = ids.len(), "HEAD copied to ephemeral store");
    }

    fn notify_listeners(&self) {
        let listeners = match self.listeners.lock() {
            Ok(listeners) => listeners.clone(),
            Err(e) => {
                error!(error = %e, "Failed to read store listeners");
                return;
            }
        };
        for listener in listeners {
            listener.on_switched_to_ephemeral_mode();
        }
    }
}

impl Store for FeedStore {
    fn stream_structures(&self, session_id: &str) -> Result<Vec<StreamStructure>> {
        self.active().read_journal(session_id)
    }

    fn payloads(&self, content_ids: &[String]) -> Result<Vec<PayloadWithId>> {
        self.active().read_content(content_ids)
    }

    fn write_payloads(&self, items: &[PayloadWithId]) -> Result<()> {
        self.active().write_content(items)
    }

    fn edit_session(&self, session_id: &str) -> Box<dyn SessionMutation> {
        Box::new(JournalMutation {
            backend: self.active(),
            session_id: session_id.to_string(),
            structures: Vec::new(),
        })
    }

    fn remove_session(&self, session_id: &str) -> Result<()> {
        if session_id == HEAD_SESSION_ID {
            warn!("Refusing to remove the HEAD journal");
            return Ok(());
        }
        self.active().delete_journal(session_id)
    }

    fn clear_head(&self) -> Result<()> {
        info!("Clearing HEAD journal");
        self.active().delete_journal(HEAD_SESSION_ID)
    }

    fn session_ids(&self) -> Result<Vec<String>> {
        self.active().journal_ids()
    }

    fn switch_to_ephemeral_mode(&self) {
        let ephemeral = EphemeralStore::new();
        {
            let mut guard = match self.ephemeral.write() {
                Ok(guard) => guard,
                Err(e) => {
                    error!(error = %e, "Failed to switch to ephemeral mode");
                    return;
                }
            };
            if guard.is_some() {
                debug!("Store already in ephemeral mode");
                return;
            }
            self.copy_head(&ephemeral);
            *guard = Some(Arc::new(ephemeral));
            self.ephemeral_mode.store(true, Ordering::Release);
        }

        info!("Store switched to ephemeral mode");
        self.notify_listeners();
    }

    fn is_ephemeral_mode(&self) -> bool {
        self.ephemeral_mode.load(Ordering::Acquire)
    }
}
