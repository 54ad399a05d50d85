//! Store doubles shared by the unit tests.

use feedhead_core::{PayloadWithId, Result, StreamStructure};
use feedhead_storage::{EphemeralStore, FeedStore, SessionMutation, Store};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct RejectedMutation(Vec<StreamStructure>);

impl SessionMutation for RejectedMutation {
    fn add(&mut self, structure: StreamStructure) {
        self.0.push(structure);
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn commit(self: Box<Self>) -> bool {
        false
    }
}

/// In-memory store that counts ephemeral switches and can reject commits.
pub(crate) struct TestStore {
    inner: FeedStore,
    fail_commits: bool,
    switches: AtomicUsize,
}

impl TestStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: FeedStore::new(Arc::new(EphemeralStore::new())),
            fail_commits: false,
            switches: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_commits() -> Self {
        Self {
            fail_commits: true,
            ..Self::new()
        }
    }

    pub(crate) fn committed(&self, session_id: &str) -> Vec<StreamStructure> {
        self.inner.stream_structures(session_id).unwrap()
    }

    pub(crate) fn ephemeral_switches(&self) -> usize {
        self.switches.load(Ordering::SeqCst)
    }
}

impl Store for TestStore {
    fn stream_structures(&self, session_id: &str) -> Result<Vec<StreamStructure>> {
        self.inner.stream_structures(session_id)
    }

    fn payloads(&self, content_ids: &[String]) -> Result<Vec<PayloadWithId>> {
        self.inner.payloads(content_ids)
    }

    fn write_payloads(&self, items: &[PayloadWithId]) -> Result<()> {
        self.inner.write_payloads(items)
    }

    fn edit_session(&self, session_id: &str) -> Box<dyn SessionMutation> {
        if self.fail_commits {
            Box::new(RejectedMutation(Vec::new()))
        } else {
            self.inner.edit_session(session_id)
        }
    }

    fn remove_session(&self, session_id: &str) -> Result<()> {
        self.inner.remove_session(session_id)
    }

    fn clear_head(&self) -> Result<()> {
        self.inner.clear_head()
    }

    fn session_ids(&self) -> Result<Vec<String>> {
        self.inner.session_ids()
    }

    fn switch_to_ephemeral_mode(&self) {
        self.switches.fetch_add(1, Ordering::SeqCst);
        self.inner.switch_to_ephemeral_mode();
    }

    fn is_ephemeral_mode(&self) -> bool {
        self.inner.is_ephemeral_mode()
    }
}
