use feedhead_core::{
    Error, FeedConfig, MutationContext, PayloadWithId, Result, StreamStructure, HEAD_SESSION_ID,
};
use feedhead_storage::Store;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::cache::ContentCache;
use crate::factory::SessionFactory;
use crate::head::HeadSession;
use crate::head_structure::HeadAsStructure;
use crate::model::{ModelSession, Scheduling, SessionObserver};
use crate::session::{Session, UpdateSummary};

/// One response from the feed backend.
#[derive(Debug, Clone, Default)]
pub struct FeedUpdate {
    pub clear_head: bool,
    pub structures: Vec<StreamStructure>,
    pub payloads: Vec<PayloadWithId>,
    pub schema_version: i32,
    pub mutation_context: Option<MutationContext>,
}

fn dispatch<S: Session>(session: &mut S, update: &FeedUpdate) -> UpdateSummary {
    session.update_session(
        update.clear_head,
        &update.structures,
        update.schema_version,
        update.mutation_context.as_ref(),
    )
}

/// Owns HEAD, the derivative sessions and the mutation cache.
///
/// Updates must be applied from one serialized task; `&mut self` enforces
/// that within a process.
pub struct SessionManager {
    store: Arc<dyn Store>,
    factory: SessionFactory,
    head: HeadSession,
    sessions: HashMap<String, ModelSession>,
    cache: Arc<ContentCache>,
    initialized: bool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>, config: &FeedConfig) -> Self {
        Self::with_cache(store, config, Arc::new(ContentCache::new()))
    }

    pub fn with_cache(store: Arc<dyn Store>, config: &FeedConfig, cache: Arc<ContentCache>) -> Self {
        let factory = SessionFactory::new(store.clone(), config);
        let head = factory.head_session();
        Self {
            store,
            factory,
            head,
            sessions: HashMap::new(),
            cache,
            initialized: false,
        }
    }

    /// Seeds HEAD from the persisted HEAD journal.
    ///
    /// The schema version lives only in memory: HEAD restarts at 0 and adopts
    /// the version carried by the next `clear_head` update.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(Error::AlreadyInitialized("session manager".to_string()));
        }
        let structures = self.store.stream_structures(HEAD_SESSION_ID)?;
        self.head.initialize_session(&structures, 0);
        self.initialized = true;
        info!(size = structures.len(), "Session manager initialized");
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized("session manager".to_string()))
        }
    }

    /// Creates a derivative session. Immediate sessions are populated from
    /// HEAD right away; deferred ones wait for `populate_session`.
    pub fn create_session(&mut self) -> Result<String> {
        self.ensure_initialized()?;
        let mut session = self.factory.session();
        let session_id = session.session_id().to_string();
        if session.scheduling() == Scheduling::Immediate {
            let head = self.store.stream_structures(HEAD_SESSION_ID)?;
            session.populate(&head, self.head.schema_version());
        }
        debug!(session_id = %session_id, "Session created");
        self.sessions.insert(session_id.clone(), session);
        Ok(session_id)
    }

    pub fn populate_session(&mut self, session_id: &str) -> Result<Vec<UpdateSummary>> {
        let head = self.store.stream_structures(HEAD_SESSION_ID)?;
        let schema_version = self.head.schema_version();
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))?;
        Ok(session.populate(&head, schema_version))
    }

    pub fn bind_observer(&mut self, session_id: &str, observer: Arc<dyn SessionObserver>) -> Result<()> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))?;
        session.bind_observer(observer);
        Ok(())
    }

    /// Applies one update as a single mutation. Returns the HEAD summary.
    pub fn apply_update(&mut self, update: &FeedUpdate) -> Result<UpdateSummary> {
        self.ensure_initialized()?;
        self.cache.start_mutation();
        let result = self.apply_update_inner(update);
        self.cache.finish_mutation();
        result
    }

    fn apply_update_inner(&mut self, update: &FeedUpdate) -> Result<UpdateSummary> {
        let token = update
            .mutation_context
            .as_ref()
            .and_then(|c| c.continuation_token.as_ref());
        if let Some(token) = token {
            if !self.head.contains(&token.content_id) {
                // HEAD reports the discard; store, cache and sessions stay as they are
                return Ok(dispatch(&mut self.head, update));
            }
        }
        // a page kept out of HEAD still reaches the sessions, but never resets HEAD
        let page_outside_head = token.is_some() && self.head.limits_page_updates();

        if !update.payloads.is_empty() {
            for item in &update.payloads {
                self.cache.put(item.content_id.clone(), item.payload.clone());
            }
            self.write_payloads(&update.payloads)?;
        }

        if update.clear_head && !page_outside_head {
            self.reset_head();
        }

        let head_summary = dispatch(&mut self.head, update);
        for session in self.sessions.values_mut() {
            dispatch(session, update);
        }
        Ok(head_summary)
    }

    fn write_payloads(&self, payloads: &[PayloadWithId]) -> Result<()> {
        match self.store.write_payloads(payloads) {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(error = %e, "Content write failed, switching to ephemeral mode");
                self.store.switch_to_ephemeral_mode();
                self.store.write_payloads(payloads)
            }
        }
    }

    fn reset_head(&mut self) {
        let invalidated: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.invalidate_on_reset_head())
            .map(|(id, _)| id.clone())
            .collect();
        for session_id in invalidated {
            self.invalidate_session(&session_id);
        }

        if let Err(e) = self.store.clear_head() {
            warn!(error = %e, "Unable to clear HEAD journal, switching to ephemeral mode");
            self.store.switch_to_ephemeral_mode();
            if let Err(e) = self.store.clear_head() {
                error!(error = %e, "Unable to clear ephemeral HEAD journal");
            }
        }
        self.head.reset();
    }

    /// Payloads for the given ids, from the mutation cache first.
    pub fn content(&self, content_ids: &[String]) -> Result<Vec<PayloadWithId>> {
        let mut found = Vec::with_capacity(content_ids.len());
        let mut missing = Vec::new();
        for id in content_ids {
            match self.cache.get(id) {
                Some(payload) => found.push(PayloadWithId::new(id.clone(), payload)),
                None => missing.push(id.clone()),
            }
        }
        if !missing.is_empty() {
            found.extend(self.store.payloads(&missing)?);
        }
        Ok(found)
    }

    /// Drops a derivative session and its journal. Returns `false` if unknown.
    pub fn invalidate_session(&mut self, session_id: &str) -> bool {
        let Some(mut session) = self.sessions.remove(session_id) else {
            return false;
        };
        session.invalidate();
        if let Err(e) = self.store.remove_session(session_id) {
            warn!(error = %e, session_id = %session_id, "Unable to remove session journal");
        }
        true
    }

    /// A fresh, uninitialized tree view over the current HEAD journal.
    pub fn head_structure(&self) -> HeadAsStructure {
        HeadAsStructure::new(self.store.clone())
    }

    pub fn head(&self) -> &HeadSession {
        &self.head
    }

    pub fn session(&self, session_id: &str) -> Option<&ModelSession> {
        self.sessions.get(session_id)
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn cache(&self) -> Arc<ContentCache> {
        self.cache.clone()
    }

    pub fn is_ephemeral_mode(&self) -> bool {
        self.store.is_ephemeral_mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{DiscardReason, UpdateOutcome};
    use crate::testing::TestStore;
    use feedhead_core::{Payload, StreamToken};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn initial_update() -> FeedUpdate {
        FeedUpdate {
            clear_head: true,
            structures: vec![
                StreamStructure::ClearAll,
                StreamStructure::append("root", None),
                StreamStructure::append("a", Some("root")),
                StreamStructure::append("b", Some("root")),
            ],
            payloads: vec![
                PayloadWithId::new("root", Payload::from("R")),
                PayloadWithId::new("a", Payload::from("A")),
            ],
            schema_version: 2,
            mutation_context: None,
        }
    }

    fn manager(store: Arc<TestStore>, config: FeedConfig) -> SessionManager {
        let mut manager = SessionManager::new(store, &config);
        manager.initialize().unwrap();
        manager
    }

    #[test]
    fn test_requires_initialize() {
        let mut manager = SessionManager::new(Arc::new(TestStore::new()), &FeedConfig::default());
        assert!(matches!(
            manager.apply_update(&initial_update()),
            Err(Error::NotInitialized(_))
        ));
        assert!(manager.create_session().is_err());

        manager.initialize().unwrap();
        assert!(matches!(manager.initialize(), Err(Error::AlreadyInitialized(_))));
    }

    #[test]
    fn test_schema_version_restarts_at_zero() {
        let store = Arc::new(TestStore::new());
        let mut first = manager(store.clone(), FeedConfig::default());
        first.apply_update(&initial_update()).unwrap();
        assert_eq!(first.head().schema_version(), 2);

        let restarted = manager(store, FeedConfig::default());
        assert_eq!(restarted.head().schema_version(), 0);
        assert_eq!(restarted.head().content_in_session().len(), 3);
    }

    #[test]
    fn test_update_feeds_head_structure() {
        let store = Arc::new(TestStore::new());
        let mut manager = manager(store.clone(), FeedConfig::default());

        let summary = manager.apply_update(&initial_update()).unwrap();
        assert_eq!(summary.added, 3);
        assert_eq!(manager.head().schema_version(), 2);
        assert_eq!(store.committed(HEAD_SESSION_ID).len(), 3);

        let head = manager.head_structure();
        head.initialize().unwrap();
        let ids = head
            .filter(|node| Some(node.content_id().to_string()))
            .unwrap();
        assert_eq!(ids, vec!["root", "a"]);
    }

    #[test]
    fn test_clear_head_invalidates_sessions() {
        let store = Arc::new(TestStore::new());
        let mut manager = manager(store.clone(), FeedConfig::default());
        manager.apply_update(&initial_update()).unwrap();

        let session_id = manager.create_session().unwrap();
        assert_eq!(manager.session(&session_id).unwrap().content_in_session().len(), 3);

        manager.apply_update(&initial_update()).unwrap();
        assert!(manager.session(&session_id).is_none());
        assert!(store.committed(&session_id).is_empty());
        // HEAD journal replaced, not appended to
        assert_eq!(store.committed(HEAD_SESSION_ID).len(), 3);
    }

    #[test]
    fn test_page_update_reaches_sessions() {
        let store = Arc::new(TestStore::new());
        let mut manager = manager(store, FeedConfig::default());
        manager.apply_update(&initial_update()).unwrap();
        let session_id = manager.create_session().unwrap();

        let page = FeedUpdate {
            structures: vec![StreamStructure::append("c", Some("root"))],
            payloads: vec![PayloadWithId::new("c", Payload::from("C"))],
            schema_version: 2,
            mutation_context: Some(
                MutationContext::with_token(StreamToken::new("b")).requested_by(session_id.clone()),
            ),
            ..Default::default()
        };
        let summary = manager.apply_update(&page).unwrap();
        assert!(summary.is_applied());
        assert!(manager.head().contains("c"));
        assert!(manager.session(&session_id).unwrap().content_in_session().contains("c"));

        let stale = FeedUpdate {
            structures: vec![StreamStructure::append("d", Some("root"))],
            mutation_context: Some(MutationContext::with_token(StreamToken::new("gone"))),
            ..Default::default()
        };
        let summary = manager.apply_update(&stale).unwrap();
        assert!(matches!(summary.outcome, UpdateOutcome::Discarded(_)));
        assert!(!manager.head().contains("d"));
    }

    #[test]
    fn test_stale_token_clear_head_leaves_head_untouched() {
        let store = Arc::new(TestStore::new());
        let mut manager = manager(store.clone(), FeedConfig::default());
        manager.apply_update(&initial_update()).unwrap();
        let session_id = manager.create_session().unwrap();
        let before = manager.head().content_in_session();

        let stale = FeedUpdate {
            clear_head: true,
            structures: vec![StreamStructure::append("x", None)],
            payloads: vec![PayloadWithId::new("x", Payload::from("X"))],
            schema_version: 5,
            mutation_context: Some(MutationContext::with_token(StreamToken::new("gone"))),
        };
        let summary = manager.apply_update(&stale).unwrap();

        assert_eq!(
            summary.outcome,
            UpdateOutcome::Discarded(DiscardReason::UnknownToken("gone".to_string()))
        );
        assert_eq!(manager.head().content_in_session(), before);
        assert_eq!(store.committed(HEAD_SESSION_ID).len(), 3);
        assert!(manager.session(&session_id).is_some());
        assert!(manager.content(&["x".to_string()]).unwrap().is_empty());
    }

    #[test]
    fn test_page_kept_out_of_head_does_not_reset_it() {
        let config = FeedConfig {
            limit_page_updates_in_head: true,
            ..Default::default()
        };
        let store = Arc::new(TestStore::new());
        let mut manager = manager(store.clone(), config);
        manager.apply_update(&initial_update()).unwrap();
        let before = manager.head().content_in_session();

        let page = FeedUpdate {
            clear_head: true,
            structures: vec![StreamStructure::append("c", Some("root"))],
            schema_version: 2,
            mutation_context: Some(MutationContext::with_token(StreamToken::new("b"))),
            ..Default::default()
        };
        let summary = manager.apply_update(&page).unwrap();

        assert_eq!(
            summary.outcome,
            UpdateOutcome::Discarded(DiscardReason::PageUpdatesLimited)
        );
        assert_eq!(manager.head().content_in_session(), before);
        assert_eq!(store.committed(HEAD_SESSION_ID).len(), 3);
    }

    #[test]
    fn test_deferred_sessions_populate_on_demand() {
        let config = FeedConfig {
            use_timeout_scheduler: true,
            ..Default::default()
        };
        let mut manager = manager(Arc::new(TestStore::new()), config);
        manager.apply_update(&initial_update()).unwrap();

        let session_id = manager.create_session().unwrap();
        assert!(!manager.session(&session_id).unwrap().is_populated());

        let update = FeedUpdate {
            structures: vec![StreamStructure::append("c", Some("root"))],
            schema_version: 2,
            ..Default::default()
        };
        manager.apply_update(&update).unwrap();
        assert_eq!(manager.session(&session_id).unwrap().pending_updates(), 1);

        let replayed = manager.populate_session(&session_id).unwrap();
        assert_eq!(replayed.len(), 1);
        // HEAD already holds c, so the replay sees it as an update
        assert_eq!(replayed[0].updated, 1);
        assert!(manager.populate_session("missing").is_err());
    }

    #[test]
    fn test_content_and_cache_stats() {
        let mut manager = manager(Arc::new(TestStore::new()), FeedConfig::default());
        manager.apply_update(&initial_update()).unwrap();

        let content = manager
            .content(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0].payload, Payload::from("A"));

        let stats = manager.cache().stats();
        assert_eq!(stats.mutation_count, 1);
        assert_eq!(stats.max_size, 2);
        assert_eq!(stats.current_size, 0);
    }

    struct InvalidationCounter(AtomicUsize);

    impl SessionObserver for InvalidationCounter {
        fn on_structure_changed(&self, _session_id: &str, _changes: &[StreamStructure]) {}
        fn on_content_updated(&self, _session_id: &str, _content_ids: &[String]) {}
        fn on_invalidated(&self, _session_id: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_invalidate_session() {
        let mut manager = manager(Arc::new(TestStore::new()), FeedConfig::default());
        manager.apply_update(&initial_update()).unwrap();
        let session_id = manager.create_session().unwrap();
        let observer = Arc::new(InvalidationCounter(AtomicUsize::new(0)));
        manager.bind_observer(&session_id, observer.clone()).unwrap();

        assert!(manager.invalidate_session(&session_id));
        assert!(!manager.invalidate_session(&session_id));
        assert_eq!(observer.0.load(Ordering::SeqCst), 1);
        assert!(manager.session_ids().is_empty());
    }

    #[test]
    fn test_commit_failure_enters_ephemeral_mode() {
        let store = Arc::new(TestStore::failing_commits());
        let mut manager = manager(store.clone(), FeedConfig::default());

        let summary = manager.apply_update(&initial_update()).unwrap();
        assert!(!summary.committed);
        assert_eq!(store.ephemeral_switches(), 1);
        assert!(manager.is_ephemeral_mode());
        assert!(manager.head().contains("root"));
    }
}
