use feedhead_core::FeedConfig;
use feedhead_storage::Store;
use std::sync::Arc;

use crate::head::HeadSession;
use crate::model::{ModelSession, Scheduling};

/// Builds sessions with the behavior switches read once from config.
pub struct SessionFactory {
    store: Arc<dyn Store>,
    use_timeout_scheduler: bool,
    limit_page_updates: bool,
    limit_page_updates_in_head: bool,
}

impl SessionFactory {
    pub fn new(store: Arc<dyn Store>, config: &FeedConfig) -> Self {
        Self {
            store,
            use_timeout_scheduler: config.use_timeout_scheduler,
            limit_page_updates: config.limit_page_updates,
            limit_page_updates_in_head: config.limit_page_updates_in_head,
        }
    }

    pub fn head_session(&self) -> HeadSession {
        HeadSession::new(self.store.clone(), self.limit_page_updates_in_head)
    }

    pub fn session(&self) -> ModelSession {
        let scheduling = if self.use_timeout_scheduler {
            Scheduling::Deferred
        } else {
            Scheduling::Immediate
        };
        ModelSession::new(self.store.clone(), self.limit_page_updates, scheduling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::testing::TestStore;

    #[test]
    fn test_scheduling_follows_config() {
        let store: Arc<dyn Store> = Arc::new(TestStore::new());

        let factory = SessionFactory::new(store.clone(), &FeedConfig::default());
        assert_eq!(factory.session().scheduling(), Scheduling::Immediate);

        let config = FeedConfig {
            use_timeout_scheduler: true,
            ..Default::default()
        };
        let factory = SessionFactory::new(store, &config);
        assert_eq!(factory.session().scheduling(), Scheduling::Deferred);
        assert_eq!(factory.head_session().session_id(), "$HEAD");
    }

    #[test]
    fn test_sessions_get_distinct_ids() {
        let factory = SessionFactory::new(Arc::new(TestStore::new()), &FeedConfig::default());
        let a = factory.session();
        let b = factory.session();
        assert_ne!(a.session_id(), b.session_id());
    }
}
