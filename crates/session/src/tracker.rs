use feedhead_core::StreamStructure;
use std::collections::HashSet;
use tracing::{debug, info};

/// The set of content ids a session currently holds.
#[derive(Debug, Clone)]
pub struct SessionContentTracker {
    supports_clear_all: bool,
    content_in_session: HashSet<String>,
}

impl SessionContentTracker {
    pub fn new(supports_clear_all: bool) -> Self {
        Self {
            supports_clear_all,
            content_in_session: HashSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content_in_session.is_empty()
    }

    pub fn len(&self) -> usize {
        self.content_in_session.len()
    }

    pub fn clear(&mut self) {
        self.content_in_session.clear();
    }

    pub fn contains(&self, content_id: &str) -> bool {
        self.content_in_session.contains(content_id)
    }

    pub fn content_ids(&self) -> HashSet<String> {
        self.content_in_session.clone()
    }

    pub fn update_all(&mut self, structures: &[StreamStructure]) {
        for structure in structures {
            self.update(structure);
        }
    }

    pub fn update(&mut self, structure: &StreamStructure) {
        match structure {
            StreamStructure::UpdateOrAppend { content_id, .. }
            | StreamStructure::RequiredContent { content_id } => {
                self.content_in_session.insert(content_id.clone());
            }
            StreamStructure::Remove { content_id, .. } => {
                self.content_in_session.remove(content_id);
            }
            StreamStructure::ClearAll => {
                if self.supports_clear_all {
                    debug!(count = self.content_in_session.len(), "Tracker cleared");
                    self.content_in_session.clear();
                } else {
                    info!("CLEAR_ALL ignored by session without clear-all support");
                }
            }
        }
    }
}
