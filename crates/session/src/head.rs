use feedhead_core::{MutationContext, StreamStructure, HEAD_SESSION_ID};
use feedhead_storage::Store;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::session::{DiscardReason, Session, UpdateSummary};
use crate::tracker::SessionContentTracker;

/// The session of record for HEAD.
///
/// Updates are expected one at a time from a single task queue; nothing here
/// is locked.
pub struct HeadSession {
    store: Arc<dyn Store>,
    tracker: SessionContentTracker,
    schema_version: i32,
    limit_page_updates_in_head: bool,
}

impl HeadSession {
    pub fn new(store: Arc<dyn Store>, limit_page_updates_in_head: bool) -> Self {
        Self {
            store,
            tracker: SessionContentTracker::new(true),
            schema_version: 0,
            limit_page_updates_in_head,
        }
    }

    /// Seeds the tracker from the full HEAD journal.
    pub fn initialize_session(&mut self, structures: &[StreamStructure], schema_version: i32) {
        info!(size = structures.len(), schema_version, "Initializing HEAD session");
        self.tracker.update_all(structures);
        self.schema_version = schema_version;
    }

    pub fn reset(&mut self) {
        self.tracker.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    pub fn contains(&self, content_id: &str) -> bool {
        self.tracker.contains(content_id)
    }

    /// Whether page continuations are kept out of HEAD.
    pub fn limits_page_updates(&self) -> bool {
        self.limit_page_updates_in_head
    }
}

impl Session for HeadSession {
    fn session_id(&self) -> &str {
        HEAD_SESSION_ID
    }

    fn update_session(
        &mut self,
        clear_head: bool,
        structures: &[StreamStructure],
        schema_version: i32,
        mutation_context: Option<&MutationContext>,
    ) -> UpdateSummary {
        if clear_head {
            self.schema_version = schema_version;
        }

        if let Some(token) = mutation_context.and_then(|c| c.continuation_token.as_ref()) {
            if !self.tracker.contains(&token.content_id) {
                warn!(token = %token.content_id, "Token not found in HEAD, ignoring update");
                return UpdateSummary::discarded(DiscardReason::UnknownToken(
                    token.content_id.clone(),
                ));
            }
            if self.limit_page_updates_in_head {
                info!(token = %token.content_id, "Page update for HEAD ignored");
                return UpdateSummary::discarded(DiscardReason::PageUpdatesLimited);
            }
        }

        let mut summary = UpdateSummary::applied();
        let mut mutation = self.store.edit_session(HEAD_SESSION_ID);
        for structure in structures {
            match structure {
                StreamStructure::UpdateOrAppend { content_id, .. } => {
                    if self.tracker.contains(content_id) {
                        summary.updated += 1;
                    } else {
                        mutation.add(structure.clone());
                        summary.added += 1;
                    }
                }
                StreamStructure::Remove { content_id, .. } => {
                    if self.tracker.contains(content_id) {
                        mutation.add(structure.clone());
                        summary.removed += 1;
                    } else {
                        warn!(content_id = %content_id, "Remove of content not in HEAD");
                    }
                }
                StreamStructure::ClearAll => {
                    summary.cleared = true;
                }
                StreamStructure::RequiredContent { content_id } => {
                    if !self.tracker.contains(content_id) {
                        mutation.add(structure.clone());
                        summary.required += 1;
                    }
                }
            }
            self.tracker.update(structure);
        }

        summary.committed = mutation.commit();
        if !summary.committed {
            // the tracker has already advanced; persisted HEAD is now suspect
            error!("HEAD mutation commit failed, switching to ephemeral mode");
            self.store.switch_to_ephemeral_mode();
        }

        info!(
            cleared = summary.cleared,
            added = summary.added,
            updated = summary.updated,
            removed = summary.removed,
            required = summary.required,
            committed = summary.committed,
            "HEAD updated"
        );
        debug!(size = self.tracker.len(), "HEAD content size");
        summary
    }

    fn content_in_session(&self) -> HashSet<String> {
        self.tracker.content_ids()
    }

    fn invalidate_on_reset_head(&self) -> bool {
        false
    }

    fn schema_version(&self) -> i32 {
        self.schema_version
    }
}
