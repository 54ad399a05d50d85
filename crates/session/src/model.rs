use feedhead_core::{MutationContext, StreamStructure};
use feedhead_storage::Store;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::session::{DiscardReason, Session, UpdateSummary};
use crate::tracker::SessionContentTracker;

/// Receives the changes a derivative session applied.
pub trait SessionObserver: Send + Sync {
    /// Operations written to the session journal, in order.
    fn on_structure_changed(&self, session_id: &str, changes: &[StreamStructure]);

    /// Content already in the session whose payload was refreshed.
    fn on_content_updated(&self, session_id: &str, content_ids: &[String]);

    fn on_invalidated(&self, session_id: &str);
}

/// How a session handles updates that arrive before it is populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduling {
    /// Populated on creation; updates apply as they arrive.
    Immediate,
    /// Populated later by the host scheduler; earlier updates are queued.
    Deferred,
}

struct PendingUpdate {
    structures: Vec<StreamStructure>,
    schema_version: i32,
    mutation_context: Option<MutationContext>,
}

/// A consumer-facing session derived from HEAD.
pub struct ModelSession {
    session_id: String,
    store: Arc<dyn Store>,
    tracker: SessionContentTracker,
    schema_version: i32,
    limit_page_updates: bool,
    scheduling: Scheduling,
    populated: bool,
    pending: Vec<PendingUpdate>,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl ModelSession {
    pub fn new(store: Arc<dyn Store>, limit_page_updates: bool, scheduling: Scheduling) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            store,
            tracker: SessionContentTracker::new(false),
            schema_version: 0,
            limit_page_updates,
            scheduling,
            populated: false,
            pending: Vec::new(),
            observer: None,
        }
    }

    pub fn scheduling(&self) -> Scheduling {
        self.scheduling
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn pending_updates(&self) -> usize {
        self.pending.len()
    }

    pub fn bind_observer(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observer = Some(observer);
    }

    pub fn unbind_observer(&mut self) {
        self.observer = None;
    }

    /// Copies HEAD into the session, then replays anything queued meanwhile.
    pub fn populate(&mut self, head: &[StreamStructure], schema_version: i32) -> Vec<UpdateSummary> {
        if self.populated {
            warn!(session_id = %self.session_id, "Session already populated");
            return Vec::new();
        }

        let mut mutation = self.store.edit_session(&self.session_id);
        let mut changes = Vec::new();
        for structure in head {
            if let StreamStructure::ClearAll = structure {
                continue;
            }
            mutation.add(structure.clone());
            changes.push(structure.clone());
            self.tracker.update(structure);
        }
        if !mutation.commit() {
            error!(session_id = %self.session_id, "Session population commit failed");
            self.store.switch_to_ephemeral_mode();
        }
        self.schema_version = schema_version;
        self.populated = true;
        info!(session_id = %self.session_id, size = self.tracker.len(), "Session populated");

        if let Some(observer) = &self.observer {
            observer.on_structure_changed(&self.session_id, &changes);
        }

        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            debug!(session_id = %self.session_id, count = pending.len(), "Replaying queued updates");
        }
        pending
            .into_iter()
            .map(|update| {
                self.apply(
                    &update.structures,
                    update.schema_version,
                    update.mutation_context.as_ref(),
                )
            })
            .collect()
    }

    pub fn invalidate(&mut self) {
        info!(session_id = %self.session_id, "Session invalidated");
        self.tracker.clear();
        self.pending.clear();
        if let Some(observer) = self.observer.take() {
            observer.on_invalidated(&self.session_id);
        }
    }

    fn apply(
        &mut self,
        structures: &[StreamStructure],
        schema_version: i32,
        mutation_context: Option<&MutationContext>,
    ) -> UpdateSummary {
        if let Some(token) = mutation_context.and_then(|c| c.continuation_token.as_ref()) {
            if !self.tracker.contains(&token.content_id) {
                warn!(
                    session_id = %self.session_id,
                    token = %token.content_id,
                    "Token not found in session, ignoring update"
                );
                return UpdateSummary::discarded(DiscardReason::UnknownToken(
                    token.content_id.clone(),
                ));
            }
            let requester = mutation_context.and_then(|c| c.requesting_session_id.clone());
            if self.limit_page_updates && requester.as_deref() != Some(self.session_id.as_str()) {
                debug!(
                    session_id = %self.session_id,
                    requester = ?requester,
                    "Page requested by another session, ignoring update"
                );
                return UpdateSummary::discarded(DiscardReason::RequestedByOtherSession(requester));
            }
        }

        let mut summary = UpdateSummary::applied();
        let mut mutation = self.store.edit_session(&self.session_id);
        let mut changes = Vec::new();
        let mut updated_ids = Vec::new();
        for structure in structures {
            let staged = match structure {
                StreamStructure::UpdateOrAppend { content_id, .. } => {
                    if self.tracker.contains(content_id) {
                        updated_ids.push(content_id.clone());
                        summary.updated += 1;
                        false
                    } else {
                        summary.added += 1;
                        true
                    }
                }
                StreamStructure::Remove { content_id, .. } => {
                    if self.tracker.contains(content_id) {
                        summary.removed += 1;
                        true
                    } else {
                        warn!(session_id = %self.session_id, content_id = %content_id, "Remove of content not in session");
                        false
                    }
                }
                StreamStructure::ClearAll => {
                    summary.cleared = true;
                    false
                }
                StreamStructure::RequiredContent { content_id } => {
                    let missing = !self.tracker.contains(content_id);
                    if missing {
                        summary.required += 1;
                    }
                    missing
                }
            };
            if staged {
                mutation.add(structure.clone());
                changes.push(structure.clone());
            }
            self.tracker.update(structure);
        }

        summary.committed = mutation.commit();
        if !summary.committed {
            error!(session_id = %self.session_id, "Session mutation commit failed, switching to ephemeral mode");
            self.store.switch_to_ephemeral_mode();
        }
        self.schema_version = schema_version;

        if let Some(observer) = &self.observer {
            if !changes.is_empty() {
                observer.on_structure_changed(&self.session_id, &changes);
            }
            if !updated_ids.is_empty() {
                observer.on_content_updated(&self.session_id, &updated_ids);
            }
        }

        info!(
            session_id = %self.session_id,
            added = summary.added,
            updated = summary.updated,
            removed = summary.removed,
            required = summary.required,
            committed = summary.committed,
            "Session updated"
        );
        summary
    }
}

impl Session for ModelSession {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn update_session(
        &mut self,
        clear_head: bool,
        structures: &[StreamStructure],
        schema_version: i32,
        mutation_context: Option<&MutationContext>,
    ) -> UpdateSummary {
        if clear_head {
            info!(session_id = %self.session_id, "HEAD cleared, session update skipped");
            return UpdateSummary::discarded(DiscardReason::ClearHead);
        }

        if !self.populated && self.scheduling == Scheduling::Deferred {
            debug!(session_id = %self.session_id, "Session not populated, queueing update");
            self.pending.push(PendingUpdate {
                structures: structures.to_vec(),
                schema_version,
                mutation_context: mutation_context.cloned(),
            });
            return UpdateSummary::queued();
        }

        self.apply(structures, schema_version, mutation_context)
    }

    fn content_in_session(&self) -> HashSet<String> {
        self.tracker.content_ids()
    }

    fn invalidate_on_reset_head(&self) -> bool {
        true
    }

    fn schema_version(&self) -> i32 {
        self.schema_version
    }
}
