//! HEAD content-tree sessions.
//!
//! `HeadAsStructure` is the read side: a tree built once from the HEAD
//! journal and walked in pre-order. `HeadSession` and `ModelSession` are the
//! write side: they classify incoming structure batches against what they
//! already hold and commit the difference to the store.

pub mod cache;
pub mod factory;
pub mod head;
pub mod head_structure;
pub mod manager;
pub mod model;
pub mod session;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheStats, ContentCache};
pub use factory::SessionFactory;
pub use head::HeadSession;
pub use head_structure::{Binding, HeadAsStructure, HeadTree, TreeNode};
pub use manager::{FeedUpdate, SessionManager};
pub use model::{ModelSession, Scheduling, SessionObserver};
pub use session::{DiscardReason, Session, UpdateOutcome, UpdateSummary};
pub use tracker::SessionContentTracker;
