//! Read-only tree view of the HEAD journal.
//!
//! The tree is built once from the full HEAD journal, bound to payloads from
//! the store, and then only read. Children are kept as a forward adjacency
//! map (`parent id -> ordered child ids`); nodes never point at their parent.

use feedhead_core::{BuildError, Error, Payload, PayloadWithId, Result, StreamStructure, HEAD_SESSION_ID};
use feedhead_storage::Store;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, error, info, warn};

/// Whether a node's payload has been materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Unbound,
    Bound(Payload),
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    content_id: String,
    structure: StreamStructure,
    binding: Binding,
}

impl TreeNode {
    fn new(content_id: String, structure: StreamStructure) -> Self {
        Self {
            content_id,
            structure,
            binding: Binding::Unbound,
        }
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn structure(&self) -> &StreamStructure {
        &self.structure
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn payload(&self) -> Option<&Payload> {
        match &self.binding {
            Binding::Bound(payload) => Some(payload),
            Binding::Unbound => None,
        }
    }
}

/// Tree and content index built from one pass over a structure journal.
#[derive(Debug, Default)]
pub struct HeadTree {
    root: Option<String>,
    content: HashMap<String, TreeNode>,
    children: HashMap<String, Vec<String>>,
}

impl HeadTree {
    /// Builds the tree in log order. The first `UPDATE_OR_APPEND` for an id
    /// fixes its position, and the first rootless node is the root.
    pub fn build(structures: &[StreamStructure]) -> Result<Self> {
        let mut tree = HeadTree::default();
        for structure in structures {
            match structure {
                StreamStructure::UpdateOrAppend {
                    content_id,
                    parent_content_id,
                } => tree.update_or_append(structure, content_id, parent_content_id.as_deref()),
                StreamStructure::Remove {
                    content_id,
                    parent_content_id,
                } => tree.remove(content_id, parent_content_id.as_deref()),
                StreamStructure::ClearAll => {
                    debug!("CLEAR_ALL skipped while building HEAD tree");
                }
                StreamStructure::RequiredContent { content_id } => {
                    debug!(content_id = %content_id, "REQUIRED_CONTENT skipped while building HEAD tree");
                }
            }
        }

        if tree.root.is_none() {
            error!(structures = structures.len(), "No root found while building HEAD tree");
            return Err(BuildError::NoRootFound.into());
        }
        Ok(tree)
    }

    fn update_or_append(
        &mut self,
        structure: &StreamStructure,
        content_id: &str,
        parent_content_id: Option<&str>,
    ) {
        if self.content.contains_key(content_id) {
            // redundant update, position already assigned
            return;
        }

        self.content.insert(
            content_id.to_string(),
            TreeNode::new(content_id.to_string(), structure.clone()),
        );
        self.children.entry(content_id.to_string()).or_default();

        match parent_content_id {
            None => match &self.root {
                Some(kept) => {
                    let err = BuildError::MultipleRoots {
                        kept: kept.clone(),
                        ignored: content_id.to_string(),
                    };
                    error!(error = %err, "Keeping first HEAD root");
                }
                None => self.root = Some(content_id.to_string()),
            },
            Some(parent) => {
                self.children
                    .entry(parent.to_string())
                    .or_default()
                    .push(content_id.to_string());
            }
        }
    }

    fn remove(&mut self, content_id: &str, parent_content_id: Option<&str>) {
        warn!(content_id = %content_id, "REMOVE found while building HEAD tree");
        let removed = self.content.remove(content_id);
        self.children.remove(content_id);
        if self.root.as_deref() == Some(content_id) {
            self.root = None;
            return;
        }

        // detach from where the node was appended, whatever parent the REMOVE names
        let recorded = removed
            .as_ref()
            .and_then(|node| node.structure.parent_content_id())
            .map(str::to_string);
        let Some(parent) = recorded.or_else(|| parent_content_id.map(str::to_string)) else {
            warn!(content_id = %content_id, "No parent to detach removed node from");
            return;
        };
        match self.children.get_mut(&parent) {
            Some(siblings) => siblings.retain(|id| id != content_id),
            None => {
                warn!(content_id = %content_id, parent = %parent, "Parent of removed node not found");
            }
        }
    }

    /// Attaches payloads to their nodes; unknown ids are skipped.
    pub fn bind(&mut self, payloads: Vec<PayloadWithId>) -> usize {
        let mut bound = 0;
        for item in payloads {
            match self.content.get_mut(&item.content_id) {
                Some(node) => {
                    node.binding = Binding::Bound(item.payload);
                    bound += 1;
                }
                None => {
                    warn!(content_id = %item.content_id, "Payload for unknown content");
                }
            }
        }
        bound
    }

    pub fn root_id(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn get(&self, content_id: &str) -> Option<&TreeNode> {
        self.content.get(content_id)
    }

    pub fn children(&self, content_id: &str) -> &[String] {
        self.children
            .get(content_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn content_ids(&self) -> Vec<String> {
        self.content.keys().cloned().collect()
    }

    /// Pre-order walk from the root. An unbound node hides its whole subtree.
    pub fn filter<T, F>(&self, mut predicate: F) -> Vec<T>
    where
        F: FnMut(&TreeNode) -> Option<T>,
    {
        let mut results = Vec::new();
        let Some(root) = self.root.as_deref() else {
            return results;
        };

        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![root];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                warn!(content_id = %id, "Node reached twice, skipping");
                continue;
            }
            let Some(node) = self.content.get(id) else {
                warn!(content_id = %id, "Child without node");
                continue;
            };
            if let Binding::Unbound = node.binding {
                warn!(content_id = %id, "Found unbound node");
                continue;
            }

            if let Some(value) = predicate(node) {
                results.push(value);
            }
            for child in self.children(id).iter().rev() {
                stack.push(child.as_str());
            }
        }
        results
    }
}

/// HEAD as a tree, initialized once from the store.
pub struct HeadAsStructure {
    store: Arc<dyn Store>,
    init_lock: Mutex<()>,
    tree: OnceLock<HeadTree>,
}

impl HeadAsStructure {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            init_lock: Mutex::new(()),
            tree: OnceLock::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.tree.get().is_some()
    }

    /// Reads the HEAD journal, builds the tree and binds payloads. Blocking;
    /// keep it off the main thread. Succeeds at most once per instance.
    pub fn initialize(&self) -> Result<()> {
        let _guard = self
            .init_lock
            .lock()
            .map_err(|e| Error::Other(format!("Lock error: {}", e)))?;
        if self.tree.get().is_some() {
            error!("HEAD structure has already been initialized");
            return Err(Error::AlreadyInitialized("HEAD structure".to_string()));
        }

        let structures = self.store.stream_structures(HEAD_SESSION_ID)?;
        info!(size = structures.len(), "Building HEAD tree");

        let mut tree = HeadTree::build(&structures)?;
        let payloads = self.store.payloads(&tree.content_ids()).map_err(|e| {
            error!(error = %e, "Unable to fetch HEAD payloads");
            Error::PayloadFetch(e.to_string())
        })?;
        let bound = tree.bind(payloads);
        info!(nodes = tree.len(), bound, "HEAD tree initialized");

        self.tree
            .set(tree)
            .map_err(|_| Error::AlreadyInitialized("HEAD structure".to_string()))
    }

    /// Pre-order filtered walk over bound nodes.
    pub fn filter<T, F>(&self, predicate: F) -> Result<Vec<T>>
    where
        F: FnMut(&TreeNode) -> Option<T>,
    {
        match self.tree.get() {
            Some(tree) => Ok(tree.filter(predicate)),
            None => {
                error!("HEAD structure has not been initialized");
                Err(Error::NotInitialized("HEAD structure".to_string()))
            }
        }
    }

    pub fn tree(&self) -> Option<&HeadTree> {
        self.tree.get()
    }
}
