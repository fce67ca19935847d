//! Snapshot store for version history
//!
//! The store is an append-only arena of immutable [`Version`]s. Parent links
//! turn the arena into a directed acyclic graph; following only the primary
//! parent from any version gives a simple chain back to a root.
//!
//! ## Structure
//!
//! ```text
//! root
//! ├── v1
//! │   ├── v2            (main)
//! │   └── v3            (feature)
//! │       └── v4 ◄─ v2  (merge-commit, merge parent v2)
//! └── r2                (independent root)
//! ```
//!
//! Versions live in a `Vec` ordered by timestamp, and an id → slot map gives
//! constant-time lookup. The map is rebuilt after deletions, which only
//! happen during hard rollback.
//!
//! ## Timestamps
//!
//! The store assigns creation timestamps itself and guarantees they are
//! strictly increasing, so a child is always newer than its parents even on
//! a coarse system clock.
//!
//! ## Examples
//!
//! ```rust
//! use revmap::store::SnapshotStore;
//! use revmap::version::Document;
//!
//! let mut store = SnapshotStore::new();
//! let root = store.create(Document::new(), None, "root", "alice", None)?;
//! let child = store.create(Document::new(), Some(root.id.clone()), "child", "alice", None)?;
//!
//! let chain = store.chain(&child.id)?;
//! assert_eq!(chain.len(), 2);
//! assert_eq!(chain[0].id, root.id);
//! # Ok::<(), revmap::RevmapError>(())
//! ```

use crate::error::{Result, RevmapError};
use crate::version::{Document, Version};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, trace};

/// Append-only arena of versions
///
/// # Thread Safety
///
/// The store is not synchronized. A [`crate::Revmap`] session owns exactly
/// one store; share it across threads only behind external locking.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    /// Versions in timestamp order
    versions: Vec<Version>,
    /// Version id -> slot in `versions`
    index: HashMap<String, usize>,
    /// Primary parent id -> child ids
    children: HashMap<String, Vec<String>>,
    /// Merge parent id -> merge-commit ids
    merge_children: HashMap<String, Vec<String>>,
    /// Newest timestamp ever handed out or loaded
    last_timestamp: Option<DateTime<Utc>>,
}

impl SnapshotStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted versions
    ///
    /// Versions may arrive in any order. A version is accepted once all of
    /// its parents are present; if a pass makes no progress the remaining
    /// versions either reference missing parents or form a cycle, and
    /// loading fails with an integrity error.
    pub fn from_versions(versions: Vec<Version>) -> Result<Self> {
        let mut store = Self::new();
        let mut pending = versions;

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();

            for version in pending {
                let ready = version.parents().all(|p| store.contains(p));
                if ready {
                    store.insert(version)?;
                } else {
                    deferred.push(version);
                }
            }

            if deferred.len() == before {
                return Err(Self::unresolvable(&deferred));
            }
            pending = deferred;
        }

        store.versions.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        store.rebuild_index();

        debug!("Loaded {} versions into store", store.len());
        Ok(store)
    }

    /// Classify why a set of versions could not be inserted
    fn unresolvable(deferred: &[Version]) -> RevmapError {
        let deferred_ids: HashSet<&str> = deferred.iter().map(|v| v.id.as_str()).collect();

        for version in deferred {
            for parent in version.parents() {
                if !deferred_ids.contains(parent) {
                    return RevmapError::MissingParent {
                        id: version.id.clone(),
                        parent_id: parent.to_string(),
                    };
                }
            }
        }

        RevmapError::CircularDependency
    }

    /// Create and append a new version
    ///
    /// # Errors
    ///
    /// - [`RevmapError::EmptyMessage`] if `message` is empty or whitespace
    /// - [`RevmapError::VersionNotFound`] if a given parent does not exist
    /// - [`RevmapError::Validation`] if both parents are the same version
    pub fn create(
        &mut self,
        data: Document,
        parent_id: Option<String>,
        message: impl Into<String>,
        author: impl Into<String>,
        merge_parent_id: Option<String>,
    ) -> Result<Version> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(RevmapError::EmptyMessage);
        }

        for parent in parent_id.iter().chain(merge_parent_id.iter()) {
            if !self.contains(parent) {
                return Err(RevmapError::VersionNotFound(parent.clone()));
            }
        }

        if parent_id.is_some() && parent_id == merge_parent_id {
            return Err(RevmapError::validation(
                "merge parent must differ from the primary parent",
            ));
        }

        let timestamp = self.next_timestamp();
        let version = Version::new(
            parent_id,
            merge_parent_id,
            data,
            message,
            author.into(),
            timestamp,
        );

        self.insert(version.clone())?;
        trace!("Created version {}", version.short_id());
        Ok(version)
    }

    /// Insert an existing version, keeping its id and timestamp
    ///
    /// Used when loading persisted state. Parents must already be present.
    pub fn insert(&mut self, version: Version) -> Result<()> {
        if self.contains(&version.id) {
            return Err(RevmapError::validation(format!(
                "version {} already exists",
                version.id
            )));
        }

        for parent in version.parents() {
            if !self.contains(parent) {
                return Err(RevmapError::MissingParent {
                    id: version.id.clone(),
                    parent_id: parent.to_string(),
                });
            }
        }

        if let Some(parent_id) = &version.parent_id {
            self.children
                .entry(parent_id.clone())
                .or_default()
                .push(version.id.clone());
        }
        if let Some(merge_parent_id) = &version.merge_parent_id {
            self.merge_children
                .entry(merge_parent_id.clone())
                .or_default()
                .push(version.id.clone());
        }

        if self.last_timestamp.map_or(true, |last| version.timestamp > last) {
            self.last_timestamp = Some(version.timestamp);
        }

        self.index.insert(version.id.clone(), self.versions.len());
        self.versions.push(version);
        Ok(())
    }

    /// Get a version by id
    pub fn get(&self, id: &str) -> Result<&Version> {
        self.find(id)
            .ok_or_else(|| RevmapError::VersionNotFound(id.to_string()))
    }

    /// Get a version by id, if present
    pub fn find(&self, id: &str) -> Option<&Version> {
        self.index.get(id).map(|&slot| &self.versions[slot])
    }

    /// Whether a version with this id exists
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Resolve a full id or a unique id prefix
    pub fn resolve_prefix(&self, prefix: &str) -> Result<&Version> {
        if let Some(version) = self.find(prefix) {
            return Ok(version);
        }
        if prefix.is_empty() {
            return Err(RevmapError::VersionNotFound(prefix.to_string()));
        }

        let mut matches = self.versions.iter().filter(|v| v.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(version), None) => Ok(version),
            (Some(_), Some(_)) => Err(RevmapError::validation(format!(
                "version prefix '{}' is ambiguous",
                prefix
            ))),
            _ => Err(RevmapError::VersionNotFound(prefix.to_string())),
        }
    }

    /// Primary-parent chain from the earliest ancestor to `id`, inclusive
    ///
    /// The merge-parent side of merge-commits is not followed; use
    /// [`SnapshotStore::reachable`] for complete history.
    ///
    /// # Errors
    ///
    /// - [`RevmapError::VersionNotFound`] if `id` does not exist
    /// - [`RevmapError::MissingParent`] if a parent link is dangling
    /// - [`RevmapError::CircularDependency`] if the walk exceeds the store size
    pub fn chain(&self, id: &str) -> Result<Vec<&Version>> {
        let mut current = self.get(id)?;
        let mut chain = vec![current];

        while let Some(parent_id) = current.parent_id.as_deref() {
            if chain.len() >= self.versions.len() {
                return Err(RevmapError::CircularDependency);
            }
            let parent = self.find(parent_id).ok_or_else(|| RevmapError::MissingParent {
                id: current.id.clone(),
                parent_id: parent_id.to_string(),
            })?;
            chain.push(parent);
            current = parent;
        }

        chain.reverse();
        Ok(chain)
    }

    /// All versions reachable from `id` through either parent, oldest first
    pub fn reachable(&self, id: &str) -> Result<Vec<&Version>> {
        let start = self.get(id)?;
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start]);
        let mut found = Vec::new();

        while let Some(version) = queue.pop_front() {
            if !seen.insert(version.id.as_str()) {
                continue;
            }
            found.push(version);

            for parent_id in version.parents() {
                let parent = self.find(parent_id).ok_or_else(|| RevmapError::MissingParent {
                    id: version.id.clone(),
                    parent_id: parent_id.to_string(),
                })?;
                queue.push_back(parent);
            }
        }

        found.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(found)
    }

    /// Remove a version irrevocably
    ///
    /// Only hard rollback deletes versions. Children of the removed version
    /// are not touched; callers delete whole suffixes of history.
    pub fn delete(&mut self, id: &str) -> Result<Version> {
        let slot = *self
            .index
            .get(id)
            .ok_or_else(|| RevmapError::VersionNotFound(id.to_string()))?;

        let removed = self.versions.remove(slot);
        self.rebuild_index();

        debug!("Deleted version {}", removed.short_id());
        Ok(removed)
    }

    /// Remove every version whose timestamp is strictly after `cutoff`
    ///
    /// Returns the removed versions in timestamp order.
    pub fn delete_newer_than(&mut self, cutoff: DateTime<Utc>) -> Vec<Version> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.versions)
            .into_iter()
            .partition(|v| v.timestamp > cutoff);

        self.versions = kept;
        self.rebuild_index();

        debug!("Deleted {} versions newer than {}", removed.len(), cutoff);
        removed
    }

    /// Rebuild lookup tables from the version list
    fn rebuild_index(&mut self) {
        self.index.clear();
        self.children.clear();
        self.merge_children.clear();

        for (slot, version) in self.versions.iter().enumerate() {
            self.index.insert(version.id.clone(), slot);
            if let Some(parent_id) = &version.parent_id {
                self.children
                    .entry(parent_id.clone())
                    .or_default()
                    .push(version.id.clone());
            }
            if let Some(merge_parent_id) = &version.merge_parent_id {
                self.merge_children
                    .entry(merge_parent_id.clone())
                    .or_default()
                    .push(version.id.clone());
            }
        }
    }

    /// Next creation timestamp, strictly after every known timestamp
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        }
    }

    /// All versions in timestamp order
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// Iterate over versions in timestamp order
    pub fn iter(&self) -> impl Iterator<Item = &Version> {
        self.versions.iter()
    }

    /// Number of versions in the store
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether the store holds no versions
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Direct children of a version through the primary parent link
    pub fn children(&self, id: &str) -> Vec<&Version> {
        self.children
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| self.find(c)).collect())
            .unwrap_or_default()
    }

    /// Every version that has `id` as an ancestor through either parent
    pub fn descendants(&self, id: &str) -> Vec<&Version> {
        let mut seen = HashSet::new();
        let mut descendants = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            let next = self
                .children
                .get(current)
                .into_iter()
                .chain(self.merge_children.get(current))
                .flatten();

            for child_id in next {
                if seen.insert(child_id.as_str()) {
                    if let Some(child) = self.find(child_id) {
                        descendants.push(child);
                    }
                    queue.push_back(child_id);
                }
            }
        }

        descendants.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        descendants
    }

    /// Get store statistics
    pub fn stats(&self) -> StoreStats {
        let mut depth: HashMap<&str, usize> = HashMap::with_capacity(self.versions.len());
        let mut max_depth = 0;

        // Parents always precede children in timestamp order
        for version in &self.versions {
            let d = version
                .parent_id
                .as_deref()
                .and_then(|p| depth.get(p))
                .map_or(1, |d| d + 1);
            max_depth = max_depth.max(d);
            depth.insert(version.id.as_str(), d);
        }

        StoreStats {
            total_versions: self.versions.len(),
            root_versions: self.versions.iter().filter(|v| v.is_root()).count(),
            leaf_versions: self
                .versions
                .iter()
                .filter(|v| !self.children.contains_key(&v.id) && !self.merge_children.contains_key(&v.id))
                .count(),
            merge_versions: self.versions.iter().filter(|v| v.is_merge()).count(),
            max_depth,
        }
    }

    /// Convert the primary-parent forest to tree nodes for display
    ///
    /// `labels` maps version ids to the names shown next to them (usually
    /// the branches pointing there).
    pub fn to_tree_nodes(&self, labels: &HashMap<String, Vec<String>>) -> Vec<VersionNode> {
        self.versions
            .iter()
            .filter(|v| v.is_root())
            .filter_map(|root| self.build_tree_node(root, labels))
            .collect()
    }

    /// Build a tree node and its subtree
    ///
    /// Iterative post-order walk, so history depth is bounded by memory
    /// rather than by the call stack.
    fn build_tree_node<'a>(
        &'a self,
        root: &'a Version,
        labels: &HashMap<String, Vec<String>>,
    ) -> Option<VersionNode> {
        struct Frame<'a> {
            version: &'a Version,
            pending: Vec<&'a Version>,
            built: Vec<VersionNode>,
        }

        let frame = |version: &'a Version| {
            let mut pending = self.children(&version.id);
            pending.reverse();
            Frame {
                version,
                pending,
                built: Vec::new(),
            }
        };

        let mut stack = vec![frame(root)];
        while let Some(top) = stack.last_mut() {
            if let Some(child) = top.pending.pop() {
                stack.push(frame(child));
                continue;
            }

            let done = stack.pop()?;
            let node = VersionNode {
                version: done.version.clone(),
                children: done.built,
                labels: labels.get(&done.version.id).cloned().unwrap_or_default(),
            };
            match stack.last_mut() {
                Some(parent) => parent.built.push(node),
                None => return Some(node),
            }
        }
        None
    }
}

/// Node in the version tree for visualization
#[derive(Debug)]
pub struct VersionNode {
    /// The version at this node
    pub version: Version,
    /// Children through the primary parent link
    pub children: Vec<VersionNode>,
    /// Branch names pointing at this version
    pub labels: Vec<String>,
}

impl VersionNode {
    /// Format the tree for display
    ///
    /// A version with a single child continues at the same indentation, so
    /// a linear history renders as a flat list. Forks indent their children.
    pub fn format_tree(&self, prefix: &str, is_last: bool) -> String {
        let mut result = String::new();
        let mut stack: Vec<(&VersionNode, String, bool)> = vec![(self, prefix.to_string(), is_last)];

        while let Some((node, prefix, is_last)) = stack.pop() {
            let connector = if is_last { "└── " } else { "├── " };
            result.push_str(&prefix);
            result.push_str(connector);
            result.push_str(&node.version.display_format());
            if !node.labels.is_empty() {
                result.push_str(&format!(" ({})", node.labels.join(", ")));
            }
            result.push('\n');

            if let [only] = node.children.as_slice() {
                stack.push((only, prefix, is_last));
                continue;
            }

            let extension = if is_last { "    " } else { "│   " };
            let child_prefix = format!("{}{}", prefix, extension);
            let count = node.children.len();
            for (i, child) in node.children.iter().enumerate().rev() {
                stack.push((child, child_prefix.clone(), i == count - 1));
            }
        }

        result
    }
}

impl Drop for VersionNode {
    fn drop(&mut self) {
        // Unlink children one level at a time so deep trees drop without recursion
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

/// Store statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Total number of versions
    pub total_versions: usize,
    /// Versions without a primary parent
    pub root_versions: usize,
    /// Versions nothing builds on
    pub leaf_versions: usize,
    /// Versions with a merge parent
    pub merge_versions: usize,
    /// Longest primary-parent chain
    pub max_depth: usize,
}
