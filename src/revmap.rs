//! Repository session
//!
//! A [`Revmap`] owns one working copy: the version store, the branch table,
//! the active branch, the uncommitted working data and the backend they are
//! persisted to. There is no process-wide state; two sessions are two
//! independent working copies, even when they share a backend.
//!
//! ## State changes
//!
//! Every mutating operation builds the new store and branch table on copies,
//! saves them through the backend, and only then swaps them into the
//! session. A validation failure, a rejecting `pre_commit` hook or a failed
//! save leaves the session exactly as it was.
//!
//! Post-operation hooks run after the new state is persisted. An error from
//! one of them is returned to the caller, but the operation stays applied.
//!
//! ## Examples
//!
//! ```rust
//! use revmap::Revmap;
//! use serde_json::json;
//!
//! let mut repo = Revmap::in_memory()?;
//!
//! repo.set("title", json!("Draft"));
//! let first = repo.commit_working("Initial draft", Some("alice"))?;
//!
//! repo.create_branch("review", None)?;
//! repo.set("title", json!("Reviewed"));
//! repo.commit_working("Review pass", Some("bob"))?;
//!
//! repo.switch_branch("main")?;
//! let result = repo.merge("review", "main")?;
//! assert!(result.success);
//!
//! let source_head = result.context.as_ref().map(|c| c.source_version_id.clone()).unwrap();
//! let merged = repo.complete_merge(result.merged_data, "review", &source_head, "Merge review")?;
//! assert_eq!(merged.parent_id.as_deref(), Some(first.id.as_str()));
//! assert_eq!(repo.working_data()["title"], json!("Reviewed"));
//! # Ok::<(), revmap::RevmapError>(())
//! ```

use crate::ancestor::common_ancestor;
use crate::backend::{Backend, BranchMap, FileBackend, MemoryBackend};
use crate::branch::{Branch, BranchRegistry, MAIN_BRANCH};
use crate::compression::CompressionStrategy;
use crate::diff::{diff, DiffResult};
use crate::error::{Result, RevmapError};
use crate::merge::{merge, MergeContext, MergeResult};
use crate::store::{SnapshotStore, StoreStats};
use crate::types::{RepositoryStatus, RevmapConfig, RevmapHook, RollbackResult};
use crate::verification::{VerificationReport, Verifier};
use crate::version::{short_id, Document, Version};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, error, info, instrument, warn};

/// One collection write of a mutating operation
enum Write<'a> {
    Versions(&'a [Version]),
    Branches(&'a BranchMap),
    ActiveBranch(&'a str),
}

impl Write<'_> {
    fn name(&self) -> &'static str {
        match self {
            Write::Versions(_) => "versions",
            Write::Branches(_) => "branches",
            Write::ActiveBranch(_) => "active branch",
        }
    }
}

/// A versioned key/value document with branches
pub struct Revmap {
    /// Persistence backend
    backend: Box<dyn Backend>,
    /// Every stored version
    store: SnapshotStore,
    /// Branch table and active branch
    branches: BranchRegistry,
    /// Uncommitted document
    working: Document,
    /// Configuration
    config: RevmapConfig,
    /// Operation hooks
    hooks: Vec<Box<dyn RevmapHook>>,
}

impl std::fmt::Debug for Revmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Revmap")
            .field("backend", &self.backend)
            .field("versions", &self.store.len())
            .field("active_branch", &self.branches.active_name())
            .field("working_keys", &self.working.len())
            .field("config", &self.config)
            .field("hooks", &format!("<{} hooks>", self.hooks.len()))
            .finish()
    }
}

impl Revmap {
    /// Create a new repository in a storage directory
    ///
    /// # Errors
    ///
    /// - [`RevmapError::StorageAlreadyExists`] if the directory already holds a repository
    /// - [`RevmapError::Io`] if the directory cannot be written
    #[instrument(skip(storage_path))]
    pub fn init(storage_path: impl Into<PathBuf>) -> Result<Self> {
        RevmapBuilder::new().init(storage_path)
    }

    /// Open an existing repository
    ///
    /// # Errors
    ///
    /// - [`RevmapError::StorageNotInitialized`] if there is no repository at the path
    /// - integrity errors if the stored history is corrupted
    #[instrument(skip(storage_path))]
    pub fn open(storage_path: impl Into<PathBuf>) -> Result<Self> {
        let backend = FileBackend::open(storage_path)?;
        let config = backend.config();
        Self::load(Box::new(backend), config, Vec::new())
    }

    /// Create a repository backed by a fresh [`MemoryBackend`]
    pub fn in_memory() -> Result<Self> {
        RevmapBuilder::new().build_in_memory()
    }

    /// Open a session over any backend
    pub fn with_backend(backend: Box<dyn Backend>, config: RevmapConfig) -> Result<Self> {
        Self::load(backend, config, Vec::new())
    }

    /// Load and validate persisted state
    fn load(
        backend: Box<dyn Backend>,
        config: RevmapConfig,
        hooks: Vec<Box<dyn RevmapHook>>,
    ) -> Result<Self> {
        let store = SnapshotStore::from_versions(backend.load_versions()?)?;
        let branch_map = backend.load_branches()?;
        let active = backend.load_active_branch()?;

        let branches = if branch_map.is_empty() && active.is_none() {
            if !store.is_empty() {
                return Err(RevmapError::integrity(
                    "versions are stored but the branch table is empty",
                ));
            }
            let registry = BranchRegistry::new();
            backend.save_branches(registry.as_map())?;
            backend.save_active_branch(registry.active_name())?;
            info!("Created branch {}", MAIN_BRANCH);
            registry
        } else {
            let active = active.unwrap_or_else(|| MAIN_BRANCH.to_string());
            BranchRegistry::from_parts(branch_map, active)?
        };

        for branch in branches.list() {
            if let Some(head) = &branch.head {
                if !store.contains(head) {
                    return Err(RevmapError::integrity(format!(
                        "branch '{}' points at missing version {}",
                        branch.name, head
                    )));
                }
            }
        }

        let working = match branches.active().head {
            Some(head) => store.get(&head)?.data.clone(),
            None => Document::new(),
        };

        debug!(
            "Loaded {} versions and {} branches, active branch {}",
            store.len(),
            branches.list().len(),
            branches.active_name()
        );

        Ok(Self {
            backend,
            store,
            branches,
            working,
            config,
            hooks,
        })
    }

    /// Add an operation hook
    pub fn add_hook(&mut self, hook: Box<dyn RevmapHook>) {
        self.hooks.push(hook);
    }

    /// Repository configuration
    pub fn config(&self) -> &RevmapConfig {
        &self.config
    }

    // ---- Working data ----

    /// The uncommitted document
    pub fn working_data(&self) -> &Document {
        &self.working
    }

    /// Replace the whole uncommitted document
    pub fn set_working_data(&mut self, data: Document) {
        self.working = data;
    }

    /// Set one field of the uncommitted document
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.working.insert(key.into(), value)
    }

    /// Remove one field of the uncommitted document
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.working.remove(key)
    }

    /// Whether the working data differs from the active branch head
    pub fn has_uncommitted_changes(&self) -> bool {
        match self.head_version() {
            Some(head) => head.data != self.working,
            None => !self.working.is_empty(),
        }
    }

    /// Diff from the active branch head to the working data
    pub fn pending_changes(&self) -> DiffResult {
        let empty = Document::new();
        let head_data = self.head_version().map_or(&empty, |v| &v.data);
        diff(head_data, &self.working)
    }

    // ---- Commits ----

    /// Commit a document onto the active branch
    ///
    /// `author` falls back to the configured default author.
    ///
    /// # Errors
    ///
    /// - [`RevmapError::EmptyMessage`] if `message` is blank
    /// - [`RevmapError::NothingToCommit`] if `data` equals the branch head
    ///   (or is empty on a branch without commits)
    /// - any error returned by a `pre_commit` hook
    #[instrument(skip(self, data))]
    pub fn commit(&mut self, data: Document, message: &str, author: Option<&str>) -> Result<Version> {
        if message.trim().is_empty() {
            return Err(RevmapError::EmptyMessage);
        }

        let branch = self.branches.active();
        let empty = Document::new();
        let head_data = match &branch.head {
            Some(head) => &self.store.get(head)?.data,
            None => &empty,
        };

        let mut changes = diff(head_data, &data);
        if !changes.has_changes() {
            return Err(RevmapError::NothingToCommit(branch.name));
        }
        changes.from_id = branch.head.clone();

        for hook in &self.hooks {
            hook.pre_commit(&changes)?;
        }

        let author = author.unwrap_or(self.config.default_author.as_str()).to_string();
        let mut store = self.store.clone();
        let version = store.create(data, branch.head.clone(), message, author, None)?;

        let mut branches = self.branches.clone();
        branches.set_head(&branch.name, Some(version.id.clone()))?;

        self.persist(&[
            Write::Versions(store.versions()),
            Write::Branches(branches.as_map()),
        ])?;

        self.store = store;
        self.branches = branches;
        self.working = version.data.clone();

        info!(
            "Committed {} on {} ({} changes)",
            version.short_id(),
            branch.name,
            changes.stats().total_changes()
        );

        for hook in &self.hooks {
            hook.post_commit(&version)?;
        }

        Ok(version)
    }

    /// Commit the current working data
    pub fn commit_working(&mut self, message: &str, author: Option<&str>) -> Result<Version> {
        self.commit(self.working.clone(), message, author)
    }

    // ---- Branches ----

    /// Create a branch and switch to it
    ///
    /// The branch starts at `from` (a version id or unique prefix) or, when
    /// omitted, at the active branch head. Working data is reset to that
    /// version.
    ///
    /// # Errors
    ///
    /// - [`RevmapError::InvalidBranchName`] or [`RevmapError::BranchExists`]
    /// - [`RevmapError::VersionNotFound`] if `from` does not resolve
    /// - [`RevmapError::Validation`] if `from` is omitted and the active branch has no commits
    #[instrument(skip(self))]
    pub fn create_branch(&mut self, name: &str, from: Option<&str>) -> Result<Branch> {
        let start = match from {
            Some(id) => self.store.resolve_prefix(id)?,
            None => {
                let active = self.branches.active();
                let head = active.head.ok_or_else(|| {
                    RevmapError::validation(format!(
                        "branch '{}' has no commits to branch from",
                        active.name
                    ))
                })?;
                self.store.get(&head)?
            }
        };
        let start_id = start.id.clone();
        let start_data = start.data.clone();

        let mut branches = self.branches.clone();
        let branch = branches.create(name, Some(start_id))?;
        branches.switch(name)?;

        self.persist(&[
            Write::Branches(branches.as_map()),
            Write::ActiveBranch(name),
        ])?;

        self.branches = branches;
        self.working = start_data;

        info!("Created branch {} at {:?}", name, branch.head);
        Ok(branch)
    }

    /// Switch the active branch
    ///
    /// Working data is replaced by the branch head's data (empty if the
    /// branch has no commits). Uncommitted changes are discarded.
    #[instrument(skip(self))]
    pub fn switch_branch(&mut self, name: &str) -> Result<Branch> {
        let mut branches = self.branches.clone();
        let branch = branches.switch(name)?;

        let working = match &branch.head {
            Some(head) => self.store.get(head)?.data.clone(),
            None => Document::new(),
        };

        self.backend.save_active_branch(name)?;

        self.branches = branches;
        self.working = working;

        info!("Switched to branch {}", name);
        Ok(branch)
    }

    /// Delete a branch
    ///
    /// Versions are kept; only the pointer goes away.
    #[instrument(skip(self))]
    pub fn delete_branch(&mut self, name: &str) -> Result<Branch> {
        let mut branches = self.branches.clone();
        let removed = branches.delete(name)?;

        self.backend.save_branches(branches.as_map())?;
        self.branches = branches;

        info!("Deleted branch {}", name);
        Ok(removed)
    }

    /// The active branch
    pub fn active_branch(&self) -> Branch {
        self.branches.active()
    }

    /// All branches sorted by name
    pub fn branches(&self) -> Vec<Branch> {
        self.branches.list()
    }

    /// Look up a branch
    pub fn branch(&self, name: &str) -> Result<Branch> {
        self.branches.get(name)
    }

    /// Head id of a branch
    pub fn head_of(&self, name: &str) -> Result<Option<String>> {
        Ok(self.branches.head(name)?.map(str::to_string))
    }

    /// Head version of the active branch
    pub fn head_version(&self) -> Option<&Version> {
        self.branches
            .head(self.branches.active_name())
            .ok()
            .flatten()
            .and_then(|id| self.store.find(id))
    }

    // ---- Diff and merge ----

    /// Diff two versions given by id or unique prefix
    pub fn diff(&self, from: &str, to: &str) -> Result<DiffResult> {
        let from = self.store.resolve_prefix(from)?;
        let to = self.store.resolve_prefix(to)?;
        Ok(diff(&from.data, &to.data).with_ids(from.id.as_str(), to.id.as_str()))
    }

    /// Compute the merge of `source` into `target` without committing it
    ///
    /// Side A of the result is the source branch, side B the target branch,
    /// and the base is their common ancestor (empty if histories are
    /// disjoint or the target has no commits).
    ///
    /// # Errors
    ///
    /// - [`RevmapError::BranchNotFound`] for an unknown branch
    /// - [`RevmapError::Validation`] when merging a branch into itself or
    ///   when the source has no commits
    #[instrument(skip(self))]
    pub fn merge(&self, source: &str, target: &str) -> Result<MergeResult> {
        if source == target {
            return Err(RevmapError::validation(format!(
                "cannot merge branch '{}' into itself",
                source
            )));
        }

        let source_head = self.branches.head(source)?.ok_or_else(|| {
            RevmapError::validation(format!("branch '{}' has no commits to merge", source))
        })?;
        let target_head = self.branches.head(target)?;

        let source_version = self.store.get(source_head)?;
        let empty = Document::new();
        let (target_data, base) = match target_head {
            Some(head) => (
                &self.store.get(head)?.data,
                common_ancestor(source_head, head, &self.store)?,
            ),
            None => (&empty, None),
        };

        let mut result = merge(base.map(|b| &b.data), &source_version.data, target_data);
        result.context = Some(MergeContext {
            source_branch: source.to_string(),
            target_branch: target.to_string(),
            source_version_id: source_head.to_string(),
            target_version_id: target_head.map(str::to_string),
            base_version_id: base.map(|b| b.id.clone()),
        });

        info!(
            "Merge {} into {}: {} conflicts",
            source,
            target,
            result.conflicts.len()
        );
        Ok(result)
    }

    /// Record a merge-commit on the active branch
    ///
    /// The new version's primary parent is the active branch head and its
    /// merge parent is `source_version_id`. Working data becomes
    /// `merged_data`.
    ///
    /// # Errors
    ///
    /// - [`RevmapError::BranchNotFound`] if `source_branch` does not exist
    /// - [`RevmapError::Validation`] if `source_branch` is the active branch or
    ///   the source version is already the active head
    /// - [`RevmapError::VersionNotFound`] if `source_version_id` does not resolve
    #[instrument(skip(self, merged_data))]
    pub fn complete_merge(
        &mut self,
        merged_data: Document,
        source_branch: &str,
        source_version_id: &str,
        message: &str,
    ) -> Result<Version> {
        self.branches.get(source_branch)?;
        let target = self.branches.active();
        if target.name == source_branch {
            return Err(RevmapError::validation(format!(
                "cannot merge branch '{}' into itself",
                source_branch
            )));
        }

        let source_id = self.store.resolve_prefix(source_version_id)?.id.clone();

        let mut store = self.store.clone();
        let version = store.create(
            merged_data,
            target.head.clone(),
            message,
            self.config.default_author.clone(),
            Some(source_id),
        )?;

        let mut branches = self.branches.clone();
        branches.set_head(&target.name, Some(version.id.clone()))?;

        self.persist(&[
            Write::Versions(store.versions()),
            Write::Branches(branches.as_map()),
        ])?;

        self.store = store;
        self.branches = branches;
        self.working = version.data.clone();

        info!(
            "Merged {} into {} as {}",
            source_branch,
            target.name,
            version.short_id()
        );

        for hook in &self.hooks {
            hook.post_merge(&version)?;
        }

        Ok(version)
    }

    // ---- Rollback ----

    /// Non-destructive rollback: branch off at `target` and switch to it
    #[instrument(skip(self))]
    pub fn soft_rollback(&mut self, target: &str, new_branch: &str) -> Result<Branch> {
        self.create_branch(new_branch, Some(target))
    }

    /// Destructive rollback to `target`
    ///
    /// Deletes every version created after `target` (by timestamp, across
    /// all branches), points the active branch at `target` and resets the
    /// working data. Other branches whose heads were deleted move to their
    /// nearest surviving ancestor, or lose their head if none survives.
    ///
    /// This cannot be undone.
    #[instrument(skip(self))]
    pub fn hard_rollback(&mut self, target: &str) -> Result<RollbackResult> {
        let target = self.store.resolve_prefix(target)?;
        let target_id = target.id.clone();
        let cutoff = target.timestamp;
        let target_data = target.data.clone();

        let mut store = self.store.clone();
        let deleted = store.delete_newer_than(cutoff);
        let deleted_by_id: HashMap<&str, &Version> =
            deleted.iter().map(|v| (v.id.as_str(), v)).collect();

        let active = self.branches.active_name().to_string();
        let mut branches = self.branches.clone();
        branches.set_head(&active, Some(target_id.clone()))?;

        let mut repointed = Vec::new();
        for branch in self.branches.list() {
            if branch.name == active {
                continue;
            }
            let Some(head) = branch.head.as_deref() else {
                continue;
            };
            if !deleted_by_id.contains_key(head) {
                continue;
            }

            let new_head = Self::surviving_ancestor(head, &deleted_by_id);
            warn!(
                "Branch {} head {} was deleted by rollback, moving to {:?}",
                branch.name, head, new_head
            );
            branches.set_head(&branch.name, new_head.clone())?;
            repointed.push((branch.name, new_head));
        }

        // Branches first: they only ever point at versions both lists contain
        self.persist(&[
            Write::Branches(branches.as_map()),
            Write::Versions(store.versions()),
        ])?;

        let result = RollbackResult {
            target_id,
            branch: active,
            deleted_ids: deleted.iter().map(|v| v.id.clone()).collect(),
            repointed_branches: repointed,
        };

        self.store = store;
        self.branches = branches;
        self.working = target_data;

        info!(
            "Hard rollback of {} to {}: deleted {} versions",
            result.branch,
            short_id(&result.target_id),
            result.deleted_ids.len()
        );

        for hook in &self.hooks {
            hook.post_rollback(&result)?;
        }

        Ok(result)
    }

    /// Walk primary parents through deleted versions to the first survivor
    fn surviving_ancestor(start: &str, deleted: &HashMap<&str, &Version>) -> Option<String> {
        let mut seen = HashSet::new();
        let mut current = start;
        while let Some(version) = deleted.get(current) {
            if !seen.insert(current) {
                return None;
            }
            current = version.parent_id.as_deref()?;
        }
        Some(current.to_string())
    }

    /// Save collections in order
    ///
    /// If a save fails, the collections already written are saved again from
    /// the unchanged session state, so storage never holds half an operation.
    fn persist(&self, writes: &[Write<'_>]) -> Result<()> {
        for (done, write) in writes.iter().enumerate() {
            if let Err(err) = self.save(write) {
                for written in writes[..done].iter().rev() {
                    if let Err(restore_err) = self.restore(written) {
                        error!(
                            "Failed to restore {} after a failed save: {}",
                            written.name(),
                            restore_err
                        );
                    }
                }
                debug!("Save of {} failed: {}", write.name(), err);
                return Err(err);
            }
        }
        Ok(())
    }

    fn save(&self, write: &Write<'_>) -> Result<()> {
        match write {
            Write::Versions(versions) => self.backend.save_versions(versions),
            Write::Branches(branches) => self.backend.save_branches(branches),
            Write::ActiveBranch(name) => self.backend.save_active_branch(name),
        }
    }

    /// Write back the session's current copy of a collection
    fn restore(&self, write: &Write<'_>) -> Result<()> {
        match write {
            Write::Versions(_) => self.backend.save_versions(self.store.versions()),
            Write::Branches(_) => self.backend.save_branches(self.branches.as_map()),
            Write::ActiveBranch(_) => self
                .backend
                .save_active_branch(self.branches.active_name()),
        }
    }

    // ---- History ----

    /// Resolve a version id or unique prefix
    pub fn get_version(&self, id: &str) -> Result<&Version> {
        self.store.resolve_prefix(id)
    }

    /// Primary-parent chain of a branch head, oldest first
    pub fn history(&self, branch: &str) -> Result<Vec<&Version>> {
        match self.branches.head(branch)? {
            Some(head) => self.store.chain(head),
            None => Ok(Vec::new()),
        }
    }

    /// Every version reachable from `version_id` through either parent,
    /// oldest first
    pub fn full_history(&self, version_id: &str) -> Result<Vec<&Version>> {
        let id = self.store.resolve_prefix(version_id)?.id.clone();
        self.store.reachable(&id)
    }

    /// Every stored version in timestamp order
    pub fn list_versions(&self) -> &[Version] {
        self.store.versions()
    }

    /// Render the primary-parent forest with branch labels
    pub fn timeline_tree(&self) -> String {
        let nodes = self.store.to_tree_nodes(&self.branches.labels());
        let mut out = String::new();
        for (i, node) in nodes.iter().enumerate() {
            out.push_str(&node.format_tree("", i == nodes.len() - 1));
        }
        out
    }

    /// Store statistics
    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Summary of the session state
    pub fn status(&self) -> RepositoryStatus {
        let active = self.branches.active();
        RepositoryStatus {
            branch: active.name,
            head: active.head,
            pending: self.pending_changes().stats(),
            branch_count: self.branches.list().len(),
            version_count: self.store.len(),
        }
    }

    /// Check the integrity of the in-memory history
    pub fn verify(&self) -> VerificationReport {
        Verifier::new(
            self.store.versions(),
            self.branches.as_map(),
            Some(self.branches.active_name()),
        )
        .verify()
    }
}

/// Builder for configuring a [`Revmap`] session
///
/// # Default Values
///
/// - `default_author`: `user@host` of the current process
/// - `compression_strategy`: `CompressionStrategy::Fast`
///
/// # Examples
///
/// ```rust
/// use revmap::{CompressionStrategy, RevmapBuilder};
///
/// let repo = RevmapBuilder::new()
///     .default_author("ci@build")
///     .compression_strategy(CompressionStrategy::None)
///     .build_in_memory()?;
/// assert_eq!(repo.config().default_author, "ci@build");
/// # Ok::<(), revmap::RevmapError>(())
/// ```
pub struct RevmapBuilder {
    config: RevmapConfig,
    hooks: Vec<Box<dyn RevmapHook>>,
}

impl std::fmt::Debug for RevmapBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevmapBuilder")
            .field("config", &self.config)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl RevmapBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: RevmapConfig::default(),
            hooks: Vec::new(),
        }
    }

    /// Set the author recorded when a commit names none
    pub fn default_author(mut self, author: impl Into<String>) -> Self {
        self.config.default_author = author.into();
        self
    }

    /// Set the compression strategy for the version list on disk
    pub fn compression_strategy(mut self, strategy: CompressionStrategy) -> Self {
        self.config.compression_strategy = strategy;
        self
    }

    /// Register a hook
    pub fn hook(mut self, hook: Box<dyn RevmapHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Create a new repository at `storage_path`
    pub fn init(self, storage_path: impl Into<PathBuf>) -> Result<Revmap> {
        let backend = FileBackend::init(storage_path, self.config.clone())?;
        Revmap::load(Box::new(backend), self.config, self.hooks)
    }

    /// Open the repository at `storage_path`, creating it if needed
    ///
    /// An existing repository keeps its stored configuration.
    pub fn build(self, storage_path: impl Into<PathBuf>) -> Result<Revmap> {
        let backend = FileBackend::init_or_open(storage_path, self.config)?;
        let config = backend.config();
        Revmap::load(Box::new(backend), config, self.hooks)
    }

    /// Build a session over a fresh in-memory backend
    pub fn build_in_memory(self) -> Result<Revmap> {
        self.build_with_backend(Box::new(MemoryBackend::new()))
    }

    /// Build a session over the given backend
    pub fn build_with_backend(self, backend: Box<dyn Backend>) -> Result<Revmap> {
        Revmap::load(backend, self.config, self.hooks)
    }
}

impl Default for RevmapBuilder {
    fn default() -> Self {
        Self::new()
    }
}
