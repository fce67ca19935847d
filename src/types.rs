//! Core data types used throughout the revmap library
//!
//! ## Overview
//!
//! - **Operation results**: [`DiffStats`], [`RollbackResult`], [`RepositoryStatus`]
//! - **Configuration**: [`RevmapConfig`], persisted as part of [`StorageMetadata`]
//! - **Hooks**: [`RevmapHook`] extensibility points, with [`NoOpHook`]
//!
//! ## Examples
//!
//! ```rust
//! use revmap::types::RevmapConfig;
//! use revmap::compression::CompressionStrategy;
//!
//! let config = RevmapConfig {
//!     default_author: "alice@example".to_string(),
//!     compression_strategy: CompressionStrategy::None,
//!     ..Default::default()
//! };
//! assert_eq!(config.compression_strategy.name(), "none");
//! ```

use crate::compression::CompressionStrategy;
use crate::diff::DiffResult;
use crate::error::Result;
use crate::version::{default_author, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts of each diff bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    /// Keys only in the newer document
    pub keys_added: usize,
    /// Keys only in the older document
    pub keys_removed: usize,
    /// Keys whose value changed
    pub keys_modified: usize,
    /// Keys present in both with equal values
    pub keys_unchanged: usize,
}

impl DiffStats {
    /// Number of keys that changed in any way
    pub fn total_changes(&self) -> usize {
        self.keys_added + self.keys_removed + self.keys_modified
    }
}

/// Result of a hard rollback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackResult {
    /// Version the active branch now points at
    pub target_id: String,
    /// Branch that was moved to the target
    pub branch: String,
    /// Versions removed from the store, oldest first
    pub deleted_ids: Vec<String>,
    /// Other branches whose heads were deleted: (name, new head)
    pub repointed_branches: Vec<(String, Option<String>)>,
}

/// Snapshot of the session for status displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryStatus {
    /// Active branch name
    pub branch: String,
    /// Head of the active branch
    pub head: Option<String>,
    /// Changes in the working data relative to the head
    pub pending: DiffStats,
    /// Number of branches
    pub branch_count: usize,
    /// Number of stored versions
    pub version_count: usize,
}

impl RepositoryStatus {
    /// Whether the working data differs from the head
    pub fn is_dirty(&self) -> bool {
        self.pending.total_changes() > 0
    }
}

/// Configuration for a revmap repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevmapConfig {
    /// Author recorded when a commit does not name one
    pub default_author: String,
    /// How the version list is compressed on disk
    #[serde(default)]
    pub compression_strategy: CompressionStrategy,
    /// Crate version that wrote this config
    pub version: String,
}

impl Default for RevmapConfig {
    fn default() -> Self {
        Self {
            default_author: default_author(),
            compression_strategy: CompressionStrategy::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Metadata stored with the file backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMetadata {
    /// Version of storage format
    pub format_version: u32,
    /// Crate version that created the storage
    pub revmap_version: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last accessed timestamp
    pub last_accessed: DateTime<Utc>,
    /// Configuration
    pub config: RevmapConfig,
}

/// Hook for custom behavior around repository operations
///
/// # Examples
///
/// ```rust
/// use revmap::types::{RevmapHook, RollbackResult};
/// use revmap::diff::DiffResult;
/// use revmap::version::Version;
/// use revmap::{Result, RevmapError};
///
/// struct RequireTitle;
///
/// impl RevmapHook for RequireTitle {
///     fn pre_commit(&self, changes: &DiffResult) -> Result<()> {
///         if changes.removed.contains_key("title") {
///             return Err(RevmapError::HookExecution("title is required".to_string()));
///         }
///         Ok(())
///     }
///
///     fn post_commit(&self, version: &Version) -> Result<()> {
///         println!("Committed {}", version.short_id());
///         Ok(())
///     }
///
///     fn post_merge(&self, _version: &Version) -> Result<()> {
///         Ok(())
///     }
///
///     fn post_rollback(&self, result: &RollbackResult) -> Result<()> {
///         println!("Deleted {} versions", result.deleted_ids.len());
///         Ok(())
///     }
/// }
/// ```
pub trait RevmapHook: Send + Sync {
    /// Called before a commit is written
    ///
    /// Returning an error cancels the commit.
    ///
    /// # Arguments
    ///
    /// * `changes` - Diff from the branch head to the data being committed
    fn pre_commit(&self, changes: &DiffResult) -> Result<()>;

    /// Called after a commit is persisted
    fn post_commit(&self, version: &Version) -> Result<()>;

    /// Called after a merge-commit is persisted
    fn post_merge(&self, version: &Version) -> Result<()>;

    /// Called after a hard rollback is persisted
    fn post_rollback(&self, result: &RollbackResult) -> Result<()>;
}

/// Default implementation of RevmapHook that does nothing
#[derive(Debug)]
pub struct NoOpHook;

impl RevmapHook for NoOpHook {
    fn pre_commit(&self, _changes: &DiffResult) -> Result<()> {
        Ok(())
    }

    fn post_commit(&self, _version: &Version) -> Result<()> {
        Ok(())
    }

    fn post_merge(&self, _version: &Version) -> Result<()> {
        Ok(())
    }

    fn post_rollback(&self, _result: &RollbackResult) -> Result<()> {
        Ok(())
    }
}
