//! Error types for the revmap library
//!
//! Every fallible operation returns [`Result<T>`] with a [`RevmapError`].
//! Variants fall into a few categories that callers route differently:
//!
//! - **Validation**: the request itself is wrong (empty commit message,
//!   malformed or duplicate branch name, deleting `main`, unresolved merge
//!   conflicts). Surface to the user, never retry.
//! - **Not found**: an unknown branch or version id.
//! - **Integrity**: the stored history is corrupted (cycle, missing parent,
//!   dangling branch head). Fatal for the operation in progress.
//! - **Infrastructure**: I/O, serialization, compression and backend errors.
//!
//! A merge with conflicts is not an error; see [`crate::MergeResult`].

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the revmap library
pub type Result<T> = std::result::Result<T, RevmapError>;

/// Main error type for all revmap operations
#[derive(Debug, Error)]
pub enum RevmapError {
    /// I/O errors from a persistence backend
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic validation failure
    #[error("Validation error: {0}")]
    Validation(String),

    /// Commit message is empty or whitespace only
    #[error("Commit message must not be empty")]
    EmptyMessage,

    /// Working data does not differ from the branch head
    #[error("Nothing to commit on branch '{0}'")]
    NothingToCommit(String),

    /// Branch name does not match `[A-Za-z][A-Za-z0-9_-]*`
    #[error("Invalid branch name '{0}': must start with a letter and contain only letters, digits, '_' or '-'")]
    InvalidBranchName(String),

    /// A branch with this name already exists
    #[error("Branch '{0}' already exists")]
    BranchExists(String),

    /// Branch cannot be deleted (main or currently active)
    #[error("Branch '{name}' cannot be deleted: {reason}")]
    ProtectedBranch {
        /// Branch name
        name: String,
        /// Why the branch is protected
        reason: String,
    },

    /// Merge resolutions leave conflicts open
    #[error("Unresolved merge conflicts on keys: {}", .0.join(", "))]
    UnresolvedConflicts(Vec<String>),

    /// Version not found in the store
    #[error("Version not found: {0}")]
    VersionNotFound(String),

    /// Branch not found in the registry
    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    /// Cycle detected while walking parent links
    #[error("Circular dependency detected in version history")]
    CircularDependency,

    /// A stored version references a parent that does not exist
    #[error("Version {id} references missing parent {parent_id}")]
    MissingParent {
        /// Version holding the reference
        id: String,
        /// Parent id that could not be resolved
        parent_id: String,
    },

    /// Other integrity violations in persisted state
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Backend-specific storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Storage is not initialized
    #[error("Storage not initialized at path: {0:?}")]
    StorageNotInitialized(PathBuf),

    /// Storage already exists
    #[error("Storage already exists at path: {0:?}")]
    StorageAlreadyExists(PathBuf),

    /// Compression errors
    #[error("Compression error: {0}")]
    Compression(String),

    /// Decompression errors
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Hook execution error
    #[error("Hook execution error: {0}")]
    HookExecution(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RevmapError {
    /// Create a validation error with a custom message
    pub fn validation(msg: impl Into<String>) -> Self {
        RevmapError::Validation(msg.into())
    }

    /// Create a storage error with a custom message
    pub fn storage(msg: impl Into<String>) -> Self {
        RevmapError::Storage(msg.into())
    }

    /// Create an integrity error with a custom message
    pub fn integrity(msg: impl Into<String>) -> Self {
        RevmapError::Integrity(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        RevmapError::Internal(msg.into())
    }

    /// Check if this error rejects the caller's request
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RevmapError::Validation(_)
                | RevmapError::EmptyMessage
                | RevmapError::NothingToCommit(_)
                | RevmapError::InvalidBranchName(_)
                | RevmapError::BranchExists(_)
                | RevmapError::ProtectedBranch { .. }
                | RevmapError::UnresolvedConflicts(_)
        )
    }

    /// Check if this error names something that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RevmapError::VersionNotFound(_) | RevmapError::BranchNotFound(_)
        )
    }

    /// Check if this error indicates corrupted history
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            RevmapError::CircularDependency
                | RevmapError::MissingParent { .. }
                | RevmapError::Integrity(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            RevmapError::VersionNotFound(id) => {
                format!("Version '{}' not found. Use 'revmap log' to see available versions.", id)
            }
            RevmapError::BranchNotFound(name) => {
                format!("Branch '{}' not found. Use 'revmap branch list' to see branches.", name)
            }
            RevmapError::NothingToCommit(branch) => {
                format!("Nothing to commit: working data matches the head of '{}'.", branch)
            }
            RevmapError::UnresolvedConflicts(keys) => {
                format!(
                    "Merge still has {} unresolved conflict(s): {}. Pass a resolution for each key.",
                    keys.len(),
                    keys.join(", ")
                )
            }
            RevmapError::StorageNotInitialized(path) => {
                format!("Storage not initialized at {:?}. Run 'revmap init' first.", path)
            }
            _ => self.to_string(),
        }
    }
}
