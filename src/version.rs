//! Version definitions
//!
//! A [`Version`] is an immutable snapshot of a [`Document`] plus the metadata
//! that places it in history: up to two parent links, a message, an author
//! and a creation timestamp.
//!
//! ## Parents
//!
//! - `parent_id` is the primary parent. Following only primary parents from
//!   any version yields a simple chain back to a root.
//! - `merge_parent_id` is set only on merge-commits and points at the head of
//!   the branch that was merged in.
//!
//! ## Integrity
//!
//! Each version carries a `state_hash`, a SHA-256 fingerprint of its id,
//! parents, timestamp, message, author and canonical JSON of its data. The
//! hash is computed once at creation; [`Version::verify_integrity`] recomputes
//! it to detect edits made to persisted state behind the library's back.
//!
//! ## Examples
//!
//! ```rust
//! use revmap::version::{Document, Version};
//! use chrono::Utc;
//! use serde_json::json;
//!
//! let mut data = Document::new();
//! data.insert("title".to_string(), json!("Draft"));
//!
//! let version = Version::new(
//!     None,
//!     None,
//!     data,
//!     "Initial draft".to_string(),
//!     "alice".to_string(),
//!     Utc::now(),
//! );
//!
//! assert!(version.is_root());
//! assert!(version.verify_integrity());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// The versioned document: a flat map from field name to an opaque JSON value
///
/// Values may themselves be objects or arrays, but diff and merge treat them
/// as leaves compared by structural equality.
pub type Document = BTreeMap<String, Value>;

/// An immutable snapshot in the version graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Primary parent (None for a root version)
    pub parent_id: Option<String>,
    /// Second parent, set only on merge-commits
    #[serde(default)]
    pub merge_parent_id: Option<String>,
    /// Snapshot of the document
    pub data: Document,
    /// Commit message
    pub message: String,
    /// Author of the version
    pub author: String,
    /// Creation timestamp, strictly increasing within a store
    pub timestamp: DateTime<Utc>,
    /// SHA-256 hash of the version state
    pub state_hash: String,
}

impl Version {
    /// Create a new version with a fresh id and computed state hash
    ///
    /// No validation happens here; the [`crate::store::SnapshotStore`] checks
    /// the message and parent references before accepting a version.
    pub fn new(
        parent_id: Option<String>,
        merge_parent_id: Option<String>,
        data: Document,
        message: String,
        author: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut version = Self {
            id: uuid::Uuid::new_v4().to_string(),
            parent_id,
            merge_parent_id,
            data,
            message,
            author,
            timestamp,
            state_hash: String::new(),
        };

        version.state_hash = version.compute_state_hash();
        version
    }

    /// Compute the state hash from all version components
    ///
    /// The hash covers:
    /// - Version ID
    /// - Parent and merge parent IDs (or empty string if none)
    /// - Timestamp (RFC3339 format)
    /// - Message and author
    /// - Canonical JSON of the data (keys sorted)
    pub fn compute_state_hash(&self) -> String {
        let mut hasher = Sha256::new();

        hasher.update(&self.id);
        hasher.update(self.parent_id.as_deref().unwrap_or(""));
        hasher.update(self.merge_parent_id.as_deref().unwrap_or(""));
        hasher.update(self.timestamp.to_rfc3339());
        hasher.update(&self.message);
        hasher.update(&self.author);

        if let Ok(data_bytes) = serde_json::to_vec(&self.data) {
            hasher.update(&data_bytes);
        }

        hex::encode(hasher.finalize())
    }

    /// Verify that the stored state hash matches the version contents
    pub fn verify_integrity(&self) -> bool {
        self.compute_state_hash() == self.state_hash
    }

    /// Whether this version has no primary parent
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Whether this version was produced by a merge
    pub fn is_merge(&self) -> bool {
        self.merge_parent_id.is_some()
    }

    /// Iterate over the ids of both parents, primary first
    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.parent_id
            .as_deref()
            .into_iter()
            .chain(self.merge_parent_id.as_deref())
    }

    /// Get a short ID for display (first 8 characters)
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// Format version for display
    pub fn display_format(&self) -> String {
        format!(
            "[{}] {} - {} ({} field{}){}",
            self.short_id(),
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.message,
            self.data.len(),
            if self.data.len() == 1 { "" } else { "s" },
            if self.is_merge() { " [merge]" } else { "" }
        )
    }
}

/// First 8 characters of an id or hash
///
/// Stored ids are not trusted to be ASCII, so this never splits a character.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// Default author string, `user@host`
///
/// Falls back to `unknown` for either half when the environment does not
/// provide it.
pub fn default_author() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = hostname::get()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{}@{}", user, host)
}
