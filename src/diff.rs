//! Field-level diff between two documents
//!
//! Each top-level key of the two documents lands in exactly one bucket:
//!
//! - **added**: present only in the newer document
//! - **removed**: present only in the older document
//! - **modified**: present in both with structurally different values
//! - **unchanged**: present in both with equal values
//!
//! Values are opaque. A nested object that differs in one inner field is
//! reported as a single modification of its top-level key; the diff never
//! descends into it.
//!
//! ## Examples
//!
//! ```rust
//! use revmap::diff::diff;
//! use revmap::version::Document;
//! use serde_json::json;
//!
//! let mut old = Document::new();
//! old.insert("title".to_string(), json!("Draft"));
//! old.insert("tags".to_string(), json!(["a"]));
//!
//! let mut new = old.clone();
//! new.insert("title".to_string(), json!("Final"));
//! new.remove("tags");
//! new.insert("owner".to_string(), json!("alice"));
//!
//! let result = diff(&old, &new);
//! assert!(result.added.contains_key("owner"));
//! assert!(result.removed.contains_key("tags"));
//! assert_eq!(result.modified["title"].after, json!("Final"));
//! ```

use crate::types::DiffStats;
use crate::version::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A value that changed between two documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    /// Value in the older document
    pub before: Value,
    /// Value in the newer document
    pub after: Value,
}

/// Result of comparing two documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Version the comparison starts from, when produced from stored versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_id: Option<String>,
    /// Version the comparison ends at, when produced from stored versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_id: Option<String>,
    /// Keys only in the newer document
    pub added: BTreeMap<String, Value>,
    /// Keys only in the older document
    pub removed: BTreeMap<String, Value>,
    /// Keys whose value changed
    pub modified: BTreeMap<String, Modification>,
    /// Keys present in both with equal values
    pub unchanged: BTreeSet<String>,
}

impl DiffResult {
    /// Whether anything was added, removed or modified
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.modified.is_empty()
    }

    /// Count the entries in each bucket
    pub fn stats(&self) -> DiffStats {
        DiffStats {
            keys_added: self.added.len(),
            keys_removed: self.removed.len(),
            keys_modified: self.modified.len(),
            keys_unchanged: self.unchanged.len(),
        }
    }

    /// Keys touched by the change, in key order
    pub fn changed_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .added
            .keys()
            .chain(self.removed.keys())
            .chain(self.modified.keys())
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Attach the ids of the versions that were compared
    pub fn with_ids(mut self, from_id: impl Into<String>, to_id: impl Into<String>) -> Self {
        self.from_id = Some(from_id.into());
        self.to_id = Some(to_id.into());
        self
    }
}

/// Compare `old` against `new`
///
/// Equality is `serde_json::Value` structural equality, so object key order
/// never matters while array order does.
pub fn diff(old: &Document, new: &Document) -> DiffResult {
    let mut result = DiffResult::default();

    for (key, before) in old {
        match new.get(key) {
            None => {
                result.removed.insert(key.clone(), before.clone());
            }
            Some(after) if after == before => {
                result.unchanged.insert(key.clone());
            }
            Some(after) => {
                result.modified.insert(
                    key.clone(),
                    Modification {
                        before: before.clone(),
                        after: after.clone(),
                    },
                );
            }
        }
    }

    for (key, value) in new {
        if !old.contains_key(key) {
            result.added.insert(key.clone(), value.clone());
        }
    }

    result
}

/// Whether two documents differ, without building a [`DiffResult`]
pub fn has_changes(old: &Document, new: &Document) -> bool {
    old != new
}
