//! Three-way merge of documents
//!
//! For each key in the union of the base and both sides, a side counts as
//! *changed* when its value differs from the base value under structural
//! equality, with "absent" distinct from every present value (including
//! `null`).
//!
//! | side A    | side B    | outcome                                  |
//! |-----------|-----------|------------------------------------------|
//! | unchanged | unchanged | base value, or omitted if base lacks it  |
//! | changed   | unchanged | A's value, or omitted if A deleted it    |
//! | unchanged | changed   | B's value, or omitted if B deleted it    |
//! | changed   | changed   | shared value if A == B, else a conflict  |
//!
//! Conflicting keys are left out of the merged data until the caller picks a
//! [`Resolution`] for each and applies them with [`apply_resolutions`].
//!
//! ## Examples
//!
//! ```rust
//! use revmap::merge::{apply_resolutions, merge, Resolution};
//! use revmap::version::Document;
//! use serde_json::json;
//! use std::collections::BTreeMap;
//!
//! let mut base = Document::new();
//! base.insert("title".to_string(), json!("Draft"));
//!
//! let mut ours = base.clone();
//! ours.insert("title".to_string(), json!("Ours"));
//! let mut theirs = base.clone();
//! theirs.insert("title".to_string(), json!("Theirs"));
//! theirs.insert("tag".to_string(), json!("new"));
//!
//! let result = merge(Some(&base), &ours, &theirs);
//! assert!(!result.success);
//! assert_eq!(result.merged_data["tag"], json!("new"));
//!
//! let mut choices = BTreeMap::new();
//! choices.insert("title".to_string(), Resolution::TakeB);
//! let merged = apply_resolutions(&result.merged_data, &result.conflicts, &choices)?;
//! assert_eq!(merged["title"], json!("Theirs"));
//! # Ok::<(), revmap::RevmapError>(())
//! ```

use crate::error::{Result, RevmapError};
use crate::version::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// A key both sides changed in incompatible ways
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Conflicting key
    pub key: String,
    /// Value in the common ancestor, if present there
    pub base_value: Option<Value>,
    /// Value on side A, `None` if A deleted the key
    pub value_a: Option<Value>,
    /// Value on side B, `None` if B deleted the key
    pub value_b: Option<Value>,
}

/// Where a merge came from, when run between branches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeContext {
    /// Branch being merged in
    pub source_branch: String,
    /// Branch receiving the merge
    pub target_branch: String,
    /// Head of the source branch at merge time
    pub source_version_id: String,
    /// Head of the target branch at merge time
    pub target_version_id: Option<String>,
    /// Common ancestor used as the base
    pub base_version_id: Option<String>,
}

/// Outcome of a three-way merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    /// True when there are no conflicts
    pub success: bool,
    /// Auto-merged data, without conflicting keys
    pub merged_data: Document,
    /// Keys needing a resolution, in key order
    pub conflicts: Vec<Conflict>,
    /// Branch and version information for merges between branches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<MergeContext>,
}

impl MergeResult {
    /// Keys that are in conflict
    pub fn conflict_keys(&self) -> Vec<&str> {
        self.conflicts.iter().map(|c| c.key.as_str()).collect()
    }
}

/// Choice for one conflicting key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Resolution {
    /// Keep side A's value (delete the key if A deleted it)
    TakeA,
    /// Keep side B's value (delete the key if B deleted it)
    TakeB,
    /// Keep the base value (delete the key if the base lacked it)
    TakeBase,
    /// Use an explicit value
    Value(Value),
    /// Drop the key
    Remove,
}

impl Resolution {
    /// The value this resolution picks for a conflict, `None` meaning absent
    pub fn pick(&self, conflict: &Conflict) -> Option<Value> {
        match self {
            Resolution::TakeA => conflict.value_a.clone(),
            Resolution::TakeB => conflict.value_b.clone(),
            Resolution::TakeBase => conflict.base_value.clone(),
            Resolution::Value(v) => Some(v.clone()),
            Resolution::Remove => None,
        }
    }
}

impl std::str::FromStr for Resolution {
    type Err = RevmapError;

    /// Parse `a`, `b`, `base`, `remove` or `json:<value>`
    fn from_str(raw: &str) -> Result<Self> {
        if let Some(json) = raw.strip_prefix("json:") {
            return Ok(Resolution::Value(serde_json::from_str(json)?));
        }
        match raw {
            "a" => Ok(Resolution::TakeA),
            "b" => Ok(Resolution::TakeB),
            "base" => Ok(Resolution::TakeBase),
            "remove" => Ok(Resolution::Remove),
            other => Err(RevmapError::validation(format!(
                "unknown resolution '{}', expected a, b, base, remove or json:<value>",
                other
            ))),
        }
    }
}

/// Three-way merge of `side_a` and `side_b` against `base`
///
/// A `None` base stands for the empty document, so every key on either side
/// counts as independently added.
pub fn merge(base: Option<&Document>, side_a: &Document, side_b: &Document) -> MergeResult {
    let empty = Document::new();
    let base = base.unwrap_or(&empty);

    let keys: BTreeSet<&String> = base.keys().chain(side_a.keys()).chain(side_b.keys()).collect();

    let mut merged_data = Document::new();
    let mut conflicts = Vec::new();

    for key in keys {
        let base_value = base.get(key);
        let value_a = side_a.get(key);
        let value_b = side_b.get(key);

        let changed_a = value_a != base_value;
        let changed_b = value_b != base_value;

        let chosen = match (changed_a, changed_b) {
            (false, false) => base_value,
            (true, false) => value_a,
            (false, true) => value_b,
            (true, true) if value_a == value_b => value_a,
            (true, true) => {
                conflicts.push(Conflict {
                    key: key.clone(),
                    base_value: base_value.cloned(),
                    value_a: value_a.cloned(),
                    value_b: value_b.cloned(),
                });
                continue;
            }
        };

        if let Some(value) = chosen {
            merged_data.insert(key.clone(), value.clone());
        }
    }

    debug!(
        "Merged {} keys with {} conflicts",
        merged_data.len(),
        conflicts.len()
    );

    MergeResult {
        success: conflicts.is_empty(),
        merged_data,
        conflicts,
        context: None,
    }
}

/// Overlay conflict resolutions onto auto-merged data
///
/// Every conflict needs exactly one resolution, and every resolution must
/// name a conflicting key.
///
/// # Errors
///
/// - [`RevmapError::UnresolvedConflicts`] listing every key without a resolution
/// - [`RevmapError::Validation`] if a resolution names a key that is not in conflict
pub fn apply_resolutions(
    merged_data: &Document,
    conflicts: &[Conflict],
    resolutions: &BTreeMap<String, Resolution>,
) -> Result<Document> {
    let conflict_keys: BTreeSet<&str> = conflicts.iter().map(|c| c.key.as_str()).collect();

    let stray: Vec<&str> = resolutions
        .keys()
        .map(String::as_str)
        .filter(|k| !conflict_keys.contains(k))
        .collect();
    if !stray.is_empty() {
        return Err(RevmapError::validation(format!(
            "resolutions given for keys not in conflict: {}",
            stray.join(", ")
        )));
    }

    let unresolved: Vec<String> = conflicts
        .iter()
        .filter(|c| !resolutions.contains_key(&c.key))
        .map(|c| c.key.clone())
        .collect();
    if !unresolved.is_empty() {
        return Err(RevmapError::UnresolvedConflicts(unresolved));
    }

    let mut result = merged_data.clone();
    for conflict in conflicts {
        let Some(resolution) = resolutions.get(&conflict.key) else {
            continue;
        };
        match resolution.pick(conflict) {
            Some(value) => {
                result.insert(conflict.key.clone(), value);
            }
            None => {
                result.remove(&conflict.key);
            }
        }
    }

    Ok(result)
}
