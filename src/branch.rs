//! Named branch pointers
//!
//! A branch maps a name to an optional head version id. `None` means the
//! branch exists but has no commits yet. Exactly one branch is active at a
//! time, and `main` always exists.
//!
//! The registry knows nothing about the version store. Callers check that a
//! head id resolves before pointing a branch at it.

use crate::error::{Result, RevmapError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Name of the branch that always exists
pub const MAIN_BRANCH: &str = "main";

/// A named pointer into the version graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Branch name
    pub name: String,
    /// Current head version, if any commits exist
    pub head: Option<String>,
}

/// Check a branch name against `[A-Za-z][A-Za-z0-9_-]*`
///
/// # Examples
///
/// ```rust
/// use revmap::branch::validate_branch_name;
///
/// assert!(validate_branch_name("feature-x").is_ok());
/// assert!(validate_branch_name("1st").is_err());
/// assert!(validate_branch_name("has space").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(RevmapError::InvalidBranchName(name.to_string()))
    }
}

/// Branch table plus the active branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRegistry {
    branches: BTreeMap<String, Option<String>>,
    active: String,
}

impl Default for BranchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchRegistry {
    /// Registry with only an empty `main`, which is active
    pub fn new() -> Self {
        let mut branches = BTreeMap::new();
        branches.insert(MAIN_BRANCH.to_string(), None);
        Self {
            branches,
            active: MAIN_BRANCH.to_string(),
        }
    }

    /// Rebuild a registry from persisted state
    ///
    /// A missing `main` is recreated empty. The active branch must exist.
    pub fn from_parts(
        mut branches: BTreeMap<String, Option<String>>,
        active: impl Into<String>,
    ) -> Result<Self> {
        let active = active.into();

        for name in branches.keys() {
            validate_branch_name(name)?;
        }
        branches.entry(MAIN_BRANCH.to_string()).or_insert(None);

        if !branches.contains_key(&active) {
            return Err(RevmapError::integrity(format!(
                "active branch '{}' does not exist",
                active
            )));
        }

        Ok(Self { branches, active })
    }

    /// Add a branch pointing at `head`
    ///
    /// Does not switch to it.
    pub fn create(&mut self, name: &str, head: Option<String>) -> Result<Branch> {
        validate_branch_name(name)?;
        if self.branches.contains_key(name) {
            return Err(RevmapError::BranchExists(name.to_string()));
        }

        self.branches.insert(name.to_string(), head.clone());
        debug!("Created branch {}", name);
        Ok(Branch {
            name: name.to_string(),
            head,
        })
    }

    /// Make `name` the active branch
    pub fn switch(&mut self, name: &str) -> Result<Branch> {
        let branch = self.get(name)?;
        self.active = name.to_string();
        Ok(branch)
    }

    /// Remove a branch
    ///
    /// `main` and the active branch cannot be deleted.
    pub fn delete(&mut self, name: &str) -> Result<Branch> {
        if name == MAIN_BRANCH {
            return Err(RevmapError::ProtectedBranch {
                name: name.to_string(),
                reason: "main always exists".to_string(),
            });
        }
        if name == self.active {
            return Err(RevmapError::ProtectedBranch {
                name: name.to_string(),
                reason: "it is the active branch".to_string(),
            });
        }

        let head = self
            .branches
            .remove(name)
            .ok_or_else(|| RevmapError::BranchNotFound(name.to_string()))?;
        Ok(Branch {
            name: name.to_string(),
            head,
        })
    }

    /// Point an existing branch at a new head
    pub fn set_head(&mut self, name: &str, head: Option<String>) -> Result<()> {
        let slot = self
            .branches
            .get_mut(name)
            .ok_or_else(|| RevmapError::BranchNotFound(name.to_string()))?;
        *slot = head;
        Ok(())
    }

    /// Look up a branch
    pub fn get(&self, name: &str) -> Result<Branch> {
        self.branches
            .get(name)
            .map(|head| Branch {
                name: name.to_string(),
                head: head.clone(),
            })
            .ok_or_else(|| RevmapError::BranchNotFound(name.to_string()))
    }

    /// Head of a branch
    pub fn head(&self, name: &str) -> Result<Option<&str>> {
        self.branches
            .get(name)
            .map(|head| head.as_deref())
            .ok_or_else(|| RevmapError::BranchNotFound(name.to_string()))
    }

    /// Whether a branch exists
    pub fn contains(&self, name: &str) -> bool {
        self.branches.contains_key(name)
    }

    /// The active branch
    pub fn active(&self) -> Branch {
        Branch {
            name: self.active.clone(),
            head: self.branches.get(&self.active).cloned().flatten(),
        }
    }

    /// Name of the active branch
    pub fn active_name(&self) -> &str {
        &self.active
    }

    /// All branches sorted by name
    pub fn list(&self) -> Vec<Branch> {
        self.branches
            .iter()
            .map(|(name, head)| Branch {
                name: name.clone(),
                head: head.clone(),
            })
            .collect()
    }

    /// Raw name → head map, as persisted
    pub fn as_map(&self) -> &BTreeMap<String, Option<String>> {
        &self.branches
    }

    /// Branch names grouped by the version they point at
    pub fn labels(&self) -> HashMap<String, Vec<String>> {
        let mut labels: HashMap<String, Vec<String>> = HashMap::new();
        for (name, head) in &self.branches {
            if let Some(head) = head {
                labels.entry(head.clone()).or_default().push(name.clone());
            }
        }
        labels
    }
}
