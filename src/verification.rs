//! Integrity verification of persisted history
//!
//! The [`Verifier`] works on raw collections as they come out of a
//! [`Backend`], not on a loaded [`crate::store::SnapshotStore`]. A store
//! refuses to load corrupted history, so checking the raw data is the only
//! way to report everything that is wrong at once.
//!
//! ## Checks
//!
//! - state hash of every version
//! - duplicate ids
//! - primary and merge parents exist
//! - every version is newer than its parents
//! - primary-parent chains terminate
//! - branch heads point at stored versions
//! - `main` and the active branch exist
//!
//! ## Examples
//!
//! ```rust
//! use revmap::Revmap;
//!
//! let mut repo = Revmap::in_memory()?;
//! repo.set("title", "Draft".into());
//! repo.commit_working("Initial", None)?;
//!
//! let report = repo.verify();
//! assert!(report.is_valid(), "{}", report.summary());
//! # Ok::<(), revmap::RevmapError>(())
//! ```

use crate::backend::{Backend, BranchMap};
use crate::branch::MAIN_BRANCH;
use crate::error::Result;
use crate::version::Version;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;
use tracing::{debug, warn};

/// A single integrity problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationIssue {
    /// Stored state hash does not match the version contents
    StateHashMismatch {
        /// Affected version
        version_id: String,
    },
    /// Two stored versions share an id
    DuplicateId {
        /// Duplicated id
        version_id: String,
    },
    /// Primary parent is not stored
    MissingParent {
        /// Affected version
        version_id: String,
        /// Missing parent id
        parent_id: String,
    },
    /// Merge parent is not stored
    MissingMergeParent {
        /// Affected version
        version_id: String,
        /// Missing merge parent id
        parent_id: String,
    },
    /// Version is not newer than one of its parents
    TimestampOrder {
        /// Affected version
        version_id: String,
        /// Parent that is not older
        parent_id: String,
    },
    /// Primary-parent chain does not terminate
    Cycle {
        /// Version whose chain loops
        version_id: String,
    },
    /// Branch head is not stored
    DanglingBranchHead {
        /// Branch name
        branch: String,
        /// Missing head id
        head: String,
    },
    /// The `main` branch is missing
    MissingMainBranch,
    /// The active branch is not in the branch table
    MissingActiveBranch {
        /// Saved active branch name, if any
        name: Option<String>,
    },
}

impl VerificationIssue {
    /// Version this issue is attributed to, if any
    pub fn version_id(&self) -> Option<&str> {
        match self {
            Self::StateHashMismatch { version_id }
            | Self::DuplicateId { version_id }
            | Self::MissingParent { version_id, .. }
            | Self::MissingMergeParent { version_id, .. }
            | Self::TimestampOrder { version_id, .. }
            | Self::Cycle { version_id } => Some(version_id),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateHashMismatch { version_id } => {
                write!(f, "version {} has a state hash mismatch", version_id)
            }
            Self::DuplicateId { version_id } => write!(f, "version id {} is stored twice", version_id),
            Self::MissingParent { version_id, parent_id } => {
                write!(f, "version {} references missing parent {}", version_id, parent_id)
            }
            Self::MissingMergeParent { version_id, parent_id } => write!(
                f,
                "version {} references missing merge parent {}",
                version_id, parent_id
            ),
            Self::TimestampOrder { version_id, parent_id } => write!(
                f,
                "version {} is not newer than its parent {}",
                version_id, parent_id
            ),
            Self::Cycle { version_id } => write!(f, "parent chain of {} loops", version_id),
            Self::DanglingBranchHead { branch, head } => {
                write!(f, "branch '{}' points at missing version {}", branch, head)
            }
            Self::MissingMainBranch => write!(f, "branch 'main' is missing"),
            Self::MissingActiveBranch { name: Some(name) } => {
                write!(f, "active branch '{}' does not exist", name)
            }
            Self::MissingActiveBranch { name: None } => write!(f, "no active branch is recorded"),
        }
    }
}

/// Result of verifying a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    /// Number of versions checked
    pub total_versions: usize,
    /// Versions with no issue attributed to them
    pub valid_versions: usize,
    /// Number of branches checked
    pub total_branches: usize,
    /// Everything that is wrong
    pub issues: Vec<VerificationIssue>,
    /// Time taken in milliseconds
    pub verification_time_ms: u64,
}

impl VerificationReport {
    /// Whether no issues were found
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        if self.is_valid() {
            format!(
                "Repository is valid: {} versions and {} branches verified in {}ms",
                self.total_versions, self.total_branches, self.verification_time_ms
            )
        } else {
            format!(
                "Repository has issues: {}/{} versions valid, {} problems found in {}ms",
                self.valid_versions,
                self.total_versions,
                self.issues.len(),
                self.verification_time_ms
            )
        }
    }
}

/// Checks raw persisted collections for integrity problems
#[derive(Debug)]
pub struct Verifier<'a> {
    versions: &'a [Version],
    branches: &'a BranchMap,
    active_branch: Option<&'a str>,
}

impl<'a> Verifier<'a> {
    /// Create a verifier over borrowed collections
    pub fn new(versions: &'a [Version], branches: &'a BranchMap, active_branch: Option<&'a str>) -> Self {
        Self {
            versions,
            branches,
            active_branch,
        }
    }

    /// Run every check
    pub fn verify(&self) -> VerificationReport {
        let start = Instant::now();
        let mut issues = Vec::new();

        let mut by_id: HashMap<&str, &Version> = HashMap::with_capacity(self.versions.len());
        for version in self.versions {
            if by_id.insert(version.id.as_str(), version).is_some() {
                issues.push(VerificationIssue::DuplicateId {
                    version_id: version.id.clone(),
                });
            }
        }

        let looping = Self::looping_ids(&by_id);

        for version in self.versions {
            if !version.verify_integrity() {
                issues.push(VerificationIssue::StateHashMismatch {
                    version_id: version.id.clone(),
                });
            }

            self.check_parent(version, version.parent_id.as_deref(), false, &by_id, &mut issues);
            self.check_parent(version, version.merge_parent_id.as_deref(), true, &by_id, &mut issues);

            if version.parent_id.as_deref().is_some_and(|p| looping.contains(p)) {
                issues.push(VerificationIssue::Cycle {
                    version_id: version.id.clone(),
                });
            }
        }

        self.check_branches(&by_id, &mut issues);

        let bad: HashSet<&str> = issues.iter().filter_map(|i| i.version_id()).collect();
        let report = VerificationReport {
            total_versions: self.versions.len(),
            valid_versions: self
                .versions
                .iter()
                .filter(|v| !bad.contains(v.id.as_str()))
                .count(),
            total_branches: self.branches.len(),
            issues,
            verification_time_ms: start.elapsed().as_millis() as u64,
        };

        if report.is_valid() {
            debug!("{}", report.summary());
        } else {
            warn!("{}", report.summary());
        }
        report
    }

    fn check_parent(
        &self,
        version: &Version,
        parent_id: Option<&str>,
        is_merge: bool,
        by_id: &HashMap<&str, &Version>,
        issues: &mut Vec<VerificationIssue>,
    ) {
        let Some(parent_id) = parent_id else {
            return;
        };

        match by_id.get(parent_id) {
            None if is_merge => issues.push(VerificationIssue::MissingMergeParent {
                version_id: version.id.clone(),
                parent_id: parent_id.to_string(),
            }),
            None => issues.push(VerificationIssue::MissingParent {
                version_id: version.id.clone(),
                parent_id: parent_id.to_string(),
            }),
            Some(parent) if parent.timestamp >= version.timestamp => {
                issues.push(VerificationIssue::TimestampOrder {
                    version_id: version.id.clone(),
                    parent_id: parent_id.to_string(),
                })
            }
            Some(_) => {}
        }
    }

    /// Ids whose primary-parent chain never reaches a root
    ///
    /// Every id is classified once: a walk stops at the first id already
    /// known, so a linear history costs a single pass.
    fn looping_ids<'v>(by_id: &HashMap<&'v str, &'v Version>) -> HashSet<&'v str> {
        let mut terminates: HashMap<&'v str, bool> = HashMap::with_capacity(by_id.len());

        for &start in by_id.keys() {
            let mut path = Vec::new();
            let mut on_path = HashSet::new();
            let mut current = Some(start);

            let loops = loop {
                let Some(id) = current else { break false };
                if let Some(&known) = terminates.get(id) {
                    break !known;
                }
                // A missing parent ends the chain
                let Some(&version) = by_id.get(id) else { break false };
                if !on_path.insert(id) {
                    break true;
                }
                path.push(id);
                current = version.parent_id.as_deref();
            };

            for id in path {
                terminates.insert(id, !loops);
            }
        }

        terminates
            .into_iter()
            .filter(|(_, ends)| !ends)
            .map(|(id, _)| id)
            .collect()
    }

    fn check_branches(&self, by_id: &HashMap<&str, &Version>, issues: &mut Vec<VerificationIssue>) {
        if !self.branches.contains_key(MAIN_BRANCH) {
            issues.push(VerificationIssue::MissingMainBranch);
        }

        match self.active_branch {
            Some(name) if self.branches.contains_key(name) => {}
            name => issues.push(VerificationIssue::MissingActiveBranch {
                name: name.map(str::to_string),
            }),
        }

        for (branch, head) in self.branches {
            if let Some(head) = head {
                if !by_id.contains_key(head.as_str()) {
                    issues.push(VerificationIssue::DanglingBranchHead {
                        branch: branch.clone(),
                        head: head.clone(),
                    });
                }
            }
        }
    }
}

/// Load every collection from a backend and verify it
///
/// Works on storage that a session would refuse to open.
pub fn verify_backend(backend: &dyn Backend) -> Result<VerificationReport> {
    let versions = backend.load_versions()?;
    let branches = backend.load_branches()?;
    let active = backend.load_active_branch()?;
    Ok(Verifier::new(&versions, &branches, active.as_deref()).verify())
}
