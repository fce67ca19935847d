//! # revmap - Branching history for key/value documents
//!
//! A small version-control engine for a flat JSON-like document. It keeps
//! immutable snapshots in a graph, lets you name and move pointers into that
//! graph, and compares or merges any two snapshots field by field.
//!
//! ## Overview
//!
//! revmap provides a Git-like workflow for a single document:
//! - Commit snapshots (versions) of a key/value document
//! - Create, switch and delete branches
//! - Diff any two versions at the level of top-level keys
//! - Three-way merge branches, with explicit conflicts for the caller to resolve
//! - Roll back softly (branch off an old version) or hard (delete newer history)
//! - Verify the integrity of the stored history
//!
//! ## Quick Start
//!
//! ```rust
//! use revmap::Revmap;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut repo = Revmap::in_memory()?;
//!
//! repo.set("title", json!("Draft"));
//! repo.set("tags", json!(["intro"]));
//! let first = repo.commit_working("Initial draft", None)?;
//!
//! repo.set("title", json!("Final"));
//! let second = repo.commit_working("Retitle", None)?;
//!
//! let changes = repo.diff(&first.id, &second.id)?;
//! assert_eq!(changes.modified["title"].after, json!("Final"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Merging
//!
//! ```rust
//! use revmap::{Resolution, Revmap};
//! use serde_json::json;
//! use std::collections::BTreeMap;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut repo = Revmap::in_memory()?;
//! repo.set("title", json!("Base"));
//! repo.commit_working("Base", None)?;
//!
//! repo.create_branch("edit", None)?;
//! repo.set("title", json!("From edit"));
//! repo.commit_working("Edit title", None)?;
//!
//! repo.switch_branch("main")?;
//! repo.set("title", json!("From main"));
//! repo.commit_working("Other title", None)?;
//!
//! let result = repo.merge("edit", "main")?;
//! assert_eq!(result.conflicts.len(), 1);
//!
//! let choices = BTreeMap::from([("title".to_string(), Resolution::TakeA)]);
//! let data = revmap::merge::apply_resolutions(&result.merged_data, &result.conflicts, &choices)?;
//! let source = repo.head_of("edit")?.unwrap_or_default();
//! repo.complete_merge(data, "edit", &source, "Merge edit")?;
//! assert_eq!(repo.working_data()["title"], json!("From edit"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! ### Versions
//!
//! A version is an immutable snapshot with a UUID, an optional primary
//! parent, an optional merge parent (only on merge-commits), a message, an
//! author, a strictly increasing timestamp and a SHA-256 state hash used to
//! detect tampering.
//!
//! ### Branches
//!
//! A branch is a named, movable pointer to a version. `main` always exists.
//! Exactly one branch is active, and commits advance it.
//!
//! ### Persistence
//!
//! Sessions persist through a [`Backend`]. [`FileBackend`] keeps JSON files
//! in a directory (with optional LZ4 compression of the history);
//! [`MemoryBackend`] keeps everything in process.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] with a [`RevmapError`]. Merge conflicts
//! are not errors; they come back in a [`MergeResult`] with `success == false`.
//!
//! ## Module Organization
//!
//! - [`version`]: the version record and state hashing
//! - [`store`]: the snapshot arena
//! - [`ancestor`]: common ancestor lookup
//! - [`diff`]: field-level diff
//! - [`merge`]: three-way merge and conflict resolution
//! - [`branch`]: branch registry and name validation
//! - [`backend`]: persistence contract and implementations
//! - [`compression`]: LZ4 compression of stored history
//! - [`verification`]: integrity checking
//! - [`types`]: shared result, configuration and hook types
//! - [`error`]: error types

// Public API modules
pub mod ancestor;
pub mod backend;
pub mod branch;
pub mod compression;
pub mod diff;
pub mod error;
pub mod merge;
pub mod revmap;
pub mod store;
pub mod types;
pub mod utils;
pub mod verification;
pub mod version;

// Re-export main types for convenience
pub use backend::{Backend, FileBackend, MemoryBackend};
pub use branch::{Branch, BranchRegistry};
pub use compression::{CompressionEngine, CompressionStrategy};
pub use diff::{DiffResult, Modification};
pub use error::{Result, RevmapError};
pub use merge::{Conflict, MergeContext, MergeResult, Resolution};
pub use revmap::{Revmap, RevmapBuilder};
pub use store::SnapshotStore;
pub use types::*;
pub use verification::{VerificationIssue, VerificationReport};
pub use version::{Document, Version};
