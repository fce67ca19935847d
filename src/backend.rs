//! Persistence backends
//!
//! A [`Backend`] stores three whole collections: the version list, the
//! branch table and the active branch name. There is no partial-update API;
//! every save replaces the collection. The session computes new state in
//! memory, saves it, and only then swaps it in.
//!
//! Two backends ship with the crate:
//!
//! - [`FileBackend`]: a directory on disk
//! - [`MemoryBackend`]: shared in-process state, handy for tests and for
//!   modelling a remote service that several sessions talk to
//!
//! ## On-disk layout
//!
//! ```text
//! .revmap/
//! ├── metadata.json   # StorageMetadata (format, config, timestamps)
//! ├── versions.json   # Vec<Version>, optionally LZ4-compressed
//! ├── branches.json   # { "main": "<id>", "dev": null }
//! └── HEAD            # active branch name
//! ```
//!
//! Every file is written through [`crate::utils::atomic_write`].
//!
//! There is no multi-writer detection: two sessions saving to the same
//! backend overwrite each other's collections.

use crate::compression::CompressionEngine;
use crate::error::{Result, RevmapError};
use crate::types::{RevmapConfig, StorageMetadata};
use crate::utils::{atomic_write, read_json, write_json};
use crate::version::Version;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Branch table as persisted: name → optional head id
pub type BranchMap = BTreeMap<String, Option<String>>;

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

const METADATA_FILE: &str = "metadata.json";
const VERSIONS_FILE: &str = "versions.json";
const BRANCHES_FILE: &str = "branches.json";
const HEAD_FILE: &str = "HEAD";

/// Whole-collection persistence contract
///
/// Loads on a fresh store return empty collections (and `None` for the
/// active branch) rather than errors.
pub trait Backend: Send + Sync + Debug {
    /// Load every stored version
    fn load_versions(&self) -> Result<Vec<Version>>;

    /// Replace the stored version list
    fn save_versions(&self, versions: &[Version]) -> Result<()>;

    /// Load the branch table
    fn load_branches(&self) -> Result<BranchMap>;

    /// Replace the branch table
    fn save_branches(&self, branches: &BranchMap) -> Result<()>;

    /// Load the active branch name, if one was saved
    fn load_active_branch(&self) -> Result<Option<String>>;

    /// Replace the active branch name
    fn save_active_branch(&self, name: &str) -> Result<()>;
}

/// Collections held by a [`MemoryBackend`]
#[derive(Debug, Default)]
struct MemoryState {
    versions: Vec<Version>,
    branches: BranchMap,
    active_branch: Option<String>,
    read_only: bool,
    saves: usize,
}

/// In-memory backend
///
/// Clones share the same state, so two sessions built on clones of one
/// backend see each other's saves the way two clients of a remote service
/// would.
///
/// # Examples
///
/// ```rust
/// use revmap::backend::{Backend, MemoryBackend};
///
/// let backend = MemoryBackend::new();
/// let shared = backend.clone();
///
/// backend.save_active_branch("dev")?;
/// assert_eq!(shared.load_active_branch()?.as_deref(), Some("dev"));
/// # Ok::<(), revmap::RevmapError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every save with a storage error
    ///
    /// Simulates an unavailable remote store.
    pub fn set_read_only(&self, read_only: bool) {
        self.state.lock().read_only = read_only;
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.state.lock().saves
    }

    fn write<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut MemoryState),
    {
        let mut state = self.state.lock();
        if state.read_only {
            return Err(RevmapError::storage("memory backend is read-only"));
        }
        apply(&mut state);
        state.saves += 1;
        Ok(())
    }
}

impl Backend for MemoryBackend {
    fn load_versions(&self) -> Result<Vec<Version>> {
        Ok(self.state.lock().versions.clone())
    }

    fn save_versions(&self, versions: &[Version]) -> Result<()> {
        self.write(|state| state.versions = versions.to_vec())
    }

    fn load_branches(&self) -> Result<BranchMap> {
        Ok(self.state.lock().branches.clone())
    }

    fn save_branches(&self, branches: &BranchMap) -> Result<()> {
        self.write(|state| state.branches = branches.clone())
    }

    fn load_active_branch(&self) -> Result<Option<String>> {
        Ok(self.state.lock().active_branch.clone())
    }

    fn save_active_branch(&self, name: &str) -> Result<()> {
        self.write(|state| state.active_branch = Some(name.to_string()))
    }
}

/// Directory-backed persistence
pub struct FileBackend {
    /// Storage directory
    root: PathBuf,
    /// Compression applied to the version list
    compression: CompressionEngine,
    /// Storage metadata and configuration
    metadata: RwLock<StorageMetadata>,
}

impl Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("root", &self.root)
            .field("compression", self.compression.strategy())
            .finish()
    }
}

impl FileBackend {
    /// Create a new storage directory
    ///
    /// The directory may already exist, but must not already hold a
    /// repository.
    ///
    /// # Errors
    ///
    /// - [`RevmapError::StorageAlreadyExists`] if `metadata.json` is present
    /// - [`RevmapError::Io`] if the directory cannot be created or written
    pub fn init(root: impl Into<PathBuf>, config: RevmapConfig) -> Result<Self> {
        let root = root.into();
        if root.join(METADATA_FILE).exists() {
            return Err(RevmapError::StorageAlreadyExists(root));
        }

        fs::create_dir_all(&root)?;

        let now = Utc::now();
        let metadata = StorageMetadata {
            format_version: FORMAT_VERSION,
            revmap_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: now,
            last_accessed: now,
            config,
        };
        write_json(&root.join(METADATA_FILE), &metadata)?;

        info!("Initialized storage at {:?}", root);

        Ok(Self {
            compression: CompressionEngine::new(metadata.config.compression_strategy.clone()),
            root,
            metadata: RwLock::new(metadata),
        })
    }

    /// Open an existing storage directory
    ///
    /// Updates the last-accessed timestamp in `metadata.json`.
    ///
    /// # Errors
    ///
    /// - [`RevmapError::StorageNotInitialized`] if there is no `metadata.json`
    /// - [`RevmapError::InvalidConfiguration`] for an unknown format version
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let metadata_path = root.join(METADATA_FILE);
        if !metadata_path.exists() {
            return Err(RevmapError::StorageNotInitialized(root));
        }

        let mut metadata: StorageMetadata = read_json(&metadata_path)?;
        if metadata.format_version > FORMAT_VERSION {
            return Err(RevmapError::InvalidConfiguration(format!(
                "storage format {} is newer than supported format {}",
                metadata.format_version, FORMAT_VERSION
            )));
        }

        metadata.last_accessed = Utc::now();
        write_json(&metadata_path, &metadata)?;

        info!("Opened storage at {:?}", root);

        Ok(Self {
            compression: CompressionEngine::new(metadata.config.compression_strategy.clone()),
            root,
            metadata: RwLock::new(metadata),
        })
    }

    /// Open storage if it exists, otherwise create it
    pub fn init_or_open(root: impl Into<PathBuf>, config: RevmapConfig) -> Result<Self> {
        let root = root.into();
        if root.join(METADATA_FILE).exists() {
            Self::open(root)
        } else {
            Self::init(root, config)
        }
    }

    /// Storage directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy of the storage metadata
    pub fn metadata(&self) -> StorageMetadata {
        self.metadata.read().clone()
    }

    /// Repository configuration
    pub fn config(&self) -> RevmapConfig {
        self.metadata.read().config.clone()
    }

    /// Compression engine used for the version list
    pub fn compression(&self) -> &CompressionEngine {
        &self.compression
    }

    /// Modify and persist the storage metadata
    pub fn update_metadata<F>(&self, updater: F) -> Result<()>
    where
        F: FnOnce(&mut StorageMetadata),
    {
        let mut metadata = self.metadata.write();
        let mut updated = metadata.clone();
        updater(&mut updated);
        write_json(&self.root.join(METADATA_FILE), &updated)?;
        *metadata = updated;
        Ok(())
    }

    fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }
}

impl Backend for FileBackend {
    fn load_versions(&self) -> Result<Vec<Version>> {
        let path = self.path(VERSIONS_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read(&path)?;
        let bytes = self.compression.decompress(&raw)?;
        let versions: Vec<Version> = serde_json::from_slice(&bytes)?;
        debug!("Loaded {} versions from {:?}", versions.len(), path);
        Ok(versions)
    }

    fn save_versions(&self, versions: &[Version]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(versions)?;
        let stored = self.compression.compress(&bytes)?;
        atomic_write(&self.path(VERSIONS_FILE), &stored)?;
        debug!("Saved {} versions ({} bytes)", versions.len(), stored.len());
        Ok(())
    }

    fn load_branches(&self) -> Result<BranchMap> {
        let path = self.path(BRANCHES_FILE);
        if !path.exists() {
            return Ok(BranchMap::new());
        }
        read_json(&path)
    }

    fn save_branches(&self, branches: &BranchMap) -> Result<()> {
        write_json(&self.path(BRANCHES_FILE), branches)
    }

    fn load_active_branch(&self) -> Result<Option<String>> {
        let path = self.path(HEAD_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let name = fs::read_to_string(&path)?.trim().to_string();
        Ok(if name.is_empty() { None } else { Some(name) })
    }

    fn save_active_branch(&self, name: &str) -> Result<()> {
        atomic_write(&self.path(HEAD_FILE), format!("{}\n", name).as_bytes())
    }
}
