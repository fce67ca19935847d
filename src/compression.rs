//! LZ4 compression for persisted collections
//!
//! The file backend passes the serialized version list through a
//! [`CompressionEngine`] before writing it. Version histories are repetitive
//! JSON (every snapshot repeats most of its parent's fields), so LZ4 shrinks
//! them well at negligible CPU cost.
//!
//! ## Format
//!
//! Compressed payloads start with the 4-byte magic `RVMZ` followed by the
//! output of [`lz4_flex::compress_prepend_size`]. Anything else is returned
//! unchanged by [`CompressionEngine::decompress`], so plain JSON written with
//! [`CompressionStrategy::None`] stays readable by every strategy.
//!
//! ## Examples
//!
//! ```rust
//! use revmap::compression::{CompressionEngine, CompressionStrategy};
//!
//! let engine = CompressionEngine::new(CompressionStrategy::Fast);
//!
//! let data = br#"[{"id":"a","data":{}}]"#.repeat(50);
//! let compressed = engine.compress(&data)?;
//! assert!(compressed.len() < data.len());
//!
//! let restored = engine.decompress(&compressed)?;
//! assert_eq!(restored, data);
//! # Ok::<(), revmap::RevmapError>(())
//! ```

use crate::error::{Result, RevmapError};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, trace};

// Magic bytes identifying LZ4 compressed payloads
const LZ4_MAGIC: &[u8] = b"RVMZ";

/// Payloads smaller than this are never worth compressing
const MIN_COMPRESS_SIZE: usize = 64;

/// When to compress persisted payloads
///
/// Persisted in the repository configuration, so it is plain data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CompressionStrategy {
    /// Store plain JSON
    None,
    /// Compress every payload that gets smaller (default)
    #[default]
    Fast,
    /// Compress only payloads at least `min_size` bytes long
    Adaptive {
        /// Smallest payload worth compressing
        min_size: usize,
    },
}

impl CompressionStrategy {
    /// Parse a strategy name as used on the command line
    ///
    /// Accepts `none`, `fast` and `adaptive` (with a 4 KiB threshold).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "fast" => Ok(Self::Fast),
            "adaptive" => Ok(Self::Adaptive { min_size: 4096 }),
            other => Err(RevmapError::InvalidConfiguration(format!(
                "unknown compression strategy '{}'",
                other
            ))),
        }
    }

    /// Short name of the strategy
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fast => "fast",
            Self::Adaptive { .. } => "adaptive",
        }
    }

    fn should_compress(&self, size: usize) -> bool {
        match self {
            Self::None => false,
            Self::Fast => size >= MIN_COMPRESS_SIZE,
            Self::Adaptive { min_size } => size >= (*min_size).max(MIN_COMPRESS_SIZE),
        }
    }
}

/// Running compression statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompressionStats {
    /// Payloads written compressed
    pub payloads_compressed: usize,
    /// Payloads written as-is
    pub payloads_stored_raw: usize,
    /// Bytes saved by compression
    pub bytes_saved: usize,
    /// Time spent compressing, in milliseconds
    pub compression_time_ms: u64,
}

impl CompressionStats {
    /// Fraction of payloads that were compressed
    pub fn compression_ratio(&self) -> f64 {
        let total = self.payloads_compressed + self.payloads_stored_raw;
        if total == 0 {
            return 0.0;
        }
        self.payloads_compressed as f64 / total as f64
    }
}

/// Applies a [`CompressionStrategy`] and keeps statistics
///
/// Statistics live behind a lock so a shared engine can be used through
/// `&self` from backend methods.
#[derive(Debug, Default)]
pub struct CompressionEngine {
    strategy: CompressionStrategy,
    stats: Mutex<CompressionStats>,
}

impl CompressionEngine {
    /// Create an engine with the given strategy
    pub fn new(strategy: CompressionStrategy) -> Self {
        Self {
            strategy,
            stats: Mutex::new(CompressionStats::default()),
        }
    }

    /// The configured strategy
    pub fn strategy(&self) -> &CompressionStrategy {
        &self.strategy
    }

    /// Snapshot of the statistics so far
    pub fn stats(&self) -> CompressionStats {
        self.stats.lock().clone()
    }

    /// Compress a payload if the strategy says so and it helps
    pub fn compress(&self, content: &[u8]) -> Result<Vec<u8>> {
        let start = Instant::now();

        if !self.strategy.should_compress(content.len()) {
            trace!("Storing {} bytes uncompressed (strategy)", content.len());
            self.stats.lock().payloads_stored_raw += 1;
            return Ok(content.to_vec());
        }

        let compressed = compress_prepend_size(content);
        if compressed.len() + LZ4_MAGIC.len() >= content.len() {
            trace!("Compression not beneficial for {} bytes, storing raw", content.len());
            self.stats.lock().payloads_stored_raw += 1;
            return Ok(content.to_vec());
        }

        let saved = content.len() - compressed.len() - LZ4_MAGIC.len();
        {
            let mut stats = self.stats.lock();
            stats.payloads_compressed += 1;
            stats.bytes_saved += saved;
            stats.compression_time_ms += start.elapsed().as_millis() as u64;
        }

        debug!(
            "Compressed {} -> {} bytes (saved {:.1}%)",
            content.len(),
            compressed.len() + LZ4_MAGIC.len(),
            (saved as f64 / content.len() as f64) * 100.0
        );

        let mut result = Vec::with_capacity(LZ4_MAGIC.len() + compressed.len());
        result.extend_from_slice(LZ4_MAGIC);
        result.extend_from_slice(&compressed);
        Ok(result)
    }

    /// Undo [`CompressionEngine::compress`]
    ///
    /// Payloads without the magic header are returned unchanged.
    pub fn decompress(&self, content: &[u8]) -> Result<Vec<u8>> {
        match content.strip_prefix(LZ4_MAGIC) {
            Some(body) => decompress_size_prepended(body)
                .map_err(|e| RevmapError::Decompression(e.to_string())),
            None => Ok(content.to_vec()),
        }
    }
}

/// Whether a payload carries the compression header
pub fn is_compressed(content: &[u8]) -> bool {
    content.starts_with(LZ4_MAGIC)
}
