/*!
 * On-disk cache of per-chunk transcripts.
 *
 * Entries are keyed by the SHA-256 of the source audio file plus the chunk
 * number, so re-running a synthesis after an interruption reuses every
 * chunk that was already paid for.
 */

use anyhow::{Context, Result};
use log::{debug, warn};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::file_utils::FileManager;
use crate::subtitle_processor::Transcript;

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// Transcript cache rooted in one directory
#[derive(Debug)]
pub struct TranscriptCache {
    dir: PathBuf,
    stats: Mutex<CacheStats>,
}

impl TranscriptCache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// SHA-256 of a file's content, lower-hex
    pub fn file_key<P: AsRef<Path>>(path: P) -> Result<String> {
        let path = path.as_ref();
        let mut file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher).with_context(|| format!("Failed to hash {:?}", path))?;
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn entry_path(&self, key: &str, chunk: usize) -> PathBuf {
        self.dir.join(format!("{}_chunk_{:04}.json", key, chunk))
    }

    /// Cached transcript for one chunk; unreadable entries count as misses
    pub fn get(&self, key: &str, chunk: usize) -> Option<Transcript> {
        let path = self.entry_path(key, chunk);
        let cached = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| match serde_json::from_str::<Transcript>(&content) {
                Ok(transcript) => Some(transcript),
                Err(e) => {
                    warn!("Ignoring corrupt cache entry {:?}: {}", path, e);
                    None
                }
            });

        let mut stats = self.stats.lock();
        if cached.is_some() {
            stats.hits += 1;
            debug!("Transcript cache hit for chunk {}", chunk);
        } else {
            stats.misses += 1;
        }
        cached
    }

    /// Store a transcript for one chunk
    pub fn put(&self, key: &str, chunk: usize, transcript: &Transcript) -> Result<()> {
        FileManager::ensure_dir(&self.dir)?;
        let json = serde_json::to_string(transcript).context("Failed to serialize transcript")?;
        FileManager::write_to_file(self.entry_path(key, chunk), &json)
    }

    /// Remove every cached entry; returns how many files were deleted
    pub fn clear(&self) -> Result<usize> {
        if !FileManager::dir_exists(&self.dir) {
            return Ok(0);
        }
        let entries = FileManager::find_files(&self.dir, "json")?;
        for path in &entries {
            std::fs::remove_file(path).with_context(|| format!("Failed to remove {:?}", path))?;
        }
        *self.stats.lock() = CacheStats::default();
        Ok(entries.len())
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }
}
