//! On-Disk Bytecode Cache
//!
//! Persists serialized [`CompiledShaderSet`]s across process runs, one
//! file per pipeline fingerprint. The layout is documented in
//! [`crate::pipeline::compiled`]; a mismatched magic or format version
//! invalidates the file, which is deleted silently and treated as a miss.
//!
//! Writes go to a process-unique temporary sibling followed by an atomic
//! rename, so a crash mid-write never corrupts an existing entry; readers
//! of a not-yet-renamed file simply see it as absent.
//!
//! I/O errors never escape this module. They are logged as warnings and
//! reported as misses; the disk tier is strictly best-effort.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::errors::ForgeError;
use crate::pipeline::{CompiledShaderSet, ShaderStage};

const FILE_EXTENSION: &str = "sfc";

pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Opens (and creates if needed) the cache directory.
    ///
    /// Returns `None` when the directory cannot be created; the service
    /// then runs without a disk tier.
    #[must_use]
    pub fn open(dir: impl Into<PathBuf>) -> Option<Self> {
        let dir = dir.into();
        if let Err(err) = fs::create_dir_all(&dir) {
            log_io_error("Disk cache disabled: cannot create", &dir, err);
            return None;
        }
        Some(Self { dir })
    }

    fn entry_path(&self, fingerprint: u64) -> PathBuf {
        self.dir.join(format!("{fingerprint:016x}.{FILE_EXTENSION}"))
    }

    /// Loads the per-stage bytecode for `fingerprint`, or `None` on miss.
    ///
    /// Invalid entries (bad magic, wrong version, truncation) are deleted
    /// before reporting the miss.
    #[must_use]
    pub fn load(&self, fingerprint: u64) -> Option<Vec<(ShaderStage, Vec<u8>)>> {
        let path = self.entry_path(fingerprint);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                log_io_error("Disk cache read failed for", &path, err);
                return None;
            }
        };

        match CompiledShaderSet::deserialize_bytecode(&bytes) {
            Some(stages) => {
                debug!("Disk cache hit for {fingerprint:016x} ({} stages)", stages.len());
                Some(stages)
            }
            None => {
                debug!("Invalid disk cache entry {}, deleting", path.display());
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Persists `set` under `fingerprint`. Best-effort; failures are logged.
    pub fn store(&self, fingerprint: u64, set: &CompiledShaderSet) {
        let path = self.entry_path(fingerprint);
        let tmp = self
            .dir
            .join(format!("{fingerprint:016x}.tmp-{}", std::process::id()));

        let bytes = set.serialize();
        if let Err(err) = fs::write(&tmp, &bytes) {
            log_io_error("Disk cache write failed for", &tmp, err);
            let _ = fs::remove_file(&tmp);
            return;
        }
        if let Err(err) = fs::rename(&tmp, &path) {
            log_io_error("Disk cache rename failed for", &path, err);
            let _ = fs::remove_file(&tmp);
        }
    }

    /// Deletes the entry for `fingerprint`, if present.
    pub fn remove(&self, fingerprint: u64) {
        let _ = fs::remove_file(self.entry_path(fingerprint));
    }

    /// Deletes every cache entry; returns how many files were removed.
    pub fn clear(&self) -> usize {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return 0;
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if is_cache_file(&path) && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        removed
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn is_cache_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == FILE_EXTENSION)
}

/// Wraps a raw I/O error into [`ForgeError::Io`] and logs it; this tier
/// degrades to a miss instead of raising.
fn log_io_error(context: &str, path: &Path, err: std::io::Error) {
    let err = ForgeError::from(err);
    warn!("{context} {}: {err}", path.display());
}
