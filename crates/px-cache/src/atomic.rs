//! Atomic directory publication (spec.md §4.2, C2).
//!
//! A scratch directory is built under `tmp/`, then published to its final
//! location with a single `rename`. A sibling `.lock` file, held via BSD
//! `flock` (spec.md §5: advisory locking was chosen over POSIX record locks
//! because record locks are per-process and deadlock-detection-unaware
//! across threads; `flock` via `fs4` is per-open-file-description and plays
//! safely with a thread pool), serializes concurrent publishers of the same
//! final path. A publisher that loses the race to one already holding the
//! destination simply discards its own scratch directory and treats the
//! destination as authoritative.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs4::FileExt;

#[derive(Debug, thiserror::Error)]
pub enum AtomicError {
    #[error("failed to create scratch directory `{path}`: {source}")]
    CreateScratch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to acquire lock `{path}`: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to publish `{from}` to `{to}`: {source}")]
    Publish {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A scratch directory under the cache root's `tmp/` subdirectory, not yet
/// visible at its final path.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Creates a uniquely named scratch directory under `tmp_root`.
    pub fn create(tmp_root: &Path, label: &str) -> Result<Self, AtomicError> {
        fs::create_dir_all(tmp_root).map_err(|source| AtomicError::CreateScratch {
            path: tmp_root.to_path_buf(),
            source,
        })?;
        let unique = format!("{label}.{}", std::process::id());
        let path = tmp_root.join(unique);
        if path.exists() {
            fs::remove_dir_all(&path).ok();
        }
        fs::create_dir_all(&path).map_err(|source| AtomicError::CreateScratch {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Publishes the scratch directory to `destination` under an exclusive
    /// lock on `lock_path`, acquired for just this call. If `destination`
    /// already exists (another publisher won the race), the scratch
    /// directory is discarded and `Ok(false)` is returned; the caller should
    /// treat `destination` as authoritative. Returns `Ok(true)` when this
    /// call's content is the one now at `destination`.
    ///
    /// Callers that must serialize a larger sequence than the rename alone
    /// (e.g. a cache-hit check plus a population step that must not run
    /// concurrently for the same key) should hold the lock themselves across
    /// that whole sequence and call [`Self::publish_locked`] instead.
    pub fn publish(self, destination: &Path, lock_path: &Path) -> Result<bool, AtomicError> {
        let _lock = acquire_exclusive(lock_path)?;
        self.publish_locked(destination)
    }

    /// Publishes the scratch directory to `destination`. The caller must
    /// already hold an exclusive lock serializing every writer of
    /// `destination` — not just this rename, but the lookup and population
    /// that preceded it — so that at most one writer ever populates the
    /// destination's content for a given key.
    pub fn publish_locked(self, destination: &Path) -> Result<bool, AtomicError> {
        if destination.exists() {
            fs::remove_dir_all(&self.path).ok();
            return Ok(false);
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|source| AtomicError::Publish {
                from: self.path.clone(),
                to: destination.to_path_buf(),
                source,
            })?;
        }
        match fs::rename(&self.path, destination) {
            Ok(()) => Ok(true),
            Err(source) if matches!(source.kind(), io::ErrorKind::AlreadyExists) => {
                fs::remove_dir_all(&self.path).ok();
                Ok(false)
            }
            Err(source) if is_directory_not_empty(&source) => {
                fs::remove_dir_all(&self.path).ok();
                Ok(false)
            }
            Err(source) => Err(AtomicError::Publish {
                from: self.path.clone(),
                to: destination.to_path_buf(),
                source,
            }),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.path.exists() {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

fn is_directory_not_empty(err: &io::Error) -> bool {
    err.raw_os_error() == Some(39) || err.raw_os_error() == Some(66)
}

fn open_lock_file(path: &Path) -> Result<File, AtomicError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| AtomicError::Lock {
            path: path.to_path_buf(),
            source,
        })?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| AtomicError::Lock {
            path: path.to_path_buf(),
            source,
        })
}

/// Acquires an exclusive lock, blocking until held. Used for publication.
pub fn acquire_exclusive(path: &Path) -> Result<File, AtomicError> {
    let file = open_lock_file(path)?;
    file.lock_exclusive()
        .map_err(|source| AtomicError::Lock {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(file)
}

/// Acquires a shared lock, blocking until held. Used by readers that only
/// need to observe a stable, already-published directory.
pub fn acquire_shared(path: &Path) -> Result<File, AtomicError> {
    let file = open_lock_file(path)?;
    file.lock_shared().map_err(|source| AtomicError::Lock {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_moves_scratch_dir_into_place() {
        let root = tempfile::tempdir().unwrap();
        let tmp_root = root.path().join("tmp");
        let dest = root.path().join("objects").join("abc123");
        let lock_path = root.path().join("locks").join("abc123.lock");

        let scratch = ScratchDir::create(&tmp_root, "abc123").unwrap();
        fs::write(scratch.path().join("payload.bin"), b"data").unwrap();
        let published = scratch.publish(&dest, &lock_path).unwrap();

        assert!(published);
        assert!(dest.join("payload.bin").exists());
    }

    #[test]
    fn second_publisher_loses_race_and_keeps_first_content() {
        let root = tempfile::tempdir().unwrap();
        let tmp_root = root.path().join("tmp");
        let dest = root.path().join("objects").join("abc123");
        let lock_path = root.path().join("locks").join("abc123.lock");

        let first = ScratchDir::create(&tmp_root, "abc123-a").unwrap();
        fs::write(first.path().join("winner.bin"), b"first").unwrap();
        assert!(first.publish(&dest, &lock_path).unwrap());

        let second = ScratchDir::create(&tmp_root, "abc123-b").unwrap();
        fs::write(second.path().join("loser.bin"), b"second").unwrap();
        let published = second.publish(&dest, &lock_path).unwrap();

        assert!(!published);
        assert!(dest.join("winner.bin").exists());
        assert!(!dest.join("loser.bin").exists());
    }

    #[test]
    fn dropping_an_unpublished_scratch_dir_removes_it() {
        let root = tempfile::tempdir().unwrap();
        let tmp_root = root.path().join("tmp");
        let scratch = ScratchDir::create(&tmp_root, "ghost").unwrap();
        let path = scratch.path().to_path_buf();
        drop(scratch);
        assert!(!path.exists());
    }
}
