//! Content hashing (spec.md §4.1, C1).
//!
//! `streaming_hasher` hashes a single file; `directory_hash` hashes a whole
//! tree deterministically, independent of the host's directory-walk order,
//! the way a VCS checkout or a built project directory needs to be digested
//! before it can be content-addressed.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use md5::Md5;
use px_domain::Fingerprint;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

const CHUNK_SIZE: usize = 64 * 1024;

/// Directory entries that never contribute to a directory's fingerprint:
/// bytecode caches and VCS control directories are derived or
/// provenance-only, not part of a project's content.
const EXCLUDED_DIR_NAMES: &[&str] = &["__pycache__", ".git", ".hg", ".svn"];
const EXCLUDED_FILE_SUFFIXES: &[&str] = &[".pyc", ".pyo"];

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("unsupported hash algorithm `{0}`")]
    UnsupportedAlgorithm(String),
    #[error("I/O error hashing `{path}`: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },
}

enum Hasher {
    Sha256(Sha256),
    Sha1(Sha1),
    Md5(Md5),
}

impl Hasher {
    fn new(algorithm: &str) -> Result<Self, HashError> {
        match algorithm {
            "sha256" => Ok(Self::Sha256(Sha256::new())),
            "sha1" => Ok(Self::Sha1(Sha1::new())),
            "md5" => Ok(Self::Md5(Md5::new())),
            other => Err(HashError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(chunk),
            Self::Sha1(h) => h.update(chunk),
            Self::Md5(h) => h.update(chunk),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Md5(h) => hex::encode(h.finalize()),
        }
    }
}

/// Hashes a file's bytes under `algorithm`, reading in fixed-size chunks so
/// memory use is independent of file size. The caller's `algorithm` becomes
/// the resulting `Fingerprint`'s algorithm name.
pub fn streaming_hasher(path: &Path, algorithm: &str) -> Result<Fingerprint, HashError> {
    let mut file = File::open(path).map_err(|source| HashError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Hasher::new(algorithm)?;
    let mut buffer = [0_u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).map_err(|source| HashError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(Fingerprint::new(algorithm, hasher.finalize_hex()))
}

/// Hashes a file while simultaneously copying its bytes to `dest`, so a
/// download only needs one read pass to both land on disk and be verified.
pub fn streaming_hash_and_copy<R: Read, W: Write>(
    mut src: R,
    mut dest: W,
    algorithm: &str,
) -> Result<Fingerprint, HashError> {
    let mut hasher = Hasher::new(algorithm)?;
    let mut buffer = [0_u8; CHUNK_SIZE];
    loop {
        let read = src.read(&mut buffer).map_err(|source| HashError::Io {
            path: std::path::PathBuf::new(),
            source,
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        dest.write_all(&buffer[..read])
            .map_err(|source| HashError::Io {
                path: std::path::PathBuf::new(),
                source,
            })?;
    }
    Ok(Fingerprint::new(algorithm, hasher.finalize_hex()))
}

fn is_excluded_dir(name: &str) -> bool {
    EXCLUDED_DIR_NAMES.contains(&name)
}

fn is_excluded_file(name: &str) -> bool {
    EXCLUDED_FILE_SUFFIXES.iter().any(|suf| name.ends_with(suf))
}

/// Hashes a directory tree deterministically: entries are visited in
/// lexicographic path order (independent of the filesystem's native
/// iteration order), and each entry is framed into the digest as its
/// NUL-separated relative path components, then a LF, then the file's
/// contents, then a trailing LF (spec.md §4.1), so a renamed-but-otherwise-
/// identical file produces a different digest. `__pycache__`/`.pyc`/`.pyo`
/// and VCS control directories are skipped, matching the content a built
/// project actually ships.
pub fn directory_hash(root: &Path, algorithm: &str) -> Result<Fingerprint, HashError> {
    let mut entries: Vec<_> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.file_type().is_dir() {
                entry
                    .file_name()
                    .to_str()
                    .map_or(true, |name| !is_excluded_dir(name))
            } else {
                true
            }
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map_or(true, |name| !is_excluded_file(name))
        })
        .map(|entry| entry.path().to_path_buf())
        .collect();
    entries.sort();

    let mut hasher = Hasher::new(algorithm)?;
    for path in entries {
        let relative = path.strip_prefix(root).unwrap_or(&path);
        let framed_path = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("\0");
        hasher.update(framed_path.as_bytes());
        hasher.update(b"\n");
        let mut file = File::open(&path).map_err(|source| HashError::Io {
            path: path.clone(),
            source,
        })?;
        let mut buffer = [0_u8; CHUNK_SIZE];
        loop {
            let read = file.read(&mut buffer).map_err(|source| HashError::Io {
                path: path.clone(),
                source,
            })?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        hasher.update(b"\n");
    }
    Ok(Fingerprint::new(algorithm, hasher.finalize_hex()))
}

/// Digests a VCS-produced source archive (spec.md §4.1 "A VCS archive
/// digest is computed by..."). The zip is extracted into a scratch
/// directory, then hashed with `directory_hash`'s standard filters plus an
/// extra exclusion for `vcs_control_dir` (e.g. `.git`), so the digest is
/// stable across re-clones even though the archive itself still embeds the
/// control directory (some build backends derive their version from VCS
/// metadata, so it can't be stripped from the archive itself — only from
/// what we hash).
pub fn digest_vcs_archive(
    archive_path: &Path,
    vcs_control_dir: &str,
    algorithm: &str,
) -> Result<Fingerprint, HashError> {
    let scratch = tempfile::tempdir().map_err(|source| HashError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let file = File::open(archive_path).map_err(|source| HashError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|err| HashError::Io {
        path: archive_path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, err.to_string()),
    })?;
    archive.extract(scratch.path()).map_err(|err| HashError::Io {
        path: archive_path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, err.to_string()),
    })?;

    let control_dir = scratch.path().join(vcs_control_dir);
    if control_dir.exists() {
        std::fs::remove_dir_all(&control_dir).map_err(|source| HashError::Io {
            path: control_dir.clone(),
            source,
        })?;
    }
    directory_hash(scratch.path(), algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_hasher_is_deterministic_and_sensitive_to_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.txt");
        std::fs::write(&path, b"hello world").unwrap();
        let first = streaming_hasher(&path, "sha256").unwrap();
        let second = streaming_hasher(&path, "sha256").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.hex_digest().len(), 64);

        std::fs::write(&path, b"hello world!").unwrap();
        let third = streaming_hasher(&path, "sha256").unwrap();
        assert_ne!(first, third);
    }

    #[test]
    fn rejects_unsupported_algorithm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.txt");
        std::fs::write(&path, b"x").unwrap();
        assert!(streaming_hasher(&path, "sha512").is_err());
    }

    #[test]
    fn directory_hash_ignores_pycache_and_is_stable_across_unrelated_file_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pkg/__pycache__")).unwrap();
        std::fs::write(dir.path().join("pkg/__pycache__/mod.pyc"), b"bytecode").unwrap();
        std::fs::write(dir.path().join("pkg/a.py"), b"print('a')").unwrap();
        std::fs::write(dir.path().join("pkg/b.py"), b"print('b')").unwrap();

        let first = directory_hash(dir.path(), "sha256").unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir2.path().join("pkg")).unwrap();
        std::fs::write(dir2.path().join("pkg/b.py"), b"print('b')").unwrap();
        std::fs::write(dir2.path().join("pkg/a.py"), b"print('a')").unwrap();
        let second = directory_hash(dir2.path(), "sha256").unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn directory_hash_frames_each_entry_as_nul_path_lf_contents_lf() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg/a.py"), b"print('a')").unwrap();

        let mut expected = Sha256::new();
        expected.update(b"pkg\0a.py");
        expected.update(b"\n");
        expected.update(b"print('a')");
        expected.update(b"\n");
        let expected = Fingerprint::new("sha256", hex::encode(expected.finalize()));

        assert_eq!(directory_hash(dir.path(), "sha256").unwrap(), expected);
    }

    #[test]
    fn directory_hash_changes_when_a_file_is_renamed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), b"same content").unwrap();
        let before = directory_hash(dir.path(), "sha256").unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        std::fs::write(dir2.path().join("z.py"), b"same content").unwrap();
        let after = directory_hash(dir2.path(), "sha256").unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn streaming_hash_and_copy_writes_through_while_hashing() {
        let mut dest = Vec::new();
        let fp = streaming_hash_and_copy(&b"payload"[..], &mut dest, "sha256").unwrap();
        assert_eq!(dest, b"payload");
        assert_eq!(fp.algorithm(), "sha256");
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options: zip::write::FileOptions<()> = zip::write::FileOptions::default();
        for (name, contents) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn digest_vcs_archive_ignores_vcs_control_dir_not_in_the_standard_exclusion_set() {
        let dir = tempfile::tempdir().unwrap();
        let archive_with_vcs = dir.path().join("with_bzr.zip");
        write_zip(
            &archive_with_vcs,
            &[
                ("a.py", b"print('a')".as_slice()),
                (".bzr/branch-format", b"nonreproducible".as_slice()),
            ],
        );
        let archive_without_vcs = dir.path().join("without_bzr.zip");
        write_zip(&archive_without_vcs, &[("a.py", b"print('a')".as_slice())]);

        let with_vcs = digest_vcs_archive(&archive_with_vcs, ".bzr", "sha256").unwrap();
        let without_vcs = digest_vcs_archive(&archive_without_vcs, ".bzr", "sha256").unwrap();
        assert_eq!(with_vcs, without_vcs);
    }

    #[test]
    fn digest_vcs_archive_is_sensitive_to_tracked_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.zip");
        write_zip(&a, &[("a.py", b"print('a')".as_slice())]);
        let b = dir.path().join("b.zip");
        write_zip(&b, &[("a.py", b"print('b')".as_slice())]);

        let fp_a = digest_vcs_archive(&a, ".git", "sha256").unwrap();
        let fp_b = digest_vcs_archive(&b, ".git", "sha256").unwrap();
        assert_ne!(fp_a, fp_b);
    }
}
