//! Local project downloader (spec.md §4.4, third bullet).
//!
//! A `LocalProjectArtifact`'s `path_placeholder` is resolved against the
//! user-supplied path-mapping table (spec.md §6), then the resolved
//! directory (optionally narrowed to a `subdirectory`) is content-hashed and
//! archived into the cache the same way a VCS checkout is: as a
//! `{project_name}-{version}.zip`.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use px_cache::directory_hash;
use px_domain::{Fingerprint, PathMapping};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum LocalDownloadError {
    #[error(transparent)]
    Placeholder(#[from] px_domain::PxError),
    #[error("local project path `{path}` does not exist")]
    MissingPath { path: PathBuf },
    #[error(transparent)]
    Hash(#[from] px_cache::HashError),
    #[error("I/O error archiving `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("zip error archiving local project: {0}")]
    Zip(#[from] zip::result::ZipError),
}

const EXCLUDED_DIR_NAMES: &[&str] = &["__pycache__", ".git", ".hg", ".svn", ".bzr"];
const EXCLUDED_FILE_SUFFIXES: &[&str] = &[".pyc", ".pyo"];

/// Resolves a `LocalProjectArtifact`'s `path_placeholder`/`subdirectory`
/// against the path-mapping table into an on-disk directory. Exposed for
/// the orchestrator, which needs the resolved root before deciding the
/// artifact store cache key (spec.md §4.3: a local project's key embeds its
/// content hash, which embeds its path).
pub fn resolve_project_root(
    path_placeholder: &str,
    subdirectory: Option<&str>,
    mappings: &[PathMapping],
) -> Result<PathBuf, LocalDownloadError> {
    let resolved = px_domain::resolve_placeholders([path_placeholder], mappings)?;
    let (_, base) = resolved
        .into_iter()
        .next()
        .expect("resolve_placeholders returns exactly one entry for one input name");
    let root = match subdirectory {
        Some(sub) => base.join(sub),
        None => base.to_path_buf(),
    };
    if !root.exists() {
        return Err(LocalDownloadError::MissingPath { path: root });
    }
    Ok(root)
}

/// Resolves, hashes and archives a local project directory into
/// `dest_dir/{project_name}-{version}.zip`, returning the filename and the
/// content hash of the (filtered) source tree.
pub fn download_local_project(
    path_placeholder: &str,
    subdirectory: Option<&str>,
    mappings: &[PathMapping],
    project_name: &str,
    version: &str,
    dest_dir: &Path,
    algorithm: &str,
) -> Result<(String, Fingerprint), LocalDownloadError> {
    let root = resolve_project_root(path_placeholder, subdirectory, mappings)?;
    let fingerprint = directory_hash(&root, algorithm)?;

    let filename = format!("{project_name}-{version}.zip");
    let dest_path = dest_dir.join(&filename);
    archive_directory(&root, &dest_path)?;

    Ok((filename, fingerprint))
}

fn is_excluded_dir(name: &str) -> bool {
    EXCLUDED_DIR_NAMES.contains(&name)
}

fn is_excluded_file(name: &str) -> bool {
    EXCLUDED_FILE_SUFFIXES.iter().any(|suf| name.ends_with(suf))
}

/// Zips `root`'s contents (minus the same exclusions `directory_hash`
/// applies) so the archive's content matches what was fingerprinted.
pub fn archive_directory(root: &Path, dest_path: &Path) -> Result<(), LocalDownloadError> {
    let file = File::create(dest_path).map_err(|source| LocalDownloadError::Io {
        path: dest_path.to_path_buf(),
        source,
    })?;
    let mut writer = zip::ZipWriter::new(file);
    let options: zip::write::FileOptions<()> = zip::write::FileOptions::default();

    let mut entries: Vec<PathBuf> = WalkDir::new(root)
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

    for path in entries {
        let relative = path.strip_prefix(root).unwrap_or(&path);
        let relative_str = relative.to_string_lossy().replace('\\', "/");
        writer.start_file(relative_str, options)?;
        let contents = fs::read(&path).map_err(|source| LocalDownloadError::Io {
            path: path.clone(),
            source,
        })?;
        writer.write_all(&contents).map_err(|source| LocalDownloadError::Io {
            path: path.clone(),
            source,
        })?;
    }
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(name: &str, path: &Path) -> PathMapping {
        PathMapping::parse(&format!("{name}|{}", path.display())).unwrap()
    }

    #[test]
    fn unresolved_placeholder_is_a_fatal_error() {
        let dest = tempfile::tempdir().unwrap();
        let err = download_local_project(
            "MISSING",
            None,
            &[],
            "myproject",
            "1.0",
            dest.path(),
            "sha256",
        )
        .unwrap_err();
        assert!(matches!(err, LocalDownloadError::Placeholder(_)));
    }

    #[test]
    fn archives_and_hashes_a_project_directory() {
        let project = tempfile::tempdir().unwrap();
        fs::create_dir_all(project.path().join("pkg/__pycache__")).unwrap();
        fs::write(project.path().join("pkg/__pycache__/mod.pyc"), b"bytecode").unwrap();
        fs::write(project.path().join("pkg/a.py"), b"print('a')").unwrap();

        let dest = tempfile::tempdir().unwrap();
        let mappings = vec![mapping("MY_PROJECT", project.path())];

        let (filename, fingerprint) = download_local_project(
            "MY_PROJECT",
            None,
            &mappings,
            "myproject",
            "1.0",
            dest.path(),
            "sha256",
        )
        .unwrap();

        assert_eq!(filename, "myproject-1.0.zip");
        assert!(dest.path().join(&filename).exists());

        let direct_hash = directory_hash(project.path(), "sha256").unwrap();
        assert_eq!(fingerprint, direct_hash);
    }

    #[test]
    fn touching_a_file_mtime_does_not_change_the_fingerprint() {
        let project = tempfile::tempdir().unwrap();
        fs::write(project.path().join("a.py"), b"print('a')").unwrap();
        let mappings = vec![mapping("MY_PROJECT", project.path())];
        let dest = tempfile::tempdir().unwrap();

        let (_, first) = download_local_project(
            "MY_PROJECT", None, &mappings, "p", "1.0", dest.path(), "sha256",
        )
        .unwrap();

        let file = File::open(project.path().join("a.py")).unwrap();
        file.set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(3600))
            .unwrap();

        let (_, second) = download_local_project(
            "MY_PROJECT", None, &mappings, "p", "1.0", dest.path(), "sha256",
        )
        .unwrap();

        assert_eq!(first, second);
    }
}
