//! VCS downloader (spec.md §4.4, second bullet).
//!
//! Producing an archive from a version-control checkout is delegated to an
//! injected capability — the *external build resolver* spec.md §6 names —
//! because cloning/checking out git/hg/bzr/svn trees is exactly the kind of
//! vendored distribution tooling spec.md §1 puts out of scope for this core.
//! This module only enforces the download-manager protocol around that
//! capability: exactly one archive produced, then fingerprinted with
//! `px_cache::digest_vcs_archive`.

use std::fs;
use std::path::{Path, PathBuf};

use px_cache::digest_vcs_archive;
use px_domain::{Fingerprint, VcsKind};

#[derive(Debug, thiserror::Error)]
pub enum VcsDownloadError {
    #[error("vcs archive build failed for `{url}`: {reason}")]
    BuildFailed { url: String, reason: String },
    #[error(
        "expected exactly one archive from vcs checkout of `{url}`, got {count}"
    )]
    UnexpectedArtifactCount { url: String, count: usize },
    #[error("I/O error moving vcs archive into place: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Hash(#[from] px_cache::HashError),
}

/// The capability a VCS checkout/clone-and-build tool must provide.
/// Implementations live outside this crate (they shell out to `git`/`hg`/
/// `bzr`/`svn` and a build backend); this crate only consumes the result.
/// `Sync` so a single instance can be shared across the orchestrator's
/// thread pool (spec.md §4.7).
pub trait VcsArchiveBuilder: Sync {
    /// Builds a source archive for `reference` of the repository at `url`
    /// into `scratch_dir`, returning the paths of every archive file it
    /// produced there (normally exactly one).
    fn build_archive(
        &self,
        vcs_kind: VcsKind,
        url: &str,
        reference: &str,
        project_name: &str,
        version: &str,
        scratch_dir: &Path,
    ) -> Result<Vec<PathBuf>, VcsDownloadError>;
}

fn vcs_control_dir(vcs_kind: VcsKind) -> &'static str {
    match vcs_kind {
        VcsKind::Git => ".git",
        VcsKind::Hg => ".hg",
        VcsKind::Bzr => ".bzr",
        VcsKind::Svn => ".svn",
    }
}

/// Drives the VCS artifact protocol: invoke `builder`, enforce the
/// exactly-one-archive invariant, fingerprint it with the VCS control
/// directory excluded, then move it into `dest_dir` under the canonical
/// `{project_name}-{version}.zip` filename.
pub fn download_vcs(
    builder: &dyn VcsArchiveBuilder,
    vcs_kind: VcsKind,
    url: &str,
    reference: &str,
    project_name: &str,
    version: &str,
    scratch_dir: &Path,
    dest_dir: &Path,
    algorithm: &str,
) -> Result<(String, Fingerprint), VcsDownloadError> {
    let produced = builder.build_archive(vcs_kind, url, reference, project_name, version, scratch_dir)?;
    if produced.len() != 1 {
        return Err(VcsDownloadError::UnexpectedArtifactCount {
            url: url.to_string(),
            count: produced.len(),
        });
    }
    let archive_path = &produced[0];

    let fingerprint = digest_vcs_archive(archive_path, vcs_control_dir(vcs_kind), algorithm)?;

    let filename = format!("{project_name}-{version}.zip");
    let dest_path = dest_dir.join(&filename);
    fs::rename(archive_path, &dest_path).or_else(|_| {
        fs::copy(archive_path, &dest_path).map(|_| ())
    }).map_err(|source| VcsDownloadError::Io { source })?;

    Ok((filename, fingerprint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct FixedBuilder {
        archives: Vec<PathBuf>,
    }

    impl VcsArchiveBuilder for FixedBuilder {
        fn build_archive(
            &self,
            _vcs_kind: VcsKind,
            _url: &str,
            _reference: &str,
            _project_name: &str,
            _version: &str,
            _scratch_dir: &Path,
        ) -> Result<Vec<PathBuf>, VcsDownloadError> {
            Ok(self.archives.clone())
        }
    }

    fn write_zip(path: &Path) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options: zip::write::FileOptions<()> = zip::write::FileOptions::default();
        writer.start_file("a.py", options).unwrap();
        writer.write_all(b"print('a')").unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn zero_archives_is_a_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let builder = FixedBuilder { archives: vec![] };
        let err = download_vcs(
            &builder,
            VcsKind::Git,
            "https://example/repo",
            "deadbeef",
            "myproject",
            "1.0",
            dir.path(),
            dir.path(),
            "sha256",
        )
        .unwrap_err();
        assert!(matches!(err, VcsDownloadError::UnexpectedArtifactCount { count: 0, .. }));
    }

    #[test]
    fn more_than_one_archive_is_a_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.zip");
        let b = dir.path().join("b.zip");
        write_zip(&a);
        write_zip(&b);
        let builder = FixedBuilder { archives: vec![a, b] };
        let err = download_vcs(
            &builder,
            VcsKind::Git,
            "https://example/repo",
            "deadbeef",
            "myproject",
            "1.0",
            dir.path(),
            dir.path(),
            "sha256",
        )
        .unwrap_err();
        assert!(matches!(err, VcsDownloadError::UnexpectedArtifactCount { count: 2, .. }));
    }

    #[test]
    fn exactly_one_archive_is_fingerprinted_and_moved_into_dest() {
        let scratch = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let archive = scratch.path().join("checkout.zip");
        write_zip(&archive);
        let builder = FixedBuilder {
            archives: vec![archive],
        };
        let (filename, fingerprint) = download_vcs(
            &builder,
            VcsKind::Git,
            "https://example/repo",
            "deadbeef",
            "myproject",
            "1.0",
            scratch.path(),
            dest.path(),
            "sha256",
        )
        .unwrap();
        assert_eq!(filename, "myproject-1.0.zip");
        assert!(dest.path().join(&filename).exists());
        assert_eq!(fingerprint.algorithm(), "sha256");
    }
}
