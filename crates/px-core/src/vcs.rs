//! A concrete `VcsArchiveBuilder` that shells out to the host's `git`/`hg`/
//! `bzr`/`svn` binaries (spec.md §4.4's "external build resolver").
//!
//! Checking out a VCS reference and archiving it is vendored distribution
//! tooling, not logic this workspace owns — it just needs a real
//! implementation somewhere so the core is runnable end to end, grounded in
//! the same `Command::new(...).output()` idiom the build-backend invoker
//! uses for PEP 517 hooks.

use std::path::{Path, PathBuf};
use std::process::Command;

use px_domain::VcsKind;

use px_fetch::{VcsArchiveBuilder, VcsDownloadError};

/// Invokes each VCS's native "archive a reference without a working tree"
/// command directly into `scratch_dir`.
pub struct SubprocessVcsBuilder;

impl VcsArchiveBuilder for SubprocessVcsBuilder {
    fn build_archive(
        &self,
        vcs_kind: VcsKind,
        url: &str,
        reference: &str,
        project_name: &str,
        version: &str,
        scratch_dir: &Path,
    ) -> Result<Vec<PathBuf>, VcsDownloadError> {
        let archive_path = scratch_dir.join(format!("{project_name}-{version}.zip"));
        let checkout_dir = scratch_dir.join("checkout");

        match vcs_kind {
            VcsKind::Git => {
                run(
                    Command::new("git").args(["clone", "--quiet", "--depth", "1", "--branch", reference, url]).arg(&checkout_dir),
                    url,
                )?;
                run(
                    Command::new("git")
                        .current_dir(&checkout_dir)
                        .args(["archive", "--format=zip", "--output"])
                        .arg(&archive_path)
                        .arg("HEAD"),
                    url,
                )?;
            }
            VcsKind::Hg => {
                run(Command::new("hg").args(["clone", "--quiet", "--rev", reference, url]).arg(&checkout_dir), url)?;
                run(
                    Command::new("hg")
                        .current_dir(&checkout_dir)
                        .args(["archive", "-t", "zip"])
                        .arg(&archive_path),
                    url,
                )?;
            }
            VcsKind::Bzr => {
                run(
                    Command::new("bzr")
                        .args(["export", "--format=zip"])
                        .arg(&archive_path)
                        .arg(format!("{url}/{reference}")),
                    url,
                )?;
            }
            VcsKind::Svn => {
                run(Command::new("svn").args(["export", "--quiet", "--revision", reference, url]).arg(&checkout_dir), url)?;
                zip_directory(&checkout_dir, &archive_path).map_err(|source| VcsDownloadError::Io { source })?;
            }
        }

        Ok(vec![archive_path])
    }
}

fn run(command: &mut Command, url: &str) -> Result<(), VcsDownloadError> {
    let output = command.output().map_err(|source| VcsDownloadError::Io { source })?;
    if !output.status.success() {
        return Err(VcsDownloadError::BuildFailed {
            url: url.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

fn zip_directory(src_dir: &Path, dest: &Path) -> std::io::Result<()> {
    let file = std::fs::File::create(dest)?;
    let mut writer = zip::ZipWriter::new(file);
    let options: zip::write::FileOptions<()> = zip::write::FileOptions::default();
    for entry in walkdir::WalkDir::new(src_dir).sort_by_file_name().into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(src_dir).unwrap_or(entry.path());
        writer
            .start_file(relative.to_string_lossy(), options)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?;
        std::io::copy(&mut std::fs::File::open(entry.path())?, &mut writer)?;
    }
    writer
        .finish()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?;
    Ok(())
}
