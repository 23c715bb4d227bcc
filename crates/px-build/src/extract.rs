//! Source-archive extraction (spec.md §4.8).
//!
//! A build request's `source_path` is a cached archive — `.zip`, `.tar.gz`/
//! `.tgz`, or `.tar.bz2`/`.tbz2` — produced by a File, VCS, or local-project
//! download (px-fetch/px-cache store every non-wheel artifact as an
//! archive). The build backend needs a plain directory to run against, so
//! every format is unpacked here before a hook ever runs.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tar::Archive;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unrecognized source archive extension: `{0}`")]
    UnknownFormat(String),
    #[error("I/O error extracting `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("zip error extracting `{path}`: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

enum Compression {
    None,
    Gzip,
    Bzip2,
}

/// Extracts `archive_path` into `dest_dir`, dispatching on filename
/// extension. `dest_dir` must already exist.
pub fn extract_source_archive(archive_path: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
    let name = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if name.ends_with(".zip") || name.ends_with(".sdist") {
        extract_zip(archive_path, dest_dir)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        extract_tar(archive_path, dest_dir, Compression::Gzip)
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
        extract_tar(archive_path, dest_dir, Compression::Bzip2)
    } else if name.ends_with(".tar") {
        extract_tar(archive_path, dest_dir, Compression::None)
    } else {
        Err(ExtractError::UnknownFormat(name))
    }
}

fn extract_tar(archive_path: &Path, dest_dir: &Path, compression: Compression) -> Result<(), ExtractError> {
    let file = File::open(archive_path).map_err(|source| ExtractError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let io_err = |source: std::io::Error| ExtractError::Io {
        path: archive_path.to_path_buf(),
        source,
    };
    match compression {
        Compression::None => Archive::new(reader).unpack(dest_dir).map_err(io_err),
        Compression::Gzip => Archive::new(GzDecoder::new(reader)).unpack(dest_dir).map_err(io_err),
        Compression::Bzip2 => Archive::new(BzDecoder::new(reader)).unpack(dest_dir).map_err(io_err),
    }
}

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
    let file = File::open(archive_path).map_err(|source| ExtractError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| ExtractError::Zip {
        path: archive_path.to_path_buf(),
        source,
    })?;
    archive.extract(dest_dir).map_err(|source| ExtractError::Zip {
        path: archive_path.to_path_buf(),
        source,
    })
}

/// Most sdists unpack into a single top-level `{name}-{version}/` directory;
/// a handful (and every local-project archive px-fetch produces) place
/// `pyproject.toml`/`setup.py` directly at the archive root. Picks whichever
/// applies so `resolve_build_system` and the invoker look in the right
/// place.
#[must_use]
pub fn locate_source_root(extracted_dir: &Path) -> PathBuf {
    if extracted_dir.join("pyproject.toml").exists() || extracted_dir.join("setup.py").exists() {
        return extracted_dir.to_path_buf();
    }
    let mut subdirs = std::fs::read_dir(extracted_dir)
        .into_iter()
        .flatten()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.path());
    match (subdirs.next(), subdirs.next()) {
        (Some(only), None) => only,
        _ => extracted_dir.to_path_buf(),
    }
}
