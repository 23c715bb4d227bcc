//! Wheel zip reading and unpacking (spec.md §4.9).

use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use zip::ZipArchive;

use crate::record::{read_record_str, RecordEntry};

#[derive(Debug, thiserror::Error)]
pub enum WheelReadError {
    #[error("I/O error at `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("no `*.dist-info` directory found in wheel")]
    MissingDistInfo,
    #[error("`{path}` hash {computed} does not match RECORD-declared hash {declared}")]
    RecordMismatch {
        path: String,
        declared: String,
        computed: String,
    },
}

/// Finds the wheel's `{name}-{version}.dist-info` directory name (the
/// top-level path segment every one of a wheel's entries is rooted under,
/// alongside its optional `.data` sibling).
pub fn find_dist_info_dir(archive: &mut ZipArchive<File>) -> Result<String, WheelReadError> {
    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        if let Some(prefix) = file.name().split('/').next() {
            if prefix.ends_with(".dist-info") {
                return Ok(prefix.to_string());
            }
        }
    }
    Err(WheelReadError::MissingDistInfo)
}

/// Reads the wheel's own bundled `RECORD`, used to cross-check the files
/// this installer just extracted against the hashes the wheel declares for
/// them.
pub fn read_original_record(archive_path: &Path, dist_info_dir: &str) -> Result<Vec<RecordEntry>, WheelReadError> {
    let file = File::open(archive_path).map_err(|source| WheelReadError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(file)?;
    let record_name = format!("{dist_info_dir}/RECORD");
    let mut entry = match archive.by_name(&record_name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut contents = String::new();
    entry.read_to_string(&mut contents).map_err(|source| WheelReadError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    Ok(read_record_str(&contents).unwrap_or_default())
}

/// Reads a text entry (e.g. `entry_points.txt`) out of the wheel's
/// `dist-info` directory, returning `None` if the wheel doesn't carry one.
pub fn read_dist_info_text(
    archive_path: &Path,
    dist_info_dir: &str,
    filename: &str,
) -> Result<Option<String>, WheelReadError> {
    let file = File::open(archive_path).map_err(|source| WheelReadError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(file)?;
    let entry_name = format!("{dist_info_dir}/{filename}");
    match archive.by_name(&entry_name) {
        Ok(mut entry) => {
            let mut contents = String::new();
            entry.read_to_string(&mut contents).map_err(|source| WheelReadError::Io {
                path: archive_path.to_path_buf(),
                source,
            })?;
            Ok(Some(contents))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn copy_and_hash<R: Read, W: Write>(src: &mut R, dest: &mut W) -> std::io::Result<(u64, String)> {
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 64 * 1024];
    let mut total = 0_u64;
    loop {
        let read = src.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        dest.write_all(&buffer[..read])?;
        total += read as u64;
    }
    let encoded = data_encoding::BASE64URL_NOPAD.encode(&hasher.finalize());
    Ok((total, format!("sha256={encoded}")))
}

/// Unpacks every file from `archive_path` into `dest_dir`, skipping the
/// wheel's own `RECORD` and any signature files (`.jws`/`.p7s`) since this
/// installer writes its own `RECORD` once scripts are generated. Returns a
/// `RecordEntry` per extracted file, computed from the bytes actually
/// written to disk.
pub fn unpack_wheel_files(archive_path: &Path, dest_dir: &Path) -> Result<Vec<RecordEntry>, WheelReadError> {
    let file = File::open(archive_path).map_err(|source| WheelReadError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(file)?;
    let mut created_dirs: HashSet<PathBuf> = HashSet::new();
    let mut entries = Vec::new();

    for i in 0..archive.len() {
        let mut zip_entry = archive.by_index(i)?;
        let Some(relative) = zip_entry.enclosed_name().map(Path::to_path_buf) else {
            continue;
        };
        let relative_str = relative.to_string_lossy().replace('\\', "/");
        if relative_str.ends_with("/RECORD") || relative_str.ends_with(".jws") || relative_str.ends_with(".p7s") {
            continue;
        }

        let target = dest_dir.join(&relative);
        if zip_entry.is_dir() {
            std::fs::create_dir_all(&target).map_err(|source| WheelReadError::Io {
                path: target.clone(),
                source,
            })?;
            created_dirs.insert(target);
            continue;
        }
        if let Some(parent) = target.parent() {
            if created_dirs.insert(parent.to_path_buf()) {
                std::fs::create_dir_all(parent).map_err(|source| WheelReadError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let mut out = File::create(&target).map_err(|source| WheelReadError::Io {
            path: target.clone(),
            source,
        })?;
        let (size, hash) = copy_and_hash(&mut zip_entry, &mut out).map_err(|source| WheelReadError::Io {
            path: target.clone(),
            source,
        })?;

        #[cfg(unix)]
        if let Some(mode) = zip_entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode)).map_err(|source| {
                WheelReadError::Io {
                    path: target.clone(),
                    source,
                }
            })?;
        }

        entries.push(RecordEntry {
            path: relative_str,
            hash: Some(hash),
            size: Some(size),
        });
    }
    Ok(entries)
}

/// Cross-checks every extracted entry's computed hash against the wheel's
/// own declared `RECORD`, when the wheel declared one. A mismatch means
/// the wheel is corrupt or was tampered with after its own fingerprint was
/// recorded (spec.md §4.9).
pub fn verify_against_original_record(
    extracted: &[RecordEntry],
    original: &[RecordEntry],
) -> Result<(), WheelReadError> {
    use std::collections::HashMap;
    let declared: HashMap<&str, &str> = original
        .iter()
        .filter_map(|entry| entry.hash.as_deref().map(|hash| (entry.path.as_str(), hash)))
        .collect();
    for entry in extracted {
        let Some(computed) = entry.hash.as_deref() else {
            continue;
        };
        if let Some(expected) = declared.get(entry.path.as_str()) {
            if *expected != computed {
                return Err(WheelReadError::RecordMismatch {
                    path: entry.path.clone(),
                    declared: (*expected).to_string(),
                    computed: computed.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_wheel_zip(path: &Path, entries: &[(&str, &[u8])]) {
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
    fn finds_the_dist_info_directory() {
        let dir = tempfile::tempdir().unwrap();
        let wheel = dir.path().join("pkg-1.0-py3-none-any.whl");
        write_wheel_zip(
            &wheel,
            &[
                ("pkg/__init__.py", b"".as_slice()),
                ("pkg-1.0.dist-info/METADATA", b"Name: pkg\n".as_slice()),
            ],
        );
        let file = File::open(&wheel).unwrap();
        let mut archive = ZipArchive::new(file).unwrap();
        assert_eq!(find_dist_info_dir(&mut archive).unwrap(), "pkg-1.0.dist-info");
    }

    #[test]
    fn unpack_skips_record_and_signature_files() {
        let dir = tempfile::tempdir().unwrap();
        let wheel = dir.path().join("pkg-1.0-py3-none-any.whl");
        write_wheel_zip(
            &wheel,
            &[
                ("pkg/__init__.py", b"print(1)".as_slice()),
                ("pkg-1.0.dist-info/RECORD", b"stale,,\n".as_slice()),
                ("pkg-1.0.dist-info/RECORD.jws", b"sig".as_slice()),
            ],
        );
        let dest = tempfile::tempdir().unwrap();
        let entries = unpack_wheel_files(&wheel, dest.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "pkg/__init__.py");
        assert!(dest.path().join("pkg/__init__.py").exists());
        assert!(!dest.path().join("pkg-1.0.dist-info/RECORD").exists());
    }

    #[test]
    fn verify_rejects_a_tampered_file() {
        let extracted = vec![RecordEntry {
            path: "pkg/__init__.py".into(),
            hash: Some("sha256=actual".into()),
            size: Some(1),
        }];
        let original = vec![RecordEntry {
            path: "pkg/__init__.py".into(),
            hash: Some("sha256=expected".into()),
            size: Some(1),
        }];
        assert!(verify_against_original_record(&extracted, &original).is_err());
    }
}
