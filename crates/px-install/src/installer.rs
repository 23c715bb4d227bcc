//! Install Pipeline (C9), spec.md §4.9.
//!
//! Installs a wheel into its own content-addressed prefix directory:
//! unpack site-packages, generate console/gui-script launchers, rewrite
//! their shebangs to the real target interpreter, and write the final
//! `RECORD` manifest. Everything happens inside a single
//! `ArtifactStore::store(ArtifactKind::Install, ...)` populate closure, so
//! the scratch directory is fully correct before it's published and
//! renamed into the cache as the distribution's immutable home.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use px_cache::{directory_hash, streaming_hasher, ArtifactKind, ArtifactStore, StoreError};
use px_domain::error::aggregate;
use px_domain::{Fingerprint, InstalledDistribution, Pin, PxError};

use crate::entrypoints::{parse_entry_points, ScriptKind};
use crate::record::{write_record, RecordEntry};
use crate::script::{get_script_launcher, get_shebang, mark_executable};
use crate::wheel_reader::{find_dist_info_dir, read_dist_info_text, read_original_record, unpack_wheel_files, verify_against_original_record};

pub const MAX_PARALLEL_INSTALLS: usize = 10;
const ENTRY_POINTS_FILE: &str = "entry_points.txt";
const SITE_PACKAGES_DIR: &str = "site-packages";
const SCRIPTS_DIR: &str = "bin";

/// Identical in shape to px-build's and px-fetch's bounded pool sizing.
#[must_use]
pub fn pool_size(item_count: usize, max_jobs: usize) -> usize {
    if item_count == 0 {
        return 1;
    }
    item_count.min(MAX_PARALLEL_INSTALLS.min(4 * max_jobs.max(1)))
}

/// A wheel ready to install, whether it arrived pre-built or came out of
/// C8.
pub struct InstallRequest {
    pub pin: Pin,
    pub wheel_path: PathBuf,
    pub wheel_fingerprint: Fingerprint,
    /// Path the generated scripts' shebangs should point at.
    pub target_interpreter_path: String,
    /// `false` for a wheel installed for a platform other than the host's
    /// own; disables bytecode compilation (spec.md §4.9). This pipeline
    /// never compiles bytecode regardless, so the flag is only carried
    /// through for callers that report it, not acted on here.
    pub target_matches_host: bool,
}

pub struct InstallContext<'a> {
    pub store: &'a ArtifactStore,
    pub max_jobs: usize,
}

fn install_one(ctx: &InstallContext<'_>, request: &InstallRequest) -> Result<InstalledDistribution, String> {
    let project_name = request.pin.project_name.as_str();
    let artifact_id = request.wheel_fingerprint.hex_digest().to_string();
    let wheel_path = request.wheel_path.clone();
    let shebang = get_shebang(&request.target_interpreter_path);

    let stored = ctx
        .store
        .store(ArtifactKind::Install, project_name, &artifact_id, None, |scratch| {
            let site_packages = scratch.join(SITE_PACKAGES_DIR);
            std::fs::create_dir_all(&site_packages).map_err(|source| StoreError::Io {
                path: site_packages.clone(),
                source,
            })?;

            let mut entries = unpack_wheel_files(&wheel_path, &site_packages).map_err(io_err(&wheel_path))?;

            let dist_info_dir = {
                let file = std::fs::File::open(&wheel_path).map_err(|source| StoreError::Io {
                    path: wheel_path.clone(),
                    source,
                })?;
                let mut archive = zip::ZipArchive::new(file).map_err(|err| StoreError::Io {
                    path: wheel_path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
                })?;
                find_dist_info_dir(&mut archive).map_err(io_err(&wheel_path))?
            };

            let original_record = read_original_record(&wheel_path, &dist_info_dir).map_err(io_err(&wheel_path))?;
            verify_against_original_record(&entries, &original_record).map_err(io_err(&wheel_path))?;

            let bin_dir = scratch.join(SCRIPTS_DIR);
            std::fs::create_dir_all(&bin_dir).map_err(|source| StoreError::Io {
                path: bin_dir.clone(),
                source,
            })?;

            if let Some(contents) =
                read_dist_info_text(&wheel_path, &dist_info_dir, ENTRY_POINTS_FILE).map_err(io_err(&wheel_path))?
            {
                for entry in parse_entry_points(&contents) {
                    let Some(function) = entry.function else { continue };
                    if entry.kind != ScriptKind::Console && entry.kind != ScriptKind::Gui {
                        continue;
                    }
                    let script_path = bin_dir.join(&entry.name);
                    let source = get_script_launcher(&entry.module, &function, &shebang);
                    std::fs::write(&script_path, source).map_err(|source| StoreError::Io {
                        path: script_path.clone(),
                        source,
                    })?;
                    mark_executable(&script_path).map_err(|source| StoreError::Io {
                        path: script_path.clone(),
                        source,
                    })?;
                    let fingerprint = streaming_hasher(&script_path, "sha256").map_err(|err| StoreError::Io {
                        path: script_path.clone(),
                        source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
                    })?;
                    let size = std::fs::metadata(&script_path)
                        .map_err(|source| StoreError::Io {
                            path: script_path.clone(),
                            source,
                        })?
                        .len();
                    entries.push(RecordEntry {
                        path: format!("{SCRIPTS_DIR}/{}", entry.name),
                        hash: Some(format!("sha256={}", fingerprint.hex_digest())),
                        size: Some(size),
                    });
                }
            }

            entries.push(RecordEntry {
                path: format!("{SITE_PACKAGES_DIR}/{dist_info_dir}/RECORD"),
                hash: None,
                size: None,
            });
            entries.sort_by(|a, b| a.path.cmp(&b.path));

            let record_path = site_packages.join(&dist_info_dir).join("RECORD");
            write_record(&record_path, &entries).map_err(|err| StoreError::Io {
                path: record_path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
            })?;

            directory_hash(scratch, "sha256").map_err(|err| StoreError::Io {
                path: scratch.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
            })
        })
        .map_err(|err| err.to_string())?;

    let distribution_dir = stored.path;
    let dist_info_dir = find_dist_info_dir_on_disk(&distribution_dir.join(SITE_PACKAGES_DIR))
        .ok_or_else(|| "installed distribution has no dist-info directory".to_string())?;
    let record_path = distribution_dir
        .join(SITE_PACKAGES_DIR)
        .join(&dist_info_dir)
        .join("RECORD");
    let installed_files = list_installed_files(&distribution_dir);

    Ok(InstalledDistribution {
        pin: request.pin.clone(),
        distribution_dir,
        installed_files,
        record_path,
    })
}

fn io_err(path: &Path) -> impl Fn(crate::wheel_reader::WheelReadError) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::Other, source.to_string()),
    }
}

fn find_dist_info_dir_on_disk(site_packages: &Path) -> Option<String> {
    std::fs::read_dir(site_packages)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .find(|name| name.ends_with(".dist-info"))
}

fn list_installed_files(distribution_dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(distribution_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().to_path_buf())
        .collect()
}

/// Installs every request concurrently, returning the full set of
/// `InstalledDistribution`s sorted by project name, or a single aggregated
/// `PxError` listing every failure.
pub fn install_all(ctx: &InstallContext<'_>, requests: &[InstallRequest]) -> Result<Vec<InstalledDistribution>, PxError> {
    let n = pool_size(requests.len(), ctx.max_jobs);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .build()
        .unwrap_or_else(|_| rayon::ThreadPoolBuilder::new().build().expect("default rayon pool"));

    let successes = Mutex::new(Vec::new());
    let failures = Mutex::new(Vec::new());

    pool.install(|| {
        use rayon::prelude::*;
        requests.par_iter().for_each(|request| match install_one(ctx, request) {
            Ok(distribution) => successes.lock().expect("poisoned successes lock").push(distribution),
            Err(diagnostic) => {
                failures.lock().expect("poisoned failures lock").push((
                    request.pin.to_string(),
                    request.wheel_path.display().to_string(),
                    diagnostic,
                ));
            }
        });
    });

    let failures = failures.into_inner().expect("poisoned failures lock");
    if !failures.is_empty() {
        return Err(aggregate(failures).unwrap_err());
    }

    let mut installed = successes.into_inner().expect("poisoned successes lock");
    installed.sort_by(|a, b| a.pin.project_name.cmp(&b.pin.project_name));
    Ok(installed)
}
