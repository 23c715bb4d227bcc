//! Build Pipeline (C8), spec.md §4.8.
//!
//! Mirrors px-fetch's download orchestrator: a bounded `rayon` pool turns
//! `needs_build` downloaded artifacts into wheels, dispatching through
//! `ArtifactStore::store(ArtifactKind::Build, ...)` so two targets that
//! resolve to the same source content never build it twice. The store's own
//! per-key file lock (spec.md §4.3) already serializes concurrent attempts
//! at the same `(project, source fingerprint)` pair, so this pipeline needs
//! no dedup bookkeeping of its own beyond that.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use px_cache::{ArtifactKind, ArtifactStore, StoreError};
use px_domain::error::aggregate;
use px_domain::{DownloadedArtifact, Fingerprint, Pin, PxError};

use crate::build_system::resolve_build_system;
use crate::extract::{extract_source_archive, locate_source_root};
use crate::invoker::{BuildBackendInvoker, BuildHook, HookOutcome};

/// Hard ceiling on concurrent builds, matching px-fetch's
/// `MAX_PARALLEL_DOWNLOADS` (spec.md §4.8 step 4: "same [bound] as C7").
pub const MAX_PARALLEL_BUILDS: usize = 10;

/// Computes the bounded worker count for a batch of `item_count` builds
/// given `max_jobs` available cores, identical in shape to px-fetch's
/// `pool_size` (spec.md §4.8).
#[must_use]
pub fn pool_size(item_count: usize, max_jobs: usize) -> usize {
    if item_count == 0 {
        return 1;
    }
    item_count.min(MAX_PARALLEL_BUILDS.min(4 * max_jobs.max(1)))
}

/// A downloaded artifact still awaiting a build, ready to hand to C8.
pub struct BuildRequest {
    pub pin: Pin,
    pub source_path: PathBuf,
    pub source_fingerprint: Fingerprint,
}

impl BuildRequest {
    #[must_use]
    pub fn from_downloaded(artifact: &DownloadedArtifact) -> Self {
        Self {
            pin: artifact.pin.clone(),
            source_path: artifact.local_path.clone(),
            source_fingerprint: artifact.object_id.clone(),
        }
    }
}

/// A wheel built from source, ready for C9.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltWheel {
    pub pin: Pin,
    pub wheel_path: PathBuf,
    pub fingerprint: Fingerprint,
}

pub struct BuildContext<'a> {
    pub store: &'a ArtifactStore,
    pub invoker: &'a (dyn BuildBackendInvoker + Sync),
    pub max_jobs: usize,
}

fn build_one(ctx: &BuildContext<'_>, request: &BuildRequest) -> Result<BuiltWheel, String> {
    let project_name = request.pin.project_name.as_str();
    let artifact_id = request.source_fingerprint.hex_digest().to_string();
    let source_path = request.source_path.clone();

    let stored = ctx
        .store
        .store(ArtifactKind::Build, project_name, &artifact_id, None, |scratch| {
            let extracted = scratch.join("src");
            std::fs::create_dir_all(&extracted).map_err(|source| StoreError::Io {
                path: extracted.clone(),
                source,
            })?;
            extract_source_archive(&source_path, &extracted).map_err(|err| StoreError::Io {
                path: source_path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
            })?;
            let source_root = locate_source_root(&extracted);
            let build_system = resolve_build_system(&source_root);

            let outcome = ctx
                .invoker
                .invoke(&build_system, BuildHook::BuildWheel, &source_root, scratch)
                .map_err(|err| StoreError::Io {
                    path: scratch.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
                })?;

            let relative = match outcome {
                HookOutcome::Produced(relative) => relative,
                HookOutcome::NotImplemented => {
                    return Err(StoreError::Io {
                        path: scratch.to_path_buf(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::Other,
                            "build backend does not implement build_wheel",
                        ),
                    })
                }
            };

            let wheel_path = scratch.join(&relative);
            px_cache::streaming_hasher(&wheel_path, "sha256").map_err(|err| StoreError::Io {
                path: wheel_path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
            })
        })
        .map_err(|err| err.to_string())?;

    let wheel_path = find_wheel_file(&stored.path).ok_or_else(|| "build produced no wheel file".to_string())?;
    Ok(BuiltWheel {
        pin: request.pin.clone(),
        wheel_path,
        fingerprint: stored.fingerprint,
    })
}

fn find_wheel_file(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| path.extension().and_then(|ext| ext.to_str()) == Some("whl"))
}

/// Builds every `needs_build` request concurrently, returning the full set
/// of `BuiltWheel`s sorted by project name, or a single aggregated
/// `PxError` listing every failure (spec.md §4.8).
pub fn build_all(ctx: &BuildContext<'_>, requests: &[BuildRequest]) -> Result<Vec<BuiltWheel>, PxError> {
    let n = pool_size(requests.len(), ctx.max_jobs);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .build()
        .unwrap_or_else(|_| rayon::ThreadPoolBuilder::new().build().expect("default rayon pool"));

    let successes = Mutex::new(Vec::new());
    let failures = Mutex::new(Vec::new());

    pool.install(|| {
        use rayon::prelude::*;
        requests.par_iter().for_each(|request| match build_one(ctx, request) {
            Ok(wheel) => successes.lock().expect("poisoned successes lock").push(wheel),
            Err(diagnostic) => {
                failures.lock().expect("poisoned failures lock").push((
                    request.pin.to_string(),
                    request.source_path.display().to_string(),
                    diagnostic,
                ));
            }
        });
    });

    let failures = failures.into_inner().expect("poisoned failures lock");
    if !failures.is_empty() {
        return Err(aggregate(failures).unwrap_err());
    }

    let mut built = successes.into_inner().expect("poisoned successes lock");
    built.sort_by(|a, b| a.pin.project_name.cmp(&b.pin.project_name));
    Ok(built)
}
