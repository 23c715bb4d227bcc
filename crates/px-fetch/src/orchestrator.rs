//! Download Orchestrator (C7), spec.md §4.7.
//!
//! Drives `ArtifactStore::store` concurrently across a target's
//! `DownloadableArtifact` set through a bounded `rayon` thread pool, sized
//! `N = min(len(artifacts), min(MAX_PARALLEL_DOWNLOADS, 4 * max_jobs))` per
//! spec.md §4.7 and pex's `lock_resolver.py`. Errors are collected, never
//! thrown: a failing task doesn't cancel its peers, and the orchestrator
//! only fails once, at the end, with every failure aggregated.

use std::path::Path;
use std::sync::Mutex;

use px_cache::{ArtifactKind, ArtifactStore, StoreError};
use px_domain::{error::aggregate, Artifact, DownloadableArtifact, DownloadedArtifact, PxError, VcsKind};
use sha2::{Digest, Sha256};

use crate::file_downloader::download_file;
use crate::local_downloader::{archive_directory, resolve_project_root};
use crate::netrc::PasswordDatabase;
use crate::network::NetworkConfig;
use crate::vcs_downloader::VcsArchiveBuilder;

/// Hard ceiling on concurrent downloads, matching pex's
/// `MAX_PARALLEL_DOWNLOADS` (spec.md §4.7): protects package mirrors from
/// hostile hammering regardless of how many jobs the host machine has.
pub const MAX_PARALLEL_DOWNLOADS: usize = 10;

const DEFAULT_ALGORITHM: &str = "sha256";

/// Computes the bounded worker count for a batch of `item_count` downloads
/// given `max_jobs` available cores, per spec.md §4.7.
#[must_use]
pub fn pool_size(item_count: usize, max_jobs: usize) -> usize {
    if item_count == 0 {
        return 1;
    }
    item_count.min(MAX_PARALLEL_DOWNLOADS.min(4 * max_jobs.max(1)))
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Everything a single download task needs beyond the artifact itself.
pub struct DownloadContext<'a> {
    pub store: &'a ArtifactStore,
    pub network: &'a NetworkConfig,
    pub passwords: &'a PasswordDatabase,
    pub path_mappings: &'a [px_domain::PathMapping],
    pub vcs_builder: &'a (dyn VcsArchiveBuilder + Sync),
    pub max_jobs: usize,
}

/// Downloads one artifact into the content-addressed store, dispatching to
/// the downloader variant matching its kind (spec.md §4.4).
fn download_one(ctx: &DownloadContext<'_>, item: &DownloadableArtifact) -> Result<DownloadedArtifact, String> {
    let project_name = item.pin.project_name.as_str();
    let needs_build = !item.artifact.is_wheel();

    match &item.artifact {
        Artifact::File {
            url,
            filename,
            fingerprint,
            ..
        } => {
            let artifact_id = fingerprint.hex_digest().to_string();
            let filename = filename.clone();
            let url = url.clone();
            let stored = ctx
                .store
                .store(ArtifactKind::File, project_name, &artifact_id, Some(fingerprint), |scratch| {
                    download_file(&url, &filename, scratch, DEFAULT_ALGORITHM, ctx.network, ctx.passwords)
                        .map_err(|err| StoreError::Io {
                            path: scratch.join(&filename),
                            source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
                        })
                })
                .map_err(|err| err.to_string())?;
            Ok(DownloadedArtifact {
                pin: item.pin.clone(),
                object_id: stored.fingerprint,
                local_path: stored.path.join(&filename),
                needs_build,
            })
        }
        Artifact::Vcs {
            vcs_kind,
            url,
            reference,
            ..
        } => {
            let artifact_id = sha256_hex(&format!("{vcs_kind}|{url}|{reference}"));
            let vcs_kind = *vcs_kind;
            let url = url.clone();
            let reference = reference.clone();
            let version = item.pin.version.clone();
            let project_name_owned = item.pin.project_name.clone();
            let builder = ctx.vcs_builder;
            let stored = ctx
                .store
                .store(ArtifactKind::Vcs, project_name, &artifact_id, None, |scratch| {
                    let build_scratch = scratch.join("build");
                    std::fs::create_dir_all(&build_scratch).map_err(|source| StoreError::Io {
                        path: build_scratch.clone(),
                        source,
                    })?;
                    let (_, fingerprint) = crate::vcs_downloader::download_vcs(
                        builder,
                        vcs_kind,
                        &url,
                        &reference,
                        &project_name_owned,
                        &version,
                        &build_scratch,
                        scratch,
                        DEFAULT_ALGORITHM,
                    )
                    .map_err(|err| StoreError::Io {
                        path: scratch.to_path_buf(),
                        source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
                    })?;
                    Ok(fingerprint)
                })
                .map_err(|err| err.to_string())?;
            let filename = format!("{}-{}.zip", item.pin.project_name, item.pin.version);
            Ok(DownloadedArtifact {
                pin: item.pin.clone(),
                object_id: stored.fingerprint,
                local_path: stored.path.join(filename),
                needs_build,
            })
        }
        Artifact::LocalProject {
            path_placeholder,
            subdirectory,
            ..
        } => {
            let root = resolve_project_root(path_placeholder, subdirectory.as_deref(), ctx.path_mappings)
                .map_err(|err| err.to_string())?;
            let content_hash = px_cache::directory_hash(&root, DEFAULT_ALGORITHM).map_err(|err| err.to_string())?;
            let artifact_id = sha256_hex(&format!("{}|{}", root.display(), content_hash));
            let version = item.pin.version.clone();
            let project_name_owned = item.pin.project_name.clone();
            let content_hash_for_populate = content_hash.clone();
            let stored = ctx
                .store
                .store(ArtifactKind::Local, project_name, &artifact_id, None, move |scratch| {
                    let filename = format!("{project_name_owned}-{version}.zip");
                    archive_directory(&root, &scratch.join(&filename)).map_err(|err| StoreError::Io {
                        path: scratch.join(&filename),
                        source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
                    })?;
                    Ok(content_hash_for_populate)
                })
                .map_err(|err| err.to_string())?;
            let filename = format!("{}-{}.zip", item.pin.project_name, item.pin.version);
            Ok(DownloadedArtifact {
                pin: item.pin.clone(),
                object_id: stored.fingerprint,
                local_path: stored.path.join(filename),
                needs_build,
            })
        }
    }
}

/// Downloads every `DownloadableArtifact` in `items` concurrently, returning
/// the full set of `DownloadedArtifact`s sorted by project name, or a single
/// aggregated `PxError` listing every failure (spec.md §4.7).
pub fn download_all(ctx: &DownloadContext<'_>, items: &[DownloadableArtifact]) -> Result<Vec<DownloadedArtifact>, PxError> {
    let n = pool_size(items.len(), ctx.max_jobs);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .build()
        .unwrap_or_else(|_| rayon::ThreadPoolBuilder::new().build().expect("default rayon pool"));

    let successes = Mutex::new(Vec::new());
    let failures = Mutex::new(Vec::new());

    pool.install(|| {
        use rayon::prelude::*;
        items.par_iter().for_each(|item| match download_one(ctx, item) {
            Ok(downloaded) => successes.lock().expect("poisoned successes lock").push(downloaded),
            Err(diagnostic) => {
                let url = artifact_url(&item.artifact);
                failures
                    .lock()
                    .expect("poisoned failures lock")
                    .push((item.pin.to_string(), url, diagnostic));
            }
        });
    });

    let failures = failures.into_inner().expect("poisoned failures lock");
    if !failures.is_empty() {
        return Err(aggregate(failures).unwrap_err());
    }

    let mut downloaded = successes.into_inner().expect("poisoned successes lock");
    downloaded.sort_by(|a, b| a.pin.project_name.cmp(&b.pin.project_name));
    Ok(downloaded)
}

fn artifact_url(artifact: &Artifact) -> String {
    match artifact {
        Artifact::File { url, .. } | Artifact::Vcs { url, .. } => url.clone(),
        Artifact::LocalProject { path_placeholder, .. } => format!("${{{path_placeholder}}}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use px_domain::{Fingerprint, PathMapping, Pin};
    use std::path::PathBuf;

    struct NeverCalledVcsBuilder;
    impl VcsArchiveBuilder for NeverCalledVcsBuilder {
        fn build_archive(
            &self,
            _vcs_kind: VcsKind,
            _url: &str,
            _reference: &str,
            _project_name: &str,
            _version: &str,
            _scratch_dir: &Path,
        ) -> Result<Vec<PathBuf>, crate::vcs_downloader::VcsDownloadError> {
            panic!("vcs builder should not be invoked in this test")
        }
    }

    #[test]
    fn pool_size_never_exceeds_max_parallel_downloads() {
        assert_eq!(pool_size(100, 64), MAX_PARALLEL_DOWNLOADS);
    }

    #[test]
    fn pool_size_never_exceeds_item_count() {
        assert_eq!(pool_size(2, 64), 2);
    }

    #[test]
    fn pool_size_scales_with_max_jobs_below_the_cap() {
        assert_eq!(pool_size(100, 1), 4);
    }

    #[test]
    fn pool_size_of_zero_items_is_at_least_one() {
        assert_eq!(pool_size(0, 4), 1);
    }

    #[test]
    fn download_all_aggregates_failures_from_unreachable_hosts() {
        let root = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(root.path().to_path_buf());
        let network = NetworkConfig {
            retries: 0,
            timeout_seconds: 1,
            ..NetworkConfig::default()
        };
        let passwords = PasswordDatabase::new();
        let mappings: Vec<PathMapping> = vec![];
        let vcs_builder = NeverCalledVcsBuilder;
        let ctx = DownloadContext {
            store: &store,
            network: &network,
            passwords: &passwords,
            path_mappings: &mappings,
            vcs_builder: &vcs_builder,
            max_jobs: 2,
        };

        let items = vec![DownloadableArtifact {
            pin: Pin::new("pkg", "1.0"),
            artifact: Artifact::File {
                url: "http://127.0.0.1:1/pkg.whl".into(),
                filename: "pkg-1.0-py3-none-any.whl".into(),
                fingerprint: Fingerprint::new("sha256", "a".repeat(64)),
            },
        }];

        let err = download_all(&ctx, &items).unwrap_err();
        assert!(matches!(err, PxError::Aggregate(1, _)));
    }

    #[test]
    fn download_all_of_empty_set_succeeds_trivially() {
        let root = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(root.path().to_path_buf());
        let network = NetworkConfig::default();
        let passwords = PasswordDatabase::new();
        let mappings: Vec<PathMapping> = vec![];
        let vcs_builder = NeverCalledVcsBuilder;
        let ctx = DownloadContext {
            store: &store,
            network: &network,
            passwords: &passwords,
            path_mappings: &mappings,
            vcs_builder: &vcs_builder,
            max_jobs: 2,
        };
        assert_eq!(download_all(&ctx, &[]).unwrap(), Vec::new());
    }
}
