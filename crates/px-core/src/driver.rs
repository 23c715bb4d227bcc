//! Wires C5 (Tag Matcher) → C6 (Lock Subsetter) → C7 (Download Orchestrator)
//! → C8 (Build Pipeline, for non-wheel artifacts) → C9 (Install Pipeline)
//! into a single entry point per target, plus the exit-code mapping and
//! collision-detection pass of spec.md §6/§7 item 8.

use std::path::PathBuf;

use px_build::{build_all, BuildContext, BuildRequest};
use px_cache::ArtifactStore;
use px_domain::error::ExitCode;
use px_domain::{DistributionTarget, InstalledDistribution, Lockfile, PathMapping, PxError};
use px_fetch::{download_all, DownloadContext, NetworkConfig, PasswordDatabase, PasswordEntry};
use px_install::{detect_collisions, install_all, Collision, InstallContext, InstallRequest};
use px_resolver::{select_best_resolve, subset, ArtifactPolicy, SubsetError};

use crate::build_invoker::SubprocessBuildInvoker;
use crate::vcs::SubprocessVcsBuilder;

/// What to do when [`detect_collisions`] finds two distributions writing
/// divergent content to the same path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Log each collision and continue (the default — spec.md §7: "a shared
    /// ... file is normal and not reported", distinct collisions are still
    /// surfaced but don't fail the run).
    Warn,
    /// Fail the run with [`PxError::Collision`] on the first collision found.
    Fail,
}

impl Default for CollisionPolicy {
    fn default() -> Self {
        Self::Warn
    }
}

/// Everything the driver needs that isn't specific to one target.
pub struct InstallerConfig {
    pub cache_root: PathBuf,
    pub path_mappings: Vec<PathMapping>,
    pub network: NetworkConfig,
    pub extra_passwords: Vec<PasswordEntry>,
    pub max_jobs: usize,
    pub collision_policy: CollisionPolicy,
}

impl InstallerConfig {
    #[must_use]
    pub fn new(cache_root: PathBuf) -> Self {
        Self {
            cache_root,
            path_mappings: Vec::new(),
            network: NetworkConfig::default(),
            extra_passwords: Vec::new(),
            max_jobs: std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get),
            collision_policy: CollisionPolicy::default(),
        }
    }
}

/// One target to resolve and install for: the platform/interpreter/tag
/// description the Tag Matcher scores against, the real interpreter
/// executable to invoke for builds and script shebangs, and whether this
/// target is the host running the installer (disables the wheel-cache
/// bytecode-compile step carried through to C9, per spec.md §4.9).
pub struct TargetRun {
    pub target: DistributionTarget,
    pub interpreter_path: String,
    pub matches_host: bool,
}

/// Everything produced by one target's run.
pub struct RunOutcome {
    pub platform_tag: String,
    pub installed: Vec<InstalledDistribution>,
    pub collisions: Vec<Collision>,
}

/// Runs the full lock-driven install for a single target (spec.md §4.5-§4.9
/// end to end).
pub fn run_target(lockfile: &Lockfile, run: &TargetRun, config: &InstallerConfig) -> Result<RunOutcome, PxError> {
    let policy = ArtifactPolicy::from_lockfile(lockfile);
    let ranked = select_best_resolve(lockfile.locked_resolves.iter(), &run.target, policy).ok_or_else(|| PxError::TargetUnsatisfied {
        target: format!("{}/{}", run.target.interpreter_identity, run.target.platform_identity),
    })?;
    tracing::info!(
        platform_tag = %ranked.locked_resolve.platform_tag,
        average_requirement_rank = ranked.average_requirement_rank,
        "selected_locked_resolve"
    );

    let items = subset(lockfile, &ranked.locked_resolve, &run.target).map_err(map_subset_error)?;
    tracing::info!(artifact_count = items.len(), "lock_subset_computed");

    let store = ArtifactStore::new(config.cache_root.clone());
    let passwords = PasswordDatabase::from_netrc().append(config.extra_passwords.clone());
    let vcs_builder = SubprocessVcsBuilder;
    let download_ctx = DownloadContext {
        store: &store,
        network: &config.network,
        passwords: &passwords,
        path_mappings: &config.path_mappings,
        vcs_builder: &vcs_builder,
        max_jobs: config.max_jobs,
    };
    let downloaded = download_all(&download_ctx, &items)?;

    let (needs_build, ready): (Vec<_>, Vec<_>) = downloaded.into_iter().partition(|artifact| artifact.needs_build);
    tracing::info!(ready = ready.len(), needs_build = needs_build.len(), "download_complete");

    let build_requests: Vec<BuildRequest> = needs_build.iter().map(BuildRequest::from_downloaded).collect();
    let invoker = SubprocessBuildInvoker::new(run.interpreter_path.clone());
    let build_ctx = BuildContext {
        store: &store,
        invoker: &invoker,
        max_jobs: config.max_jobs,
    };
    let built = build_all(&build_ctx, &build_requests)?;

    let mut install_requests: Vec<InstallRequest> = ready
        .into_iter()
        .map(|artifact| InstallRequest {
            pin: artifact.pin,
            wheel_path: artifact.local_path,
            wheel_fingerprint: artifact.object_id,
            target_interpreter_path: run.interpreter_path.clone(),
            target_matches_host: run.matches_host,
        })
        .collect();
    install_requests.extend(built.into_iter().map(|wheel| InstallRequest {
        pin: wheel.pin,
        wheel_path: wheel.wheel_path,
        wheel_fingerprint: wheel.fingerprint,
        target_interpreter_path: run.interpreter_path.clone(),
        target_matches_host: run.matches_host,
    }));

    let install_ctx = InstallContext {
        store: &store,
        max_jobs: config.max_jobs,
    };
    let installed = install_all(&install_ctx, &install_requests)?;

    let collisions = detect_collisions(&installed);
    for collision in &collisions {
        tracing::warn!(
            path = %collision.path,
            first_owner = %collision.first_owner,
            second_owner = %collision.second_owner,
            "install_set_collision"
        );
    }
    if config.collision_policy == CollisionPolicy::Fail {
        if let Some(first) = collisions.first() {
            return Err(PxError::Collision {
                path: first.path.clone(),
                first_owner: first.first_owner.clone(),
                second_owner: first.second_owner.clone(),
            });
        }
    }

    Ok(RunOutcome {
        platform_tag: ranked.locked_resolve.platform_tag,
        installed,
        collisions,
    })
}

/// Runs every target, aggregating per-target failures into a single
/// [`PxError::Aggregate`] rather than stopping at the first one — matching
/// the "never cancel on first failure" convention C7/C8/C9 each already
/// follow internally.
pub fn run_all_targets(lockfile: &Lockfile, runs: &[TargetRun], config: &InstallerConfig) -> Result<Vec<RunOutcome>, PxError> {
    let mut outcomes = Vec::with_capacity(runs.len());
    let mut failures = Vec::new();

    for run in runs {
        let label = format!("{}/{}", run.target.interpreter_identity, run.target.platform_identity);
        match run_target(lockfile, run, config) {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => failures.push((label, run.interpreter_path.clone(), err.to_string())),
        }
    }

    if !failures.is_empty() {
        return Err(px_domain::error::aggregate(failures).unwrap_err());
    }
    Ok(outcomes)
}

/// Maps a `Result` from [`run_target`]/[`run_all_targets`] to the process
/// exit code of spec.md §6.
#[must_use]
pub fn exit_code<T>(result: &Result<T, PxError>) -> i32 {
    match result {
        Ok(_) => ExitCode::Success as i32,
        Err(err) => err.exit_code() as i32,
    }
}

fn map_subset_error(err: SubsetError) -> PxError {
    match err {
        SubsetError::UnknownProject { requirement, project_name } => {
            PxError::LockParse(format!("requirement `{requirement}` references unknown project `{project_name}`"))
        }
        SubsetError::Marker(inner) => PxError::LockParse(inner.to_string()),
        SubsetError::Requirement(inner) => PxError::LockParse(inner.to_string()),
        SubsetError::MalformedConstraint {
            project_name,
            constraint,
            reason,
        } => PxError::LockParse(format!("malformed version constraint `{constraint}` for `{project_name}`: {reason}")),
        SubsetError::ConstraintViolation {
            project_name,
            locked,
            constraint,
        } => PxError::ConstraintViolation {
            project: project_name,
            locked,
            constraint,
        },
        SubsetError::NoUsableArtifact { project_name } => PxError::TargetUnsatisfied {
            target: format!("no usable artifact for `{project_name}`"),
        },
    }
}
