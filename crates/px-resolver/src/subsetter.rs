//! Lock Subsetter (C6), spec.md §4.6.
//!
//! Takes one already-selected `LockedResolve` (the output of C5) and a
//! target, and produces the minimal set of `DownloadableArtifact`s needed to
//! satisfy the root requirements for that target: root requirements are
//! filtered by marker, the dependency graph is walked transitively, each
//! included project's version is checked against any declared constraint,
//! and the single best artifact is picked per project using the same
//! ranking policy as the Tag Matcher.

use std::collections::{HashSet, VecDeque};

use pep440_rs::{Version, VersionSpecifiers};
use px_domain::{DownloadableArtifact, DistributionTarget, LockedResolve, Lockfile};

use crate::markers::{self, MarkerError};
use crate::reqexpr::{self, ReqExprError};
use crate::tag_matcher::{rank_artifact, ArtifactPolicy};

#[derive(Debug, thiserror::Error)]
pub enum SubsetError {
    #[error("requirement `{requirement}` references unknown project `{project_name}`")]
    UnknownProject {
        requirement: String,
        project_name: String,
    },
    #[error("marker evaluation failed: {0}")]
    Marker(#[from] MarkerError),
    #[error(transparent)]
    Requirement(#[from] ReqExprError),
    #[error(
        "locked version `{locked}` of `{project_name}` violates constraint `{constraint}`"
    )]
    ConstraintViolation {
        project_name: String,
        locked: String,
        constraint: String,
    },
    #[error("malformed version constraint `{constraint}` for `{project_name}`: {reason}")]
    MalformedConstraint {
        project_name: String,
        constraint: String,
        reason: String,
    },
    #[error("no artifact in `{project_name}` is usable for this target")]
    NoUsableArtifact { project_name: String },
}

/// Computes the transitive, marker-filtered, constraint-checked subset of
/// `resolve` needed to satisfy `lockfile.requirements` under `target`, then
/// picks one best artifact per included project (spec.md §4.6 steps 1-4).
///
/// Results are ordered by project name for determinism (spec.md §4.6
/// invariant: "the same inputs always produce the same output set, in the
/// same order").
pub fn subset(
    lockfile: &Lockfile,
    resolve: &LockedResolve,
    target: &DistributionTarget,
) -> Result<Vec<DownloadableArtifact>, SubsetError> {
    let mut included: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();

    for raw in &lockfile.requirements {
        let expr = reqexpr::parse(raw)?;
        if !marker_allows(expr.marker.as_deref(), target)? {
            continue;
        }
        if resolve.find(&expr.project_name).is_none() {
            return Err(SubsetError::UnknownProject {
                requirement: raw.clone(),
                project_name: expr.project_name,
            });
        }
        if included.insert(expr.project_name.clone()) {
            queue.push_back(expr.project_name);
        }
    }
    tracing::debug!(root_count = included.len(), "lock_subsetter_root_requirements_included");

    if lockfile.transitive {
        while let Some(project_name) = queue.pop_front() {
            let Some(requirement) = resolve.find(&project_name) else {
                continue;
            };
            for raw in &requirement.direct_dependencies {
                let expr = reqexpr::parse(raw)?;
                if !marker_allows(expr.marker.as_deref(), target)? {
                    continue;
                }
                if resolve.find(&expr.project_name).is_none() {
                    // A dependency not present in this resolve is ignored
                    // rather than treated as an error: the resolve may have
                    // pruned platform-irrelevant branches of the graph
                    // already (spec.md §4.6 step 2 operates per-resolve).
                    continue;
                }
                if included.insert(expr.project_name.clone()) {
                    queue.push_back(expr.project_name);
                }
            }
        }
    }

    let mut project_names: Vec<String> = included.into_iter().collect();
    project_names.sort();

    let tag_ranks = target.tag_ranks();
    let tag_count = target.tag_count();
    let policy = ArtifactPolicy::from_lockfile(lockfile);

    let mut artifacts = Vec::with_capacity(project_names.len());
    for project_name in project_names {
        let requirement = resolve
            .find(&project_name)
            .expect("project_name came from this resolve");

        if let Some(constraint) = lockfile.constraints.get(&project_name) {
            check_constraint(&project_name, &requirement.pin.version, constraint)?;
        }

        let best = requirement
            .all_artifacts()
            .filter_map(|artifact| {
                rank_artifact(artifact, &tag_ranks, tag_count, policy).map(|rank| (rank, artifact))
            })
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, artifact)| artifact.clone())
            .ok_or_else(|| SubsetError::NoUsableArtifact {
                project_name: project_name.clone(),
            })?;

        artifacts.push(DownloadableArtifact {
            pin: requirement.pin.clone(),
            artifact: best,
        });
    }

    Ok(artifacts)
}

fn marker_allows(marker: Option<&str>, target: &DistributionTarget) -> Result<bool, MarkerError> {
    match marker {
        None => Ok(true),
        Some(expr) => markers::evaluate(expr, &target.marker_environment),
    }
}

fn check_constraint(project_name: &str, locked_version: &str, constraint: &str) -> Result<(), SubsetError> {
    let specifiers: VersionSpecifiers =
        constraint
            .parse()
            .map_err(|err: <VersionSpecifiers as std::str::FromStr>::Err| SubsetError::MalformedConstraint {
                project_name: project_name.to_string(),
                constraint: constraint.to_string(),
                reason: err.to_string(),
            })?;
    let version: Version = locked_version
        .parse()
        .map_err(|err: <Version as std::str::FromStr>::Err| SubsetError::MalformedConstraint {
            project_name: project_name.to_string(),
            constraint: constraint.to_string(),
            reason: err.to_string(),
        })?;
    if specifiers.contains(&version) {
        Ok(())
    } else {
        Err(SubsetError::ConstraintViolation {
            project_name: project_name.to_string(),
            locked: locked_version.to_string(),
            constraint: constraint.to_string(),
        })
    }
}
