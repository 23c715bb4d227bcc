//! Tag Matcher (C5), spec.md §4.5.
//!
//! Scores a `LockedResolve` against a target's supported-tag vector: every
//! locked requirement must have at least one usable artifact (a wheel whose
//! tag the target supports, or — one rank worse than any wheel — an sdist)
//! or the whole resolve is rejected for that target.

use std::collections::HashMap;

use px_domain::{Artifact, CompatibilityTag, DistributionTarget, Lockfile, LockedRequirement, LockedResolve, RankedLock};

/// Which artifact kinds a lockfile permits the ranking policy to consider,
/// per spec.md §3's `allow_wheels`/`allow_builds` lockfile fields and §8
/// scenario 2 ("sdist fallback": `allow_wheels=false` forces the sdist to
/// be the chosen artifact even when a usable wheel exists).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArtifactPolicy {
    pub allow_wheels: bool,
    pub allow_builds: bool,
}

impl Default for ArtifactPolicy {
    fn default() -> Self {
        Self {
            allow_wheels: true,
            allow_builds: true,
        }
    }
}

impl ArtifactPolicy {
    #[must_use]
    pub fn from_lockfile(lockfile: &Lockfile) -> Self {
        Self {
            allow_wheels: lockfile.allow_wheels,
            allow_builds: lockfile.allow_builds,
        }
    }
}

/// Ranks a single artifact against a target's tag-rank table (spec.md §4.5
/// step 2). `None` means the artifact cannot be used for this target at
/// all: a wheel whose tags are all unsupported, a VCS/local-project
/// artifact (which carries no filename to rank), or a kind `policy`
/// excludes (wheels when `allow_wheels` is false; sdists, which require a
/// build, when `allow_builds` is false).
#[must_use]
pub fn rank_artifact(
    artifact: &Artifact,
    tag_ranks: &HashMap<CompatibilityTag, usize>,
    tag_count: usize,
    policy: ArtifactPolicy,
) -> Option<usize> {
    if artifact.is_sdist() {
        if !policy.allow_builds {
            return None;
        }
        // One worse than the worst possible wheel rank: usable, but only
        // as a last resort behind every wheel the target supports.
        return Some(tag_count);
    }
    if artifact.is_wheel() {
        if !policy.allow_wheels {
            return None;
        }
        return artifact
            .compatibility_tags()
            .iter()
            .filter_map(|tag| tag_ranks.get(tag).copied())
            .min();
    }
    None
}

/// Scores one locked requirement: the minimum rank across its primary and
/// additional artifacts, or `None` if none of them are usable for this
/// target (spec.md §4.5 steps 1-4).
#[must_use]
pub fn score_requirement(
    requirement: &LockedRequirement,
    tag_ranks: &HashMap<CompatibilityTag, usize>,
    tag_count: usize,
    policy: ArtifactPolicy,
) -> Option<usize> {
    requirement
        .all_artifacts()
        .filter_map(|artifact| rank_artifact(artifact, tag_ranks, tag_count, policy))
        .min()
}

/// Scores an entire locked resolve against a target: the mean of every
/// requirement's rank, or `None` the moment any requirement has no usable
/// artifact (spec.md §4.5: "abort and return `None`").
#[must_use]
pub fn score_locked_resolve(resolve: &LockedResolve, target: &DistributionTarget, policy: ArtifactPolicy) -> Option<RankedLock> {
    let tag_count = target.tag_count();
    // spec.md §9 design note: division by the requirement count assumes the
    // matcher never runs against a target with zero supported tags; that
    // precondition is enforced upstream (a `DistributionTarget` with an
    // empty `supported_tags` is rejected before it ever reaches here).
    debug_assert!(tag_count > 0, "target must have at least one supported tag");
    let tag_ranks = target.tag_ranks();

    let mut total = 0usize;
    let mut count = 0usize;
    for requirement in &resolve.locked_requirements {
        let Some(rank) = score_requirement(requirement, &tag_ranks, tag_count, policy) else {
            tracing::debug!(
                platform_tag = %resolve.platform_tag,
                project_name = %requirement.pin.project_name,
                "locked_resolve_rejected_no_usable_artifact"
            );
            return None;
        };
        total += rank;
        count += 1;
    }
    let average_requirement_rank = if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    };
    Some(RankedLock {
        average_requirement_rank,
        locked_resolve: resolve.clone(),
    })
}

/// Selects the best-scoring resolve across all candidates (spec.md §4.5
/// "Selection across resolves"): discards resolves that can't satisfy the
/// target at all, then picks the minimum by the `RankedLock` total order
/// (ascending rank, `platform_tag` lexicographic tie-break).
#[must_use]
pub fn select_best_resolve<'a>(
    resolves: impl IntoIterator<Item = &'a LockedResolve>,
    target: &DistributionTarget,
    policy: ArtifactPolicy,
) -> Option<RankedLock> {
    resolves
        .into_iter()
        .filter_map(|resolve| score_locked_resolve(resolve, target, policy))
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use px_domain::{Fingerprint, Pin};

    fn target(tags: Vec<CompatibilityTag>) -> DistributionTarget {
        DistributionTarget {
            interpreter_identity: "cpython-3.10".into(),
            platform_identity: "linux-x86_64".into(),
            supported_tags: tags,
            marker_environment: HashMap::new(),
        }
    }

    /// Builds a wheel artifact whose filename's compressed tag segment
    /// parses back into exactly `tags` (a cartesian product of each
    /// component's distinct values in order of first appearance — exact
    /// whenever `tags` is itself such a product, which every call site below
    /// is, each passing a single tag).
    fn wheel(tags: Vec<CompatibilityTag>) -> Artifact {
        let interpreters = unique_components(&tags, |t| t.interpreter.as_str());
        let abis = unique_components(&tags, |t| t.abi.as_str());
        let platforms = unique_components(&tags, |t| t.platform.as_str());
        let filename = format!("pkg-1.0-{}-{}-{}.whl", interpreters.join("."), abis.join("."), platforms.join("."));
        Artifact::File {
            url: "https://example/pkg.whl".into(),
            filename,
            fingerprint: Fingerprint::new("sha256", "a".repeat(64)),
        }
    }

    fn unique_components<'a>(tags: &'a [CompatibilityTag], pick: impl Fn(&'a CompatibilityTag) -> &'a str) -> Vec<&'a str> {
        let mut seen: Vec<&str> = Vec::new();
        for tag in tags {
            let value = pick(tag);
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        seen
    }

    fn sdist() -> Artifact {
        Artifact::File {
            url: "https://example/pkg.tar.gz".into(),
            filename: "pkg-1.0.tar.gz".into(),
            fingerprint: Fingerprint::new("sha256", "b".repeat(64)),
        }
    }

    fn requirement(artifact: Artifact, additional: Vec<Artifact>) -> LockedRequirement {
        LockedRequirement {
            pin: Pin::new("pkg", "1.0"),
            marker: None,
            direct_dependencies: vec![],
            primary_artifact: artifact,
            additional_artifacts: additional,
        }
    }

    #[test]
    fn universal_wheel_ranks_zero_and_beats_sdist() {
        let any = CompatibilityTag::new("py3", "none", "any");
        let t = target(vec![
            CompatibilityTag::new("cp310", "cp310", "manylinux_2_17_x86_64"),
            any.clone(),
        ]);
        let resolve = LockedResolve {
            platform_tag: "linux".into(),
            locked_requirements: vec![requirement(wheel(vec![any]), vec![sdist()])],
        };
        let ranked = score_locked_resolve(&resolve, &t, ArtifactPolicy::default()).expect("resolve should score");
        assert_eq!(ranked.average_requirement_rank, 1.0);
    }

    #[test]
    fn sdist_only_ranks_as_one_worse_than_any_wheel() {
        let t = target(vec![
            CompatibilityTag::new("cp310", "cp310", "manylinux_2_17_x86_64"),
            CompatibilityTag::new("py3", "none", "any"),
        ]);
        let resolve = LockedResolve {
            platform_tag: "linux".into(),
            locked_requirements: vec![requirement(sdist(), vec![])],
        };
        let ranked = score_locked_resolve(&resolve, &t, ArtifactPolicy::default()).unwrap();
        assert_eq!(ranked.average_requirement_rank, 2.0);
    }

    #[test]
    fn resolve_with_no_usable_artifact_for_a_requirement_is_rejected() {
        let t = target(vec![CompatibilityTag::new("cp310", "cp310", "manylinux_2_17_x86_64")]);
        let unusable_wheel = wheel(vec![CompatibilityTag::new("cp39", "cp39", "win_amd64")]);
        let resolve = LockedResolve {
            platform_tag: "win32".into(),
            locked_requirements: vec![requirement(unusable_wheel, vec![])],
        };
        assert!(score_locked_resolve(&resolve, &t, ArtifactPolicy::default()).is_none());
    }

    #[test]
    fn select_best_resolve_breaks_ties_by_platform_tag() {
        let t = target(vec![CompatibilityTag::new("py3", "none", "any")]);
        let tag = CompatibilityTag::new("py3", "none", "any");
        let resolve_a = LockedResolve {
            platform_tag: "zzz".into(),
            locked_requirements: vec![requirement(wheel(vec![tag.clone()]), vec![])],
        };
        let resolve_b = LockedResolve {
            platform_tag: "aaa".into(),
            locked_requirements: vec![requirement(wheel(vec![tag]), vec![])],
        };
        let best = select_best_resolve([&resolve_a, &resolve_b], &t, ArtifactPolicy::default()).unwrap();
        assert_eq!(best.locked_resolve.platform_tag, "aaa");
    }

    #[test]
    fn select_best_resolve_returns_none_when_every_resolve_is_unsatisfiable() {
        let t = target(vec![CompatibilityTag::new("cp310", "cp310", "manylinux_2_17_x86_64")]);
        let resolve = LockedResolve {
            platform_tag: "win32".into(),
            locked_requirements: vec![requirement(
                wheel(vec![CompatibilityTag::new("cp310", "cp310", "win_amd64")]),
                vec![],
            )],
        };
        assert!(select_best_resolve([&resolve], &t, ArtifactPolicy::default()).is_none());
    }

    #[test]
    fn allow_wheels_false_forces_sdist_selection_over_a_usable_wheel() {
        // spec.md §8 scenario 2: same lock, `allow_wheels=false`. Expect the
        // sdist to be the only usable artifact, ranked `tag_count`.
        let any = CompatibilityTag::new("py3", "none", "any");
        let t = target(vec![
            CompatibilityTag::new("cp310", "cp310", "manylinux_2_17_x86_64"),
            any.clone(),
        ]);
        let policy = ArtifactPolicy {
            allow_wheels: false,
            allow_builds: true,
        };
        let resolve = LockedResolve {
            platform_tag: "linux".into(),
            locked_requirements: vec![requirement(wheel(vec![any]), vec![sdist()])],
        };
        let ranked = score_locked_resolve(&resolve, &t, policy).expect("sdist fallback should score");
        assert_eq!(ranked.average_requirement_rank, 2.0);
    }

    #[test]
    fn allow_builds_false_excludes_sdist_leaving_no_usable_artifact() {
        let t = target(vec![CompatibilityTag::new("cp310", "cp310", "manylinux_2_17_x86_64")]);
        let policy = ArtifactPolicy {
            allow_wheels: true,
            allow_builds: false,
        };
        let resolve = LockedResolve {
            platform_tag: "linux".into(),
            locked_requirements: vec![requirement(sdist(), vec![])],
        };
        assert!(score_locked_resolve(&resolve, &t, policy).is_none());
    }

    #[test]
    fn allow_wheels_false_with_no_sdist_leaves_no_usable_artifact() {
        let any = CompatibilityTag::new("py3", "none", "any");
        let t = target(vec![any.clone()]);
        let policy = ArtifactPolicy {
            allow_wheels: false,
            allow_builds: true,
        };
        let resolve = LockedResolve {
            platform_tag: "linux".into(),
            locked_requirements: vec![requirement(wheel(vec![any]), vec![])],
        };
        assert!(score_locked_resolve(&resolve, &t, policy).is_none());
    }
}
