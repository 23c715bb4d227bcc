//! Lockfile data model (spec.md §3, §6).
//!
//! `Lockfile` is the JSON document read from disk; `LockedResolve` and
//! `LockedRequirement` are its per-resolve/per-project contents;
//! `RankedLock`/`DownloadableArtifact`/`DownloadedArtifact`/
//! `InstalledDistribution` are the values the Lock Subsetter (C6), the
//! Download Orchestrator (C7) and the Install Pipeline (C9) pass between
//! each other as a resolve moves through the pipeline.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{CompatibilityTag, Fingerprint, PxError};

/// A locked `(project_name, version)` identity, PEP 503/440 normalized.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pin {
    pub project_name: String,
    pub version: String,
}

impl Pin {
    #[must_use]
    pub fn new(project_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            project_name: crate::normalize_project_name(&project_name.into()),
            version: crate::canonicalize_version(&version.into()),
        }
    }
}

impl std::fmt::Display for Pin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}=={}", self.project_name, self.version)
    }
}

/// One obtainable copy of a pin's content, tagged by provenance.
///
/// Spec.md §4.4/§4.8 treats these three provenances uniformly everywhere
/// except in how C4 actually materializes bytes on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    /// A single fetchable file: wheel or sdist. Compatibility tags aren't
    /// stored — a wheel's filename already carries its compressed tag
    /// segment (e.g. `py2.py3-none-any`), and [`Artifact::compatibility_tags`]
    /// parses it on demand (spec.md §4.5 step 2), matching §3's wire shape
    /// of `{ url, filename, fingerprint, is_wheel }`.
    File {
        url: String,
        filename: String,
        fingerprint: Fingerprint,
    },
    /// A version-control checkout, built on fetch.
    Vcs {
        vcs_kind: VcsKind,
        url: String,
        reference: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fingerprint: Option<Fingerprint>,
    },
    /// A path-mapped local project directory, built on fetch.
    LocalProject {
        /// The `${NAME}` placeholder token this resolves through, per
        /// spec.md §6's path-mapping mechanism.
        path_placeholder: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subdirectory: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fingerprint: Option<Fingerprint>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Git,
    Hg,
    Bzr,
    Svn,
}

impl std::fmt::Display for VcsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Git => "git",
            Self::Hg => "hg",
            Self::Bzr => "bzr",
            Self::Svn => "svn",
        };
        f.write_str(s)
    }
}

/// Filename extensions the Tag Matcher (C5) recognizes as a source archive
/// rather than a wheel (spec.md §4.5 step 2).
const SDIST_EXTENSIONS: &[&str] = &[".tar.gz", ".tgz", ".tar.bz2", ".tbz2", ".zip", ".sdist"];

impl Artifact {
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::File { filename, .. } => Some(filename.as_str()),
            Self::Vcs { .. } | Self::LocalProject { .. } => None,
        }
    }

    #[must_use]
    pub fn is_wheel(&self) -> bool {
        matches!(self.filename(), Some(name) if name.ends_with(".whl"))
    }

    #[must_use]
    pub fn is_sdist(&self) -> bool {
        matches!(self.filename(), Some(name) if SDIST_EXTENSIONS.iter().any(|ext| name.ends_with(ext)))
    }

    /// Parses this artifact's wheel filename into its compatibility tags
    /// (spec.md §4.5 step 2). Empty for sdists, VCS and local-project
    /// artifacts, which carry no tag segment.
    #[must_use]
    pub fn compatibility_tags(&self) -> Vec<CompatibilityTag> {
        match self.filename() {
            Some(name) if self.is_wheel() => CompatibilityTag::from_wheel_filename(name),
            _ => Vec::new(),
        }
    }

    #[must_use]
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            Self::File { fingerprint, .. } => Some(fingerprint),
            Self::Vcs { fingerprint, .. } | Self::LocalProject { fingerprint, .. } => {
                fingerprint.as_ref()
            }
        }
    }
}

/// One locked project entry within a resolve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LockedRequirement {
    pub pin: Pin,
    /// PEP 508 marker expression text gating whether this project is ever
    /// considered for inclusion under a given target's marker environment,
    /// evaluated by the Lock Subsetter (spec.md §4.6) at evaluation time.
    /// `None` means unconditional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    /// Direct dependencies of this project at this pin, as PEP 508
    /// requirement strings (each may itself carry a marker), used to
    /// compute the transitive closure.
    pub direct_dependencies: Vec<String>,
    /// The primary artifact (spec.md GLOSSARY: the preferred source, usually
    /// an sdist) plus zero or more alternative wheels.
    pub primary_artifact: Artifact,
    #[serde(default)]
    pub additional_artifacts: Vec<Artifact>,
}

impl LockedRequirement {
    #[must_use]
    pub fn all_artifacts(&self) -> impl Iterator<Item = &Artifact> {
        std::iter::once(&self.primary_artifact).chain(self.additional_artifacts.iter())
    }
}

/// Locking granularity, per spec.md §3 GLOSSARY.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStyle {
    /// One resolve, pinned to exactly the interpreter/platform it was
    /// produced on.
    Strict,
    /// One resolve per declared source, each still platform-specific.
    Sources,
    /// One resolve, valid across platforms via marker environments instead
    /// of per-platform pins.
    CrossPlatform,
    /// One resolve that must satisfy every supported platform
    /// simultaneously; artifacts are chosen per-platform at install time.
    Universal,
}

/// One resolve within a lockfile: a platform-tagged bag of
/// `LockedRequirement`s. Project names are unique within a resolve
/// (spec.md §3 invariant) and the list is kept ordered by project name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LockedResolve {
    /// The platform this resolve was produced for/against. Used only as a
    /// deterministic tie-break key when two resolves rank equally
    /// (spec.md §3 `RankedLock`); it plays no role in scoring.
    pub platform_tag: String,
    pub locked_requirements: Vec<LockedRequirement>,
}

impl LockedResolve {
    /// Validates the "unique project names within a resolve" invariant
    /// (spec.md §3).
    pub fn validate(&self) -> Result<(), PxError> {
        let mut seen = std::collections::HashSet::new();
        for req in &self.locked_requirements {
            if !seen.insert(&req.pin.project_name) {
                return Err(PxError::LockParse(format!(
                    "duplicate project `{}` within locked resolve `{}`",
                    req.pin.project_name, self.platform_tag
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn find(&self, project_name: &str) -> Option<&LockedRequirement> {
        self.locked_requirements
            .iter()
            .find(|req| req.pin.project_name == project_name)
    }
}

/// The JSON document on disk (spec.md §6: "Lockfile on disk. A JSON
/// document..."), mirroring the field set of spec.md §3's `Lockfile`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lockfile {
    pub style: LockStyle,
    pub resolver_version: String,
    /// Root PEP 508 requirement strings seeding the Lock Subsetter's
    /// transitive closure (spec.md §4.6 step 1).
    pub requirements: Vec<String>,
    /// Normalized project name to a PEP 440 version specifier set string,
    /// e.g. `">=1.0,<2.0"` (spec.md §4.6 step 3).
    #[serde(default)]
    pub constraints: HashMap<String, String>,
    #[serde(default)]
    pub allow_prereleases: bool,
    #[serde(default = "default_true")]
    pub allow_wheels: bool,
    #[serde(default = "default_true")]
    pub allow_builds: bool,
    #[serde(default)]
    pub prefer_older_binary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_pep517: Option<bool>,
    #[serde(default = "default_true")]
    pub build_isolation: bool,
    #[serde(default = "default_true")]
    pub transitive: bool,
    pub locked_resolves: Vec<LockedResolve>,
    /// Free-text provenance note (e.g. the command line that produced this
    /// lock). Excluded from hash/equality per spec.md §3.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Lockfile {
    /// Parses and validates a lockfile, enforcing the "at least one locked
    /// resolve" and "unique project names per resolve" invariants
    /// (spec.md §3) that JSON structure alone cannot express.
    pub fn parse(json: &str) -> Result<Self, PxError> {
        let lockfile: Self =
            serde_json::from_str(json).map_err(|err| PxError::LockParse(err.to_string()))?;
        lockfile.validate()?;
        Ok(lockfile)
    }

    pub fn validate(&self) -> Result<(), PxError> {
        if self.locked_resolves.is_empty() {
            return Err(PxError::LockParse(
                "lockfile must contain at least one locked resolve".to_string(),
            ));
        }
        for resolve in &self.locked_resolves {
            resolve.validate()?;
        }
        Ok(())
    }
}

/// `source` is explicitly excluded from equality per spec.md §3.
impl PartialEq for Lockfile {
    fn eq(&self, other: &Self) -> bool {
        self.style == other.style
            && self.resolver_version == other.resolver_version
            && self.requirements == other.requirements
            && self.constraints == other.constraints
            && self.allow_prereleases == other.allow_prereleases
            && self.allow_wheels == other.allow_wheels
            && self.allow_builds == other.allow_builds
            && self.prefer_older_binary == other.prefer_older_binary
            && self.use_pep517 == other.use_pep517
            && self.build_isolation == other.build_isolation
            && self.transitive == other.transitive
            && self.locked_resolves == other.locked_resolves
    }
}

/// Output of the Tag Matcher (C5): a `LockedResolve` paired with how well it
/// scores against a `DistributionTarget` (spec.md §3). Transient — built
/// fresh per selection call, never persisted.
#[derive(Clone, Debug)]
pub struct RankedLock {
    /// Arithmetic mean of each locked requirement's best artifact rank.
    /// Lower is better.
    pub average_requirement_rank: f64,
    pub locked_resolve: LockedResolve,
}

impl PartialEq for RankedLock {
    fn eq(&self, other: &Self) -> bool {
        self.average_requirement_rank == other.average_requirement_rank
            && self.locked_resolve == other.locked_resolve
    }
}

/// Total ordering per spec.md §3: ascending by rank, ties broken by
/// `platform_tag` lexicographic order.
impl PartialOrd for RankedLock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for RankedLock {}

impl Ord for RankedLock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.average_requirement_rank
            .partial_cmp(&other.average_requirement_rank)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                self.locked_resolve
                    .platform_tag
                    .cmp(&other.locked_resolve.platform_tag)
            })
    }
}

/// One project's highest-ranked artifact within a resolve, selected for a
/// specific `DistributionTarget` (spec.md §4.5/§4.6's shared artifact
/// ranking policy).
#[derive(Clone, Debug, PartialEq)]
pub struct SelectedArtifact {
    pub pin: Pin,
    pub artifact: Artifact,
    /// Lower is better; see `DistributionTarget::tag_ranks`.
    pub rank: usize,
}

/// Input to C4/C7: an artifact paired with the project it belongs to.
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadableArtifact {
    pub pin: Pin,
    pub artifact: Artifact,
}

/// Output of C4/C7: the artifact's bytes now live in the content-addressed
/// store, identified by `object_id`, with fingerprint verified (if the
/// artifact carried one).
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadedArtifact {
    pub pin: Pin,
    pub object_id: Fingerprint,
    pub local_path: PathBuf,
    /// `true` when the artifact still needs C8 (sdist, VCS checkout, local
    /// project); `false` when it's an already-built wheel ready for C9.
    pub needs_build: bool,
}

/// Output of C9: a single project installed into a target prefix.
#[derive(Clone, Debug, PartialEq)]
pub struct InstalledDistribution {
    pub pin: Pin,
    pub distribution_dir: PathBuf,
    pub installed_files: Vec<PathBuf>,
    pub record_path: PathBuf,
}
