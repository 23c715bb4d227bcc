//! Data model for the lock-driven resolver/installer core.
//!
//! Mirrors the shape of `px-domain`'s old lockfile/resolution split: types
//! live here, behavior that needs a filesystem or network lives in the
//! downstream `px-cache` / `px-resolver` / `px-fetch` / `px-build` /
//! `px-install` crates.

pub mod error;
pub mod fingerprint;
pub mod lock;
pub mod normalize;
pub mod pathmap;
pub mod target;

pub use error::PxError;
pub use fingerprint::Fingerprint;
pub use lock::{
    Artifact, DownloadableArtifact, DownloadedArtifact, InstalledDistribution, Lockfile,
    LockStyle, LockedRequirement, LockedResolve, Pin, RankedLock, SelectedArtifact, VcsKind,
};
pub use normalize::{canonicalize_version, normalize_project_name};
pub use pathmap::{resolve_placeholders, PathMapping};
pub use target::{CompatibilityTag, DistributionTarget};
