//! PEP 517 build-backend invocation (spec.md §4.8).
//!
//! Running a hook means importing arbitrary, untrusted Python inside an
//! isolated interpreter this workspace doesn't own or vendor — exactly the
//! kind of foreign-runtime boundary px-fetch's `VcsArchiveBuilder` draws for
//! VCS tooling. The pipeline only resolves which build-system applies and
//! orchestrates concurrency; the hook call itself is an injected capability
//! so this crate never shells out to a real interpreter on its own.

use std::path::Path;

use crate::build_system::BuildSystemSpec;

/// `EX_TEMPFAIL` (BSD `sysexits.h`): the hook-unavailable signal a backend's
/// subprocess wrapper returns when a hook it doesn't implement is called.
pub const EX_TEMPFAIL: i32 = 75;

/// One of the three hooks this pipeline ever needs from a PEP 517 backend.
/// `prepare_metadata_for_build_wheel` and `build_sdist` are optional per the
/// protocol; `build_wheel` is mandatory, so its `NotImplemented` outcome is
/// always treated as a hard failure rather than a signal to fall back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildHook {
    BuildSdist,
    BuildWheel,
    PrepareMetadataForBuildWheel,
}

impl BuildHook {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::BuildSdist => "build_sdist",
            Self::BuildWheel => "build_wheel",
            Self::PrepareMetadataForBuildWheel => "prepare_metadata_for_build_wheel",
        }
    }
}

/// A hook's result: either the relative path of the artifact it produced
/// inside `dest_dir`, or a declaration that the backend doesn't implement
/// this optional hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookOutcome {
    Produced(String),
    NotImplemented,
}

#[derive(Debug, thiserror::Error)]
pub enum InvokerError {
    #[error("build backend exited {exit_code:?}: {stderr}")]
    Failed { exit_code: Option<i32>, stderr: String },
    #[error("build backend reported success but wrote no result file")]
    MissingResult,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Invokes a PEP 517 hook against an already-extracted source tree.
///
/// Implementations run the backend in an isolated subprocess, pass it
/// `build_system`, and read its result back via a temp file holding a
/// single UTF-8 string (the produced artifact's path relative to
/// `dest_dir`), per spec.md §4.8. A subprocess that exits with
/// [`EX_TEMPFAIL`] must be reported as [`HookOutcome::NotImplemented`]
/// rather than an error.
pub trait BuildBackendInvoker: Sync {
    fn invoke(
        &self,
        build_system: &BuildSystemSpec,
        hook: BuildHook,
        source_dir: &Path,
        dest_dir: &Path,
    ) -> Result<HookOutcome, InvokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_names_match_the_pep517_entry_points() {
        assert_eq!(BuildHook::BuildSdist.name(), "build_sdist");
        assert_eq!(BuildHook::BuildWheel.name(), "build_wheel");
        assert_eq!(
            BuildHook::PrepareMetadataForBuildWheel.name(),
            "prepare_metadata_for_build_wheel"
        );
    }
}
