//! Error taxonomy (spec.md §7) and the exit-code mapping (spec.md §6).
//!
//! One variant per taxonomy entry, each carrying the context the spec calls
//! out explicitly. Follows the `px-core::StoreError` convention of a stable
//! short code per variant so aggregated failures can be listed numbered,
//! with context, the way §7's orchestrator aggregation requires.

use crate::Fingerprint;

/// Top-level error type returned by every core operation.
#[derive(Debug, thiserror::Error)]
pub enum PxError {
    #[error("[PX101] failed to parse lockfile: {0}")]
    LockParse(String),

    #[error("[PX101] unresolved path-mapping placeholder(s): {}", .0.join(", "))]
    UnresolvedPlaceholders(Vec<String>),

    #[error("[PX201] no locked resolve satisfies target `{target}`")]
    TargetUnsatisfied { target: String },

    #[error("[PX202] `{project}` version `{locked}` violates constraint `{constraint}`")]
    ConstraintViolation {
        project: String,
        locked: String,
        constraint: String,
    },

    #[error(
        "[PX301] fingerprint mismatch for `{artifact}`: expected {expected}, found {actual}"
    )]
    FingerprintMismatch {
        artifact: String,
        expected: Fingerprint,
        actual: Fingerprint,
    },

    #[error("[PX302] download of `{url}` failed: {reason}")]
    DownloadTransport { url: String, reason: String },

    #[error("[PX401] build of `{project}` failed (exit {exit_code:?}): {stderr}")]
    Build {
        project: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("[PX501] install of `{project}` failed: {reason}")]
    Install { project: String, reason: String },

    #[error(
        "[PX601] `{path}` receives divergent content from `{first_owner}` and `{second_owner}`"
    )]
    Collision {
        path: String,
        first_owner: String,
        second_owner: String,
    },

    #[error("[PX700] cache publication failed: {0}")]
    Cache(String),

    #[error("[PX900] {0} error(s) occurred:\n{}", format_aggregate(.0, .1))]
    Aggregate(usize, Vec<String>),
}

fn format_aggregate(_count: &usize, messages: &[String]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(i, m)| format!("  {}. {m}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Process exit codes for the core driver (spec.md §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    UserError = 1,
    ResolveFailure = 2,
    DownloadFailure = 3,
    BuildFailure = 4,
    InstallFailure = 5,
}

impl PxError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::LockParse(_) | Self::UnresolvedPlaceholders(_) => ExitCode::UserError,
            Self::TargetUnsatisfied { .. } | Self::ConstraintViolation { .. } => {
                ExitCode::ResolveFailure
            }
            Self::FingerprintMismatch { .. } | Self::DownloadTransport { .. } => {
                ExitCode::DownloadFailure
            }
            Self::Build { .. } => ExitCode::BuildFailure,
            Self::Install { .. } => ExitCode::InstallFailure,
            Self::Collision { .. } | Self::Cache(_) => ExitCode::DownloadFailure,
            Self::Aggregate(_, _) => ExitCode::DownloadFailure,
        }
    }
}

/// Collects per-pin/url diagnostics from a batch of fallible tasks into a
/// single terminal error, numbered, per spec.md §4.7/§7. Returns `Ok(())`
/// when `errors` is empty.
pub fn aggregate(errors: Vec<(String, String, String)>) -> Result<(), PxError> {
    if errors.is_empty() {
        return Ok(());
    }
    let count = errors.len();
    let messages = errors
        .into_iter()
        .map(|(pin, url, diagnostic)| format!("{pin} ({url}): {diagnostic}"))
        .collect();
    Err(PxError::Aggregate(count, messages))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_error_list_aggregates_to_ok() {
        assert!(aggregate(Vec::new()).is_ok());
    }

    #[test]
    fn nonempty_error_list_aggregates_to_single_error() {
        let err = aggregate(vec![
            ("a==1".into(), "https://x/a".into(), "timeout".into()),
            ("b==2".into(), "https://x/b".into(), "404".into()),
        ])
        .unwrap_err();
        assert!(matches!(err, PxError::Aggregate(2, _)));
        assert_eq!(err.exit_code(), ExitCode::DownloadFailure);
    }

    #[test]
    fn fingerprint_mismatch_maps_to_download_failure_exit_code() {
        let err = PxError::FingerprintMismatch {
            artifact: "ansicolors-1.1.8-py3-none-any.whl".into(),
            expected: Fingerprint::new("sha256", "aaaa"),
            actual: Fingerprint::new("sha256", "bbbb"),
        };
        assert_eq!(err.exit_code(), ExitCode::DownloadFailure);
    }
}
