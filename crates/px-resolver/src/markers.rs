//! PEP 508 marker evaluation against a target's marker environment
//! (spec.md §4.6 step 1/2: "a `{python_version, platform_system, ...}`
//! mapping derived from the target's interpreter identity and platform").
//!
//! Parsing and evaluation are both delegated to `pep508_rs`, the same crate
//! pex and this workspace's teacher rely on for PEP 508 — a hand-rolled
//! marker grammar would just be a second, unmaintained copy of what that
//! crate already gets right (operator precedence, `extra` handling, PEP 440
//! version comparison semantics).

use std::collections::HashMap;
use std::str::FromStr;

use pep508_rs::{MarkerEnvironment, MarkerTree, StringVersion};

#[derive(Debug, thiserror::Error)]
pub enum MarkerError {
    #[error("malformed marker expression `{0}`: {1}")]
    Malformed(String, String),
    #[error("`{field}` is not a valid PEP 440 version for the marker environment: {reason}")]
    InvalidEnvironmentVersion { field: &'static str, reason: String },
}

/// Evaluates `marker` against `environment`. An empty/whitespace-only
/// marker is unconditionally true (spec.md §3: `None` marker means
/// unconditional; this handles the degenerate non-`None` empty-string
/// case the same way).
pub fn evaluate(marker: &str, environment: &HashMap<String, String>) -> Result<bool, MarkerError> {
    if marker.trim().is_empty() {
        return Ok(true);
    }
    let tree = MarkerTree::from_str(marker).map_err(|err| MarkerError::Malformed(marker.to_string(), err.to_string()))?;
    let marker_env = to_marker_environment(environment)?;
    Ok(tree.evaluate(&marker_env, &[]))
}

/// Builds a `pep508_rs::MarkerEnvironment` from a target's free-form
/// `{key: value}` marker environment (spec.md §3). Keys this crate's
/// `MarkerEnvironment` doesn't carry are ignored; keys it requires but
/// `environment` doesn't set default to an empty string (or version `0` for
/// the three version fields), matching pex's handling of an incompletely
/// described target.
fn to_marker_environment(environment: &HashMap<String, String>) -> Result<MarkerEnvironment, MarkerError> {
    let get = |key: &str| environment.get(key).cloned().unwrap_or_default();
    let version = |field: &'static str, value: &str| -> Result<StringVersion, MarkerError> {
        let value = if value.is_empty() { "0" } else { value };
        StringVersion::from_str(value).map_err(|reason| MarkerError::InvalidEnvironmentVersion { field, reason })
    };

    Ok(MarkerEnvironment {
        implementation_name: get("implementation_name"),
        implementation_version: version("implementation_version", &get("implementation_version"))?,
        os_name: get("os_name"),
        platform_machine: get("platform_machine"),
        platform_python_implementation: get("platform_python_implementation"),
        platform_release: get("platform_release"),
        platform_system: get("platform_system"),
        platform_version: get("platform_version"),
        python_full_version: version("python_full_version", &get("python_full_version"))?,
        python_version: version("python_version", &get("python_version"))?,
        sys_platform: get("sys_platform"),
    })
}
