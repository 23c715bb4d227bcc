//! Parses a `--target` argument's JSON descriptor file into a
//! `px_core::TargetRun`: the `DistributionTarget` the Tag Matcher scores
//! resolves against, plus the two things only a caller (not the lockfile)
//! knows — which real interpreter executable to run builds and launcher
//! shebangs with, and whether this target describes the host running `px`
//! itself.

use std::path::Path;

use color_eyre::eyre::{Context, Result};
use px_core::TargetRun;
use px_domain::DistributionTarget;
use serde::Deserialize;

#[derive(Deserialize)]
struct TargetFile {
    #[serde(flatten)]
    target: DistributionTarget,
    interpreter_path: String,
    #[serde(default)]
    matches_host: bool,
}

/// Reads and parses a single target descriptor file.
pub fn load(path: &Path) -> Result<TargetRun> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading target descriptor `{}`", path.display()))?;
    let parsed: TargetFile =
        serde_json::from_str(&contents).with_context(|| format!("parsing target descriptor `{}`", path.display()))?;
    Ok(TargetRun {
        target: parsed.target,
        interpreter_path: parsed.interpreter_path,
        matches_host: parsed.matches_host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_a_flattened_target_descriptor() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "interpreter_identity": "cpython-3.10",
                "platform_identity": "linux-x86_64",
                "supported_tags": [{{"interpreter": "py3", "abi": "none", "platform": "any"}}],
                "marker_environment": {{"sys_platform": "linux"}},
                "interpreter_path": "/usr/bin/python3.10",
                "matches_host": true
            }}"#
        )
        .unwrap();

        let run = load(file.path()).unwrap();
        assert_eq!(run.target.interpreter_identity, "cpython-3.10");
        assert_eq!(run.interpreter_path, "/usr/bin/python3.10");
        assert!(run.matches_host);
    }

    #[test]
    fn matches_host_defaults_to_false() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "interpreter_identity": "cpython-3.10",
                "platform_identity": "linux-x86_64",
                "supported_tags": [],
                "marker_environment": {{}},
                "interpreter_path": "/usr/bin/python3.10"
            }}"#
        )
        .unwrap();

        let run = load(file.path()).unwrap();
        assert!(!run.matches_host);
    }
}
