//! Build-system resolution (spec.md §4.8): reads a source tree's
//! `pyproject.toml` `[build-system]` table, falling back to the implicit
//! `setuptools`-based backend PEP 517 mandates when the table (or the file
//! itself) is absent.

use std::path::Path;

use serde::Deserialize;

/// The backend every pre-PEP-517 project implicitly targets.
pub const DEFAULT_BUILD_BACKEND: &str = "setuptools.build_meta:__legacy__";
const DEFAULT_REQUIRES: &[&str] = &["setuptools", "wheel"];

/// What to invoke, and what must be on the backend's `sys.path` first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildSystemSpec {
    pub requires: Vec<String>,
    pub build_backend: String,
}

impl Default for BuildSystemSpec {
    fn default() -> Self {
        Self {
            requires: DEFAULT_REQUIRES.iter().map(|s| (*s).to_string()).collect(),
            build_backend: DEFAULT_BUILD_BACKEND.to_string(),
        }
    }
}

#[derive(Deserialize, Default)]
struct PyProjectToml {
    #[serde(rename = "build-system")]
    build_system: Option<BuildSystemTable>,
}

#[derive(Deserialize)]
struct BuildSystemTable {
    #[serde(default)]
    requires: Vec<String>,
    #[serde(rename = "build-backend")]
    build_backend: Option<String>,
}

/// Resolves the build-system spec for the source tree rooted at
/// `source_dir`. Any failure to read or parse `pyproject.toml` — including
/// its absence — falls back to the default backend, matching the PEP 517
/// specification's own fallback rule for projects with no build-system
/// declaration.
#[must_use]
pub fn resolve_build_system(source_dir: &Path) -> BuildSystemSpec {
    let Ok(contents) = std::fs::read_to_string(source_dir.join("pyproject.toml")) else {
        return BuildSystemSpec::default();
    };
    let Ok(parsed) = toml::from_str::<PyProjectToml>(&contents) else {
        return BuildSystemSpec::default();
    };
    let Some(table) = parsed.build_system else {
        return BuildSystemSpec::default();
    };

    BuildSystemSpec {
        requires: if table.requires.is_empty() {
            DEFAULT_REQUIRES.iter().map(|s| (*s).to_string()).collect()
        } else {
            table.requires
        },
        build_backend: table.build_backend.unwrap_or_else(|| DEFAULT_BUILD_BACKEND.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_pyproject_falls_back_to_setuptools() {
        let dir = tempfile::tempdir().unwrap();
        let spec = resolve_build_system(dir.path());
        assert_eq!(spec.build_backend, DEFAULT_BUILD_BACKEND);
        assert_eq!(spec.requires, vec!["setuptools", "wheel"]);
    }

    #[test]
    fn pyproject_without_build_system_table_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pyproject.toml"), b"[project]\nname = \"pkg\"\n").unwrap();
        let spec = resolve_build_system(dir.path());
        assert_eq!(spec.build_backend, DEFAULT_BUILD_BACKEND);
    }

    #[test]
    fn explicit_build_system_table_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pyproject.toml"),
            br#"
[build-system]
requires = ["hatchling"]
build-backend = "hatchling.build"
"#,
        )
        .unwrap();
        let spec = resolve_build_system(dir.path());
        assert_eq!(spec.build_backend, "hatchling.build");
        assert_eq!(spec.requires, vec!["hatchling"]);
    }

    #[test]
    fn empty_requires_list_still_gets_the_default_requirements() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pyproject.toml"),
            br#"
[build-system]
requires = []
build-backend = "custom.backend"
"#,
        )
        .unwrap();
        let spec = resolve_build_system(dir.path());
        assert_eq!(spec.build_backend, "custom.backend");
        assert_eq!(spec.requires, vec!["setuptools", "wheel"]);
    }
}
