//! Path-mapping parsing (spec.md §6).
//!
//! A path mapping binds a `${NAME}` placeholder token, as it appears inside
//! a `LocalProject` artifact's lockfile entry, to an absolute filesystem
//! path. Unlike most other inputs, an unresolved placeholder is a hard
//! parse-time failure: there's no sensible default for "where is the
//! project", so we fail fast rather than defer the error to fetch time.

use std::path::{Path, PathBuf};

use crate::PxError;

/// One `NAME|PATH[|DESCRIPTION]` binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathMapping {
    pub name: String,
    pub path: PathBuf,
    pub description: Option<String>,
}

impl PathMapping {
    /// Parses a single `--path-mapping` argument. `path` must be absolute;
    /// a relative path is ambiguous once the lockfile is consumed from a
    /// different working directory than it was produced in.
    pub fn parse(raw: &str) -> Result<Self, PxError> {
        let mut parts = raw.splitn(3, '|');
        let name = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PxError::LockParse(format!("empty path-mapping name in `{raw}`")))?;
        let path = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PxError::LockParse(format!("missing path in path-mapping `{raw}`")))?;
        let description = parts.next().map(str::to_string);

        let path = PathBuf::from(path);
        if !path.is_absolute() {
            return Err(PxError::LockParse(format!(
                "path-mapping `{name}` must be an absolute path, got `{}`",
                path.display()
            )));
        }

        Ok(Self {
            name: name.to_string(),
            path,
            description,
        })
    }
}

/// Resolves every `${NAME}` placeholder referenced by a `LocalProject`
/// artifact against the supplied mapping table. Any placeholder with no
/// matching mapping is collected and returned as a single
/// `PxError::UnresolvedPlaceholders`, per spec.md §6's fatal-unresolved-
/// placeholder requirement (the orchestrator does not partially resolve a
/// lockfile).
pub fn resolve_placeholders<'a>(
    placeholders: impl IntoIterator<Item = &'a str>,
    mappings: &[PathMapping],
) -> Result<Vec<(&'a str, &'a Path)>, PxError> {
    let mut resolved = Vec::new();
    let mut missing = Vec::new();
    for placeholder in placeholders {
        match mappings.iter().find(|m| m.name == placeholder) {
            Some(mapping) => resolved.push((placeholder, mapping.path.as_path())),
            None => missing.push(placeholder.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(PxError::UnresolvedPlaceholders(missing));
    }
    Ok(resolved)
}
