//! Project-name and version normalization (spec.md §3 "Pin").

use pep440_rs::Version;

/// Lowercases `name` and collapses runs of `-`, `_`, `.` into a single `-`,
/// per PEP 503. `Django__Admin` and `django-admin` normalize identically.
pub fn normalize_project_name(name: &str) -> String {
    let lowered = name.to_ascii_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut in_run = false;
    for ch in lowered.chars() {
        if matches!(ch, '-' | '_' | '.') {
            if !in_run && !out.is_empty() {
                out.push('-');
            }
            in_run = true;
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Canonicalizes a PEP 440 version string, preserving pre-release/local
/// suffixes. Falls back to the trimmed input if it fails to parse, since a
/// lockfile entry that fails PEP 440 parsing is still a structural version
/// token the rest of the pipeline must be able to compare for equality.
pub fn canonicalize_version(raw: &str) -> String {
    match raw.trim().parse::<Version>() {
        Ok(version) => version.to_string(),
        Err(_) => raw.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_separator_runs() {
        assert_eq!(normalize_project_name("Django__Admin"), "django-admin");
        assert_eq!(normalize_project_name("zope.interface"), "zope-interface");
        assert_eq!(normalize_project_name("foo...bar"), "foo-bar");
    }

    #[test]
    fn already_normalized_is_idempotent() {
        let normalized = normalize_project_name("ansicolors");
        assert_eq!(normalize_project_name(&normalized), normalized);
    }

    #[test]
    fn canonicalizes_prerelease_and_local_suffix() {
        assert_eq!(canonicalize_version("1.0.0a1"), "1.0.0a1");
        assert_eq!(canonicalize_version("1.0+local.1"), "1.0+local.1");
        assert_eq!(canonicalize_version("01.02.00"), "1.2.0");
    }
}
