//! PEP 508 requirement-string parsing (spec.md §4.6).
//!
//! The Lock Subsetter only ever needs a requirement-expr's project name (to
//! look it up in a `LockedResolve`, which already carries the resolved
//! version) and its marker text (to decide inclusion for a target); it
//! never needs the expr's own version specifier, since the lock — not the
//! requirement string — is the source of truth for what version is
//! installed. Parsing itself is still full PEP 508, via `pep508_rs`, so
//! extras, quoting and marker grammar all follow the same rules pex and
//! pip use rather than a second, partial implementation of them.

use std::str::FromStr;

use pep508_rs::Requirement;

/// A parsed requirement-expr: just enough to drive subsetting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequirementExpr {
    pub project_name: String,
    pub marker: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("malformed requirement `{requirement}`: {reason}")]
pub struct ReqExprError {
    pub requirement: String,
    pub reason: String,
}

/// Parses `raw` as a PEP 508 requirement string, keeping only its project
/// name (normalized the same way `px_domain::normalize_project_name`
/// normalizes a `Pin`, so lookups against a `LockedResolve`'s requirements
/// always line up) and its marker expression text, if any.
pub fn parse(raw: &str) -> Result<RequirementExpr, ReqExprError> {
    let requirement = Requirement::from_str(raw.trim()).map_err(|err| ReqExprError {
        requirement: raw.to_string(),
        reason: err.to_string(),
    })?;
    Ok(RequirementExpr {
        project_name: px_domain::normalize_project_name(requirement.name.as_ref()),
        marker: requirement.marker.as_ref().map(ToString::to_string),
    })
}
