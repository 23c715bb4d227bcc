//! Compatibility tags and distribution targets (spec.md §3, §4.5, GLOSSARY).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// `(interpreter, abi, platform)` triple describing a wheel's or target's
/// binary compatibility profile, e.g. `cp310-cp310-manylinux_2_17_x86_64`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompatibilityTag {
    pub interpreter: String,
    pub abi: String,
    pub platform: String,
}

impl CompatibilityTag {
    #[must_use]
    pub fn new(interpreter: impl Into<String>, abi: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            abi: abi.into(),
            platform: platform.into(),
        }
    }
}

impl fmt::Display for CompatibilityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.interpreter, self.abi, self.platform)
    }
}

impl CompatibilityTag {
    /// Parses a wheel filename's compressed tag segment into every
    /// compatibility triple it expands to (spec.md §4.5 step 2: "parse the
    /// filename's tag segment into one or more compatibility tags").
    ///
    /// A wheel filename is `{name}-{version}(-{build})?-{python}-{abi}-
    /// {platform}.whl` (PEP 427); each of `python`/`abi`/`platform` may
    /// itself be a `.`-separated list compressing several tags into one
    /// filename (PEP 425), e.g. `py2.py3-none-any` expands to two triples.
    /// The full tag set is the cross product of the three lists. Returns an
    /// empty vector if `filename` doesn't end in `.whl` or doesn't split
    /// into the expected number of `-`-separated components.
    #[must_use]
    pub fn from_wheel_filename(filename: &str) -> Vec<Self> {
        let Some(stem) = filename.strip_suffix(".whl") else {
            return Vec::new();
        };
        let parts: Vec<&str> = stem.split('-').collect();
        let (python, abi, platform) = match parts.as_slice() {
            [.., python, abi, platform] if parts.len() == 5 || parts.len() == 6 => (*python, *abi, *platform),
            _ => return Vec::new(),
        };
        let mut tags = Vec::new();
        for interpreter in python.split('.') {
            for abi in abi.split('.') {
                for platform in platform.split('.') {
                    tags.push(Self::new(interpreter, abi, platform));
                }
            }
        }
        tags
    }
}

/// A `(interpreter, platform, tag vector, marker environment)` bundle
/// describing what we're installing for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionTarget {
    pub interpreter_identity: String,
    pub platform_identity: String,
    /// Best match first.
    pub supported_tags: Vec<CompatibilityTag>,
    /// `python_version`, `sys_platform`, etc. Used by the Lock Subsetter's
    /// marker evaluation (spec.md §4.6).
    pub marker_environment: HashMap<String, String>,
}

impl DistributionTarget {
    /// Builds the rank lookup C5 needs: best tag maps to rank 0, each
    /// subsequent tag ranks one worse. Ties are impossible since
    /// `supported_tags` entries are distinct by construction of the
    /// interpreter's tag computation.
    #[must_use]
    pub fn tag_ranks(&self) -> HashMap<CompatibilityTag, usize> {
        self.supported_tags
            .iter()
            .enumerate()
            .map(|(rank, tag)| (tag.clone(), rank))
            .collect()
    }

    #[must_use]
    pub fn tag_count(&self) -> usize {
        self.supported_tags.len()
    }
}
