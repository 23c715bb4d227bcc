//! `Fingerprint` value type (spec.md §3).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A content hash: a lowercase algorithm name paired with a lowercase hex
/// digest. Equality is structural, matching the value-type convention the
/// rest of this workspace uses for its `attr.s(frozen=True)`-style types.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    algorithm: String,
    hex_digest: String,
}

impl Fingerprint {
    /// Builds a fingerprint, lowercasing both fields so two fingerprints
    /// that differ only in case compare equal.
    pub fn new(algorithm: impl Into<String>, hex_digest: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into().to_ascii_lowercase(),
            hex_digest: hex_digest.into().to_ascii_lowercase(),
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    #[must_use]
    pub fn hex_digest(&self) -> &str {
        &self.hex_digest
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex_digest)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid fingerprint `{0}`, expected `algorithm:hex_digest`")]
pub struct FingerprintParseError(String);

impl FromStr for Fingerprint {
    type Err = FingerprintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, digest) = s
            .split_once(':')
            .ok_or_else(|| FingerprintParseError(s.to_string()))?;
        if algorithm.is_empty() || digest.is_empty() {
            return Err(FingerprintParseError(s.to_string()));
        }
        Ok(Self::new(algorithm, digest))
    }
}
