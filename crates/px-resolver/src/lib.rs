//! Tag Matcher (C5) and Lock Subsetter (C6), spec.md §4.5-§4.6.
//!
//! Consumes the data model from `px-domain`; produces no side effects of its
//! own (no network, no disk) — purely a scoring and set-selection layer
//! between the parsed `Lockfile` and the Download Orchestrator.

pub mod markers;
pub mod reqexpr;
pub mod subsetter;
pub mod tag_matcher;

pub use subsetter::{subset, SubsetError};
pub use tag_matcher::{rank_artifact, score_locked_resolve, select_best_resolve, ArtifactPolicy};
