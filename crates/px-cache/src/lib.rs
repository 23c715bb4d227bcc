//! Content hashing, atomic directory publication and the content-addressed
//! artifact store (spec.md §4.1-§4.3, C1-C3).

pub mod atomic;
pub mod hasher;
pub mod store;

pub use atomic::{acquire_exclusive, acquire_shared, AtomicError, ScratchDir};
pub use hasher::{digest_vcs_archive, directory_hash, streaming_hash_and_copy, streaming_hasher, HashError};
pub use store::{ArtifactKind, ArtifactStore, StoreError, StoredArtifact};
