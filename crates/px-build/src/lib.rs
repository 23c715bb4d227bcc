//! Build Pipeline (C8), spec.md §4.8: turns `needs_build` downloaded
//! artifacts (sdists, VCS checkouts, local project directories) into
//! wheels via PEP 517, ready for C9 to install.

pub mod build_system;
pub mod extract;
pub mod invoker;
pub mod pipeline;

pub use build_system::{resolve_build_system, BuildSystemSpec, DEFAULT_BUILD_BACKEND};
pub use extract::{extract_source_archive, locate_source_root, ExtractError};
pub use invoker::{BuildBackendInvoker, BuildHook, HookOutcome, InvokerError, EX_TEMPFAIL};
pub use pipeline::{build_all, pool_size, BuildContext, BuildRequest, BuiltWheel, MAX_PARALLEL_BUILDS};
