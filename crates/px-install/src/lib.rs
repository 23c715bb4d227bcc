//! Install Pipeline (C9), spec.md §4.9: installs wheels into
//! content-addressed per-distribution prefixes and flags cross-distribution
//! file collisions (spec.md §7).

pub mod collision;
pub mod entrypoints;
pub mod installer;
pub mod record;
pub mod script;
pub mod wheel_reader;

pub use collision::{detect_collisions, Collision};
pub use entrypoints::{parse_entry_points, EntryPoint, ScriptKind};
pub use installer::{install_all, pool_size, InstallContext, InstallRequest, MAX_PARALLEL_INSTALLS};
pub use record::{read_record, write_record, RecordEntry, RecordError};
pub use wheel_reader::{find_dist_info_dir, unpack_wheel_files, WheelReadError};
