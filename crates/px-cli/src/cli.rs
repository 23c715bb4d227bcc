//! Command-line surface: argument parsing only. Every actual operation
//! (resolve, subset, download, build, install) lives in `px-core`; this
//! binary's only job is turning flags into the types that crate's
//! `run_all_targets` entry point expects and mapping its `Result` to a
//! process exit code.

use std::path::PathBuf;

use clap::Parser;

/// Installs a lockfile's requirements into one or more targets.
#[derive(Parser, Debug)]
#[command(name = "px", version, about)]
pub struct Cli {
    /// Path to the JSON lockfile (spec.md §3).
    #[arg(long)]
    pub lockfile: PathBuf,

    /// Path to a target descriptor JSON file: a `DistributionTarget` plus
    /// `interpreter_path` (and optional `matches_host`). Repeatable — one
    /// install run happens per target.
    #[arg(long = "target", required = true, num_args = 1)]
    pub targets: Vec<PathBuf>,

    /// `name|absolute-path[|description]`, repeatable. Resolves
    /// `${name}`-style placeholders in local-project artifact paths
    /// (spec.md §6).
    #[arg(long = "map")]
    pub path_mappings: Vec<String>,

    /// Root of the content-addressed artifact store (spec.md §4.3).
    /// Defaults to `PX_CACHE_DIR`, falling back to the platform cache dir.
    #[arg(long)]
    pub cache_root: Option<PathBuf>,

    /// Upper bound on concurrent downloads/builds/installs. Defaults to
    /// the host's available parallelism.
    #[arg(long)]
    pub max_jobs: Option<usize>,

    /// Fail the run instead of warning when two installed distributions
    /// write divergent content to the same path (spec.md §7).
    #[arg(long)]
    pub fail_on_collision: bool,

    /// HTTP retry count for transient download failures.
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Per-request network timeout, in seconds.
    #[arg(long, default_value_t = 60)]
    pub timeout_seconds: u64,

    /// Outbound HTTP/HTTPS proxy URL.
    #[arg(long)]
    pub proxy: Option<String>,

    /// `-v` for debug logging, `-vv` for trace.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
