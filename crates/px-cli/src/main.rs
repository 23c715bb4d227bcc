//! Thin binary: parses arguments, builds the lockfile/target/config inputs
//! `px-core::run_all_targets` needs, and maps its result to a process exit
//! code (spec.md §6). No argument-parsing logic belongs in `px-core`, and
//! no resolve/download/build/install logic belongs here.

mod cli;
mod target_file;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::{eyre, Context, Result};

use px_core::{exit_code, run_all_targets, CollisionPolicy, InstallerConfig};
use px_domain::{Lockfile, PathMapping};
use px_fetch::NetworkConfig;

use cli::Cli;

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let lockfile_json = std::fs::read_to_string(&cli.lockfile).with_context(|| format!("reading lockfile `{}`", cli.lockfile.display()))?;
    let lockfile = Lockfile::parse(&lockfile_json).map_err(|err| eyre!("{err}"))?;

    let mut path_mappings = Vec::with_capacity(cli.path_mappings.len());
    for raw in &cli.path_mappings {
        path_mappings.push(PathMapping::parse(raw).map_err(|err| eyre!("{err}"))?);
    }

    let mut runs = Vec::with_capacity(cli.targets.len());
    for path in &cli.targets {
        runs.push(target_file::load(path)?);
    }

    let cache_root = match &cli.cache_root {
        Some(root) => root.clone(),
        None => px_cache::ArtifactStore::default_root().map_err(|err| eyre!("{err}"))?,
    };

    let proxy = cli
        .proxy
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(|err: url::ParseError| eyre!("invalid --proxy url: {err}"))?;

    let mut config = InstallerConfig::new(cache_root);
    config.path_mappings = path_mappings;
    config.network = NetworkConfig {
        retries: cli.retries,
        timeout_seconds: cli.timeout_seconds,
        proxy,
        ..NetworkConfig::default()
    };
    if let Some(max_jobs) = cli.max_jobs {
        config.max_jobs = max_jobs;
    }
    if cli.fail_on_collision {
        config.collision_policy = CollisionPolicy::Fail;
    }

    let result = run_all_targets(&lockfile, &runs, &config);
    let code = exit_code(&result);

    match &result {
        Ok(outcomes) => {
            for outcome in outcomes {
                tracing::info!(
                    platform_tag = %outcome.platform_tag,
                    installed = outcome.installed.len(),
                    collisions = outcome.collisions.len(),
                    "target_install_complete"
                );
            }
        }
        Err(err) => tracing::error!("{err}"),
    }

    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = format!("px={level},px_cli={level},px_core={level},px_domain={level}");
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
