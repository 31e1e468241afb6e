// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cinderflow runner - headless host for flow graphs
//!
//! Loads runner settings (`runner.ron`, or the path given as the first
//! argument), builds the configured graph description against the standard
//! node library and ticks it for the configured number of frames.
//! `cinderflow --init [path]` writes a default settings file instead.

mod inspector;
mod run;
mod settings;

use settings::{RunnerSettings, DEFAULT_LOG_FILTER, SETTINGS_FILE_NAME};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_tracing(directives: &str) {
    let mut env_filter = EnvFilter::from_default_env();
    let mut rejected = Vec::new();
    for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        match directive.parse() {
            Ok(directive) => env_filter = env_filter.add_directive(directive),
            Err(_) => rejected.push(directive.to_owned()),
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    for directive in rejected {
        tracing::warn!("Ignoring invalid log directive '{directive}'");
    }
}

fn write_default_settings(path: &Path) {
    match RunnerSettings::default().save(path) {
        Ok(()) => tracing::info!("Wrote default settings to {}", path.display()),
        Err(e) => {
            tracing::error!("Failed to write {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}

fn main() {
    let mut args = std::env::args().skip(1).peekable();
    let init = args.next_if(|arg| arg == "--init").is_some();
    let settings_path = args
        .next()
        .map_or_else(|| PathBuf::from(SETTINGS_FILE_NAME), PathBuf::from);

    if init {
        init_tracing(DEFAULT_LOG_FILTER);
        write_default_settings(&settings_path);
        return;
    }

    let settings = RunnerSettings::load(&settings_path);
    init_tracing(settings.as_ref().map_or(DEFAULT_LOG_FILTER, |s| s.log_filter.as_str()));

    tracing::info!("Starting Cinderflow runner v{}", env!("CARGO_PKG_VERSION"));

    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Failed to load {}: {e}", settings_path.display());
            std::process::exit(1);
        }
    };

    let base = settings_path.parent().unwrap_or_else(|| Path::new("."));
    if let Err(e) = run::run(&settings, base) {
        tracing::error!("Run failed: {e}");
        std::process::exit(1);
    }
}
