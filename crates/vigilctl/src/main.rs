//! Vigil Control - CLI entry point

use clap::Parser;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use vigilctl::cli::Cli;
use vigilctl::logging::CtlLogEntry;
use vigilctl::{commands, report};
use vigil_core::VigilConfig;

fn main() {
    // Diagnostics go to stderr; stdout carries only the JSON report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("VIGIL_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Argument errors exit 2 with usage on stderr, no report
    let cli = Cli::parse();
    let start_time = Instant::now();
    let req_id = CtlLogEntry::generate_req_id();

    let config = match VigilConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("failed to load config, using defaults: {:#}", err);
            VigilConfig::default()
        }
    };

    let outcome = commands::dispatch(&cli.command, &config);

    match serde_json::to_string_pretty(&outcome.report) {
        Ok(pretty) => println!("{}", pretty),
        Err(err) => {
            // Should be unreachable for reports we build ourselves
            eprintln!("failed to render report: {}", err);
        }
    }

    let log_entry = CtlLogEntry {
        ts: CtlLogEntry::now(),
        req_id,
        command: cli.command.name().to_string(),
        args: std::env::args().skip(1).collect(),
        exit_code: outcome.exit_code,
        duration_ms: start_time.elapsed().as_millis() as u64,
        ok: outcome.exit_code == report::EXIT_SUCCESS,
    };
    let _ = log_entry.write();

    std::process::exit(outcome.exit_code);
}
