//! Command-line surface for vigilctl
//!
//! Every subcommand prints one pretty JSON report to stdout. Exit code
//! 0 means the invocation ran (the report may still document failure),
//! 1 means a strict-mode violation, 2 means an argument error.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vigilctl")]
#[command(about = "Vigil - health-event log and tiered-retention monitor", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate the trailing window of a health log against SLO thresholds
    Slo(SloArgs),

    /// Derive a heartbeat from a digest and append it idempotently
    Heartbeat(HeartbeatArgs),

    /// Rewrite a log under the tiered retention policy
    Compact(CompactArgs),

    /// Verify a compacted stream covers the trailing raw window
    Parity(ParityArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Slo(_) => "slo",
            Self::Heartbeat(_) => "heartbeat",
            Self::Compact(_) => "compact",
            Self::Parity(_) => "parity",
        }
    }

    pub fn strict(&self) -> bool {
        match self {
            Self::Slo(args) => args.strict,
            Self::Heartbeat(args) => args.strict,
            Self::Compact(args) => args.strict,
            Self::Parity(args) => args.strict,
        }
    }
}

#[derive(Args)]
pub struct SloArgs {
    /// Health history log (JSONL)
    #[arg(long, value_name = "PATH")]
    pub history_jsonl: PathBuf,

    /// Trailing window size
    #[arg(long, value_name = "N")]
    pub last: Option<usize>,

    /// Maximum regressing transitions tolerated in the window
    #[arg(long, value_name = "N")]
    pub max_regressions: Option<u64>,

    /// Maximum regression rate tolerated, in percent
    #[arg(long, value_name = "PCT")]
    pub max_regression_rate_pct: Option<f64>,

    /// Minimum consecutive clean entries ending at the newest
    #[arg(long, value_name = "N")]
    pub min_green_streak: Option<u64>,

    /// Also write the report to this path
    #[arg(long, value_name = "PATH")]
    pub json_out: Option<PathBuf>,

    /// Exit non-zero on threshold or validation violations
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct HeartbeatArgs {
    /// Digest to emit a heartbeat for; either a bare digest or a
    /// full slo report containing one
    #[arg(long, value_name = "PATH")]
    pub digest_json: PathBuf,

    /// Heartbeat log to append to (JSONL)
    #[arg(long, value_name = "PATH")]
    pub heartbeat_jsonl: PathBuf,

    /// Also write the report to this path
    #[arg(long, value_name = "PATH")]
    pub json_out: Option<PathBuf>,

    /// Exit non-zero when the upstream digest failed
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct CompactArgs {
    /// Log to compact (JSONL); never modified in place
    #[arg(long, value_name = "PATH")]
    pub log_jsonl: PathBuf,

    /// Compacted output path (JSONL)
    #[arg(long, value_name = "PATH")]
    pub out_jsonl: PathBuf,

    /// Rows younger than this are all kept
    #[arg(long, value_name = "N")]
    pub keep_recent: Option<usize>,

    /// Width of the mid tier that follows the recent tier
    #[arg(long, value_name = "N")]
    pub keep_mid_span: Option<usize>,

    /// Sampling cadence inside the mid tier
    #[arg(long, value_name = "N")]
    pub keep_mid_every: Option<usize>,

    /// Sampling cadence beyond the mid tier
    #[arg(long, value_name = "N")]
    pub keep_old_every: Option<usize>,

    /// Below this row count, dropping nothing is acceptable
    #[arg(long, value_name = "N")]
    pub min_raw_for_dropped_check: Option<usize>,

    /// Also write the report to this path
    #[arg(long, value_name = "PATH")]
    pub json_out: Option<PathBuf>,

    /// Exit non-zero on retention guarantee violations
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct ParityArgs {
    /// Raw log (JSONL)
    #[arg(long, value_name = "PATH")]
    pub raw_jsonl: PathBuf,

    /// Previously compacted counterpart (JSONL)
    #[arg(long, value_name = "PATH")]
    pub compacted_jsonl: PathBuf,

    /// Trailing raw window size to verify
    #[arg(long, value_name = "N")]
    pub last: Option<usize>,

    /// Also write the report to this path
    #[arg(long, value_name = "PATH")]
    pub json_out: Option<PathBuf>,

    /// Exit non-zero on coverage violations
    #[arg(long)]
    pub strict: bool,
}
