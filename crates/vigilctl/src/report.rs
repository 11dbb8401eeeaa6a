//! Report emission and exit-code policy
//!
//! A report is always produced, even when the run itself blew up; the
//! exit code only turns non-zero in strict mode.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_STRICT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Final result of one subcommand
#[derive(Debug)]
pub struct CommandOutcome {
    pub report: Value,
    pub exit_code: i32,
}

/// Exit code for a finished run
pub fn exit_code_for(strict: bool, strict_fail_reasons: &[String]) -> i32 {
    if strict && !strict_fail_reasons.is_empty() {
        EXIT_STRICT_FAILURE
    } else {
        EXIT_SUCCESS
    }
}

/// Optionally mirror the report to a secondary file
pub fn write_json_out(report: &Value, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
        }
        let pretty = serde_json::to_string_pretty(report)?;
        std::fs::write(path, pretty)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }
    Ok(())
}

/// Seal a report: mirror it if requested and derive the exit code
pub fn finish(
    report: Value,
    strict: bool,
    strict_fail_reasons: &[String],
    json_out: Option<&Path>,
) -> Result<CommandOutcome> {
    write_json_out(&report, json_out)?;
    Ok(CommandOutcome {
        report,
        exit_code: exit_code_for(strict, strict_fail_reasons),
    })
}

/// Fold an unexpected error into a failure report instead of crashing.
/// Downstream stages read the reason instead of losing the run.
pub fn runtime_failure(command: &str, strict: bool, err: &anyhow::Error) -> CommandOutcome {
    let reasons = vec![format!("runtime_error:{:#}", err)];
    let report = serde_json::json!({
        "command": command,
        "status": "failed",
        "risk_level": "red",
        "strict_fail_reasons": reasons.clone(),
        "risk_reasons": reasons.clone(),
        "strict": strict,
    });
    CommandOutcome {
        exit_code: exit_code_for(strict, &reasons),
        report,
    }
}
