//! `vigilctl parity` - raw/compacted coverage verification

use crate::cli::ParityArgs;
use crate::report::{self, CommandOutcome};
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use vigil_core::digest::Digest;
use vigil_core::parity;
use vigil_core::store::EventLogStore;
use vigil_core::VigilConfig;

pub fn run(args: &ParityArgs, config: &VigilConfig) -> CommandOutcome {
    match try_run(args, config) {
        Ok(outcome) => outcome,
        Err(err) => report::runtime_failure("parity", args.strict, &err),
    }
}

fn try_run(args: &ParityArgs, config: &VigilConfig) -> Result<CommandOutcome> {
    let generated_at = Utc::now();
    let last = args.last.unwrap_or(config.last);

    let raw = EventLogStore::new(&args.raw_jsonl)
        .read_all()
        .with_context(|| format!("Failed to read {}", args.raw_jsonl.display()))?;
    let compacted = EventLogStore::new(&args.compacted_jsonl)
        .read_all()
        .with_context(|| format!("Failed to read {}", args.compacted_jsonl.display()))?;

    let result = parity::check(&raw, &compacted, last);
    let digest = parity_digest(&result, &raw, generated_at);

    let mut strict_fail_reasons = result.strict_fail_reasons.clone();
    for error in &digest.validation_errors {
        strict_fail_reasons.push(format!("digest_validation_error:{}", error));
    }

    let report = serde_json::json!({
        "command": "parity",
        "generated_at": generated_at,
        "raw_jsonl": args.raw_jsonl.display().to_string(),
        "compacted_jsonl": args.compacted_jsonl.display().to_string(),
        "last": last,
        "status": digest.status,
        "risk_level": digest.risk_level,
        "parity": result,
        "digest": digest,
        "strict": args.strict,
        "strict_fail_reasons": strict_fail_reasons.clone(),
    });

    report::finish(
        report,
        args.strict,
        &strict_fail_reasons,
        args.json_out.as_deref(),
    )
}

/// Collapse a parity result into the digest shape consumed by the next
/// cascade stage.
fn parity_digest(
    result: &parity::ParityResult,
    raw: &[vigil_core::LogRecord],
    generated_at: chrono::DateTime<Utc>,
) -> Digest {
    let mut key_metrics = BTreeMap::new();
    key_metrics.insert("rows_in_window".to_string(), result.rows_in_window.into());
    key_metrics.insert(
        "rows_present_in_compacted".to_string(),
        result.rows_present_in_compacted.into(),
    );
    key_metrics.insert(
        "rows_missing_in_compacted".to_string(),
        result.rows_missing_in_compacted.into(),
    );
    key_metrics.insert(
        "incidents_in_window".to_string(),
        result.incidents_in_window.into(),
    );
    key_metrics.insert(
        "incidents_present_in_compacted".to_string(),
        result.incidents_present_in_compacted.into(),
    );
    key_metrics.insert(
        "incidents_missing_in_compacted".to_string(),
        result.incidents_missing_in_compacted.into(),
    );
    key_metrics.insert(
        "raw_window_coverage_pct".to_string(),
        result.raw_window_coverage_pct.into(),
    );
    key_metrics.insert(
        "incident_coverage_pct".to_string(),
        result.incident_coverage_pct.into(),
    );

    let mut key_checks = BTreeMap::new();
    key_checks.insert(
        "window_non_empty".to_string(),
        result.rows_in_window > 0,
    );
    key_checks.insert("newest_raw_present".to_string(), result.newest_raw_present);
    key_checks.insert(
        "no_malformed_in_window".to_string(),
        result.malformed_in_window == 0,
    );
    key_checks.insert(
        "no_malformed_in_compacted".to_string(),
        result.malformed_in_compacted == 0,
    );
    key_checks.insert(
        "all_incidents_present".to_string(),
        result.incidents_missing_in_compacted == 0,
    );

    let upstream_generated_at = raw.iter().rev().find_map(|r| r.run_at());

    Digest::from_reasons(
        generated_at,
        upstream_generated_at,
        key_metrics,
        key_checks,
        result.risk_reasons.clone(),
        result.strict_fail_reasons.clone(),
        !result.strict_fail_reasons.is_empty(),
    )
}
