//! `vigilctl compact` - tiered retention compaction

use crate::cli::CompactArgs;
use crate::report::{self, CommandOutcome};
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use vigil_core::compact::{compact_records, RetentionPolicy};
use vigil_core::store::EventLogStore;
use vigil_core::VigilConfig;

pub fn run(args: &CompactArgs, config: &VigilConfig) -> CommandOutcome {
    match try_run(args, config) {
        Ok(outcome) => outcome,
        Err(err) => report::runtime_failure("compact", args.strict, &err),
    }
}

fn try_run(args: &CompactArgs, config: &VigilConfig) -> Result<CommandOutcome> {
    let generated_at = Utc::now();
    let policy = RetentionPolicy {
        keep_recent: args.keep_recent.unwrap_or(config.retention.keep_recent),
        keep_mid_span: args.keep_mid_span.unwrap_or(config.retention.keep_mid_span),
        keep_mid_every: args
            .keep_mid_every
            .unwrap_or(config.retention.keep_mid_every),
        keep_old_every: args
            .keep_old_every
            .unwrap_or(config.retention.keep_old_every),
        min_raw_for_dropped_check: args
            .min_raw_for_dropped_check
            .unwrap_or(config.retention.min_raw_for_dropped_check),
    };

    let store = EventLogStore::new(&args.log_jsonl);
    let records = store
        .read_all()
        .with_context(|| format!("Failed to read {}", args.log_jsonl.display()))?;

    let plan = compact_records(&records, &policy, &args.out_jsonl)
        .with_context(|| format!("Failed to compact into {}", args.out_jsonl.display()))?;

    let mut reason_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for row in &plan.selected {
        for reason in &row.reasons {
            *reason_counts.entry(reason.as_str()).or_default() += 1;
        }
    }

    let strict_fail_reasons = plan.strict_fail_reasons.clone();
    let report = serde_json::json!({
        "command": "compact",
        "generated_at": generated_at,
        "log_jsonl": args.log_jsonl.display().to_string(),
        "out_jsonl": args.out_jsonl.display().to_string(),
        "policy": policy,
        "rows_total": plan.rows_total,
        "rows_selected": plan.rows_selected,
        "rows_dropped": plan.rows_dropped,
        "incidents_total": plan.incidents_total,
        "incidents_selected": plan.incidents_selected,
        "incidents_dropped": plan.incidents_dropped,
        "malformed_total": plan.malformed_total,
        "selection_reason_counts": reason_counts,
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
