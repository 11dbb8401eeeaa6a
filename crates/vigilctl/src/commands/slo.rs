//! `vigilctl slo` - trailing-window SLO evaluation

use crate::cli::SloArgs;
use crate::report::{self, CommandOutcome};
use anyhow::{Context, Result};
use chrono::Utc;
use vigil_core::digest::Digest;
use vigil_core::store::EventLogStore;
use vigil_core::window::{evaluate_records, SloThresholds};
use vigil_core::VigilConfig;

pub fn run(args: &SloArgs, config: &VigilConfig) -> CommandOutcome {
    match try_run(args, config) {
        Ok(outcome) => outcome,
        Err(err) => report::runtime_failure("slo", args.strict, &err),
    }
}

fn try_run(args: &SloArgs, config: &VigilConfig) -> Result<CommandOutcome> {
    let generated_at = Utc::now();
    let last = args.last.unwrap_or(config.last);
    let thresholds = SloThresholds {
        max_regressions: args
            .max_regressions
            .unwrap_or(config.thresholds.max_regressions),
        max_regression_rate_pct: args
            .max_regression_rate_pct
            .unwrap_or(config.thresholds.max_regression_rate_pct),
        min_green_streak: args
            .min_green_streak
            .unwrap_or(config.thresholds.min_green_streak),
    };

    let store = EventLogStore::new(&args.history_jsonl);
    let records = store
        .read_all()
        .with_context(|| format!("Failed to read {}", args.history_jsonl.display()))?;

    let evaluation = evaluate_records(&records, last, &thresholds);
    let digest = Digest::from_window(&evaluation, generated_at);

    // Validation failures are always fatal in strict mode
    let mut strict_fail_reasons = evaluation.strict_fail_reasons.clone();
    for error in &digest.validation_errors {
        strict_fail_reasons.push(format!("digest_validation_error:{}", error));
    }

    let report = serde_json::json!({
        "command": "slo",
        "generated_at": generated_at,
        "history_jsonl": args.history_jsonl.display().to_string(),
        "last": last,
        "status": digest.status,
        "risk_level": digest.risk_level,
        "evaluation": evaluation,
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
