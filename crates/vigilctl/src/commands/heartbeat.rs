//! `vigilctl heartbeat` - idempotent heartbeat emission

use crate::cli::HeartbeatArgs;
use crate::report::{self, CommandOutcome};
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use vigil_core::digest::Digest;
use vigil_core::heartbeat;
use vigil_core::store::EventLogStore;
use vigil_core::VigilConfig;

pub fn run(args: &HeartbeatArgs, _config: &VigilConfig) -> CommandOutcome {
    match try_run(args) {
        Ok(outcome) => outcome,
        Err(err) => report::runtime_failure("heartbeat", args.strict, &err),
    }
}

fn try_run(args: &HeartbeatArgs) -> Result<CommandOutcome> {
    let generated_at = Utc::now();
    let digest = load_digest(&args.digest_json)?;

    let store = EventLogStore::new(&args.heartbeat_jsonl);
    let outcome = heartbeat::emit(&store, &digest)
        .with_context(|| format!("Failed to emit to {}", args.heartbeat_jsonl.display()))?;

    // Dedup never suppresses a failed upstream digest
    let strict_fail_reasons = heartbeat::strict_reasons(&digest);

    let report = serde_json::json!({
        "command": "heartbeat",
        "generated_at": generated_at,
        "digest_json": args.digest_json.display().to_string(),
        "heartbeat_jsonl": args.heartbeat_jsonl.display().to_string(),
        "status": digest.status,
        "risk_level": digest.risk_level,
        "heartbeat_id": outcome.record.heartbeat_id,
        "duplicate_detected": outcome.duplicate_detected,
        "appended": outcome.appended,
        "history_size_before": outcome.history_size_before,
        "history_size_after": outcome.history_size_after,
        "record": outcome.record,
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

/// Read a digest from disk. Accepts either a bare digest or a full
/// upstream report with a `digest` field, so slo output pipes straight
/// through. The digest is re-validated on load.
fn load_digest(path: &Path) -> Result<Digest> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let digest_value = match value.get("digest") {
        Some(inner) => inner.clone(),
        None => value,
    };
    let digest: Digest = serde_json::from_value(digest_value)
        .with_context(|| format!("No usable digest in {}", path.display()))?;
    Ok(digest.validated())
}
