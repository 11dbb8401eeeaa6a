//! Idempotent heartbeat emission
//!
//! Derives a deterministic, content-based identity for a digest and
//! appends it to a heartbeat log exactly once. Re-running over an
//! unchanged digest never grows the log.

use crate::digest::Digest;
use crate::entry::{DigestStatus, RiskLevel};
use crate::error::VigilError;
use crate::store::EventLogStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One deduplicated trace record per distinct upstream digest outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    /// Taken from the digest's `generated_at`, so that re-emitting an
    /// unchanged digest produces an identical record.
    pub run_at: DateTime<Utc>,

    pub heartbeat_id: String,
    pub status: DigestStatus,
    pub risk_level: RiskLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_generated_at: Option<DateTime<Utc>>,

    pub regressions_in_window: u64,
    pub regression_rate_pct: f64,

    pub strict_fail_reasons: Vec<String>,
    pub risk_reasons: Vec<String>,
}

/// Result of one emission attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatOutcome {
    pub record: HeartbeatRecord,
    pub duplicate_detected: bool,
    pub appended: bool,
    pub history_size_before: usize,
    pub history_size_after: usize,
}

/// Pipe-joined identity over the digest fields that define "the same
/// outcome". Any change upstream changes the id; a re-read of the same
/// digest does not.
pub fn heartbeat_id(digest: &Digest) -> String {
    let upstream = digest
        .upstream_generated_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "none".to_string());
    format!(
        "{}|{}|{}|{}|{}|{}",
        upstream,
        digest.generated_at.to_rfc3339(),
        digest.status,
        digest.risk_level,
        digest.metric_u64("regressions_in_window").unwrap_or(0),
        digest.metric_f64("regression_rate_pct").unwrap_or(0.0),
    )
}

/// Build the heartbeat record for a digest
pub fn build_record(digest: &Digest) -> HeartbeatRecord {
    HeartbeatRecord {
        run_at: digest.generated_at,
        heartbeat_id: heartbeat_id(digest),
        status: digest.status,
        risk_level: digest.risk_level,
        upstream_generated_at: digest.upstream_generated_at,
        regressions_in_window: digest.metric_u64("regressions_in_window").unwrap_or(0),
        regression_rate_pct: digest.metric_f64("regression_rate_pct").unwrap_or(0.0),
        strict_fail_reasons: digest.strict_fail_reasons.clone(),
        risk_reasons: digest.risk_reasons.clone(),
    }
}

/// Append the digest's heartbeat to `store` unless a record with the
/// same id already exists.
pub fn emit(store: &EventLogStore, digest: &Digest) -> Result<HeartbeatOutcome, VigilError> {
    let record = build_record(digest);
    let history = store.read_all()?;
    let history_size_before = history.len();

    let duplicate_detected = history.iter().any(|rec| {
        rec.entry
            .as_ref()
            .and_then(|e| e.heartbeat_id.as_deref())
            .map_or(false, |id| id == record.heartbeat_id)
    });

    if duplicate_detected {
        debug!(
            "heartbeat {} already present in {}, skipping append",
            record.heartbeat_id,
            store.path().display()
        );
        return Ok(HeartbeatOutcome {
            record,
            duplicate_detected: true,
            appended: false,
            history_size_before,
            history_size_after: history_size_before,
        });
    }

    store.append_record(&record)?;
    info!(
        "appended heartbeat {} ({}) to {}",
        record.heartbeat_id,
        record.status,
        store.path().display()
    );

    Ok(HeartbeatOutcome {
        record,
        duplicate_detected: false,
        appended: true,
        history_size_before,
        history_size_after: history_size_before + 1,
    })
}

/// Strict-mode reasons for a heartbeat invocation. Dedup must not
/// suppress observability of a failed upstream digest.
pub fn strict_reasons(digest: &Digest) -> Vec<String> {
    let mut reasons = Vec::new();
    if digest.status == DigestStatus::Failed {
        reasons.push("upstream_digest_failed".to_string());
    }
    for error in &digest.validation_errors {
        reasons.push(format!("digest_validation_error:{}", error));
    }
    reasons
}
