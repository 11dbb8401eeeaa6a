//! Pairwise regression detection
//!
//! Compares two chronologically adjacent entries and names every
//! directional degradation. Rules are independent and all evaluated;
//! improvements never fire a rule.

use crate::entry::{HealthEntry, LogRecord};

/// Reason reported when either side of a pair is malformed
pub const MALFORMED_HISTORY_REASON: &str = "malformed_history_entry";

/// All regression reasons between `prev` and `cur`, in rule order
pub fn detect_pair(prev: &HealthEntry, cur: &HealthEntry) -> Vec<String> {
    let mut reasons = Vec::new();

    if cur.summary.sections_fail > prev.summary.sections_fail {
        reasons.push("sections_fail_increase".to_string());
    }

    if cur.summary.total_fail > prev.summary.total_fail {
        reasons.push("total_fail_increase".to_string());
    }

    for name in &cur.summary.failed_sections {
        if !prev.summary.failed_sections.contains(name) {
            reasons.push(format!("new_failed_section:{}", name));
        }
    }

    for (key, cur_ok) in &cur.contracts {
        if !cur_ok && prev.contracts.get(key) == Some(&true) {
            reasons.push(format!("contract_degraded:{}", key));
        }
    }

    if !prev.sync_state.would_change && cur.sync_state.would_change {
        reasons.push("sync_would_change_regressed".to_string());
    }

    reasons
}

/// Pair detection over raw log records. A malformed entry on either
/// side forces the single reason `malformed_history_entry`.
pub fn detect_records(prev: &LogRecord, cur: &LogRecord) -> Vec<String> {
    match (&prev.entry, &cur.entry) {
        (Some(p), Some(c)) => detect_pair(p, c),
        _ => vec![MALFORMED_HISTORY_REASON.to_string()],
    }
}
