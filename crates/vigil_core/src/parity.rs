//! Raw/compacted parity verification
//!
//! Checks that every raw row in a trailing window - and especially
//! every incident - is still present in the compacted counterpart of
//! the same log. Row identity is content-derived: `heartbeat_id`, then
//! `run_at`, then the line number as a last resort.

use crate::entry::LogRecord;
use crate::window::round4;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Stable identity for one row
pub fn row_identity(record: &LogRecord) -> String {
    if let Some(entry) = &record.entry {
        if let Some(id) = &entry.heartbeat_id {
            return id.clone();
        }
        return entry.run_at.to_rfc3339();
    }
    format!("line:{}", record.line_no)
}

/// Outcome of one parity check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParityResult {
    pub rows_in_window: usize,
    pub rows_present_in_compacted: usize,
    pub rows_missing_in_compacted: usize,

    pub incidents_in_window: usize,
    pub incidents_present_in_compacted: usize,
    pub incidents_missing_in_compacted: usize,

    /// present / window * 100; 0 for an empty window
    pub raw_window_coverage_pct: f64,

    /// Incident coverage; 100 when the window has no incidents
    pub incident_coverage_pct: f64,

    pub missing_identities: Vec<String>,
    pub malformed_in_window: usize,
    pub malformed_in_compacted: usize,
    pub newest_raw_present: bool,

    pub strict_fail_reasons: Vec<String>,
    pub risk_reasons: Vec<String>,
}

/// Verify the trailing `last` raw rows against a compacted stream.
pub fn check(raw: &[LogRecord], compacted: &[LogRecord], last: usize) -> ParityResult {
    let window_start = raw.len().saturating_sub(last);
    let window = &raw[window_start..];

    let index: BTreeSet<String> = compacted.iter().map(row_identity).collect();
    let malformed_in_compacted = compacted.iter().filter(|r| r.is_malformed()).count();

    let mut present = 0usize;
    let mut incidents = 0usize;
    let mut incidents_present = 0usize;
    let mut missing_identities = Vec::new();
    let mut missing_incident_identities = Vec::new();
    let mut newest_raw_present = false;

    for (pos, record) in window.iter().enumerate() {
        let identity = row_identity(record);
        let is_present = index.contains(&identity);
        let is_newest = pos == window.len() - 1;

        if is_present {
            present += 1;
            if is_newest {
                newest_raw_present = true;
            }
        } else {
            missing_identities.push(identity.clone());
        }

        if record.has_incident() {
            incidents += 1;
            if is_present {
                incidents_present += 1;
            } else {
                missing_incident_identities.push(identity);
            }
        }
    }

    let rows_in_window = window.len();
    let rows_missing = rows_in_window - present;
    let incidents_missing = incidents - incidents_present;
    let malformed_in_window = window.iter().filter(|r| r.is_malformed()).count();

    let raw_window_coverage_pct = if rows_in_window == 0 {
        0.0
    } else {
        round4(present as f64 / rows_in_window as f64 * 100.0)
    };
    let incident_coverage_pct = if incidents == 0 {
        100.0
    } else {
        round4(incidents_present as f64 / incidents as f64 * 100.0)
    };

    let mut strict_fail_reasons = Vec::new();
    if rows_in_window == 0 {
        strict_fail_reasons.push("window_empty".to_string());
    }
    if malformed_in_window > 0 {
        strict_fail_reasons.push(format!("malformed_raw_in_window:{}", malformed_in_window));
    }
    if malformed_in_compacted > 0 {
        strict_fail_reasons.push(format!(
            "compacted_contains_malformed:{}",
            malformed_in_compacted
        ));
    }
    if rows_in_window > 0 && !newest_raw_present {
        strict_fail_reasons.push("newest_raw_missing".to_string());
    }
    for identity in &missing_incident_identities {
        strict_fail_reasons.push(format!("incident_missing:{}", identity));
    }

    let mut risk_reasons = strict_fail_reasons.clone();
    if rows_missing > 0 {
        risk_reasons.push(format!("rows_missing_in_compacted:{}", rows_missing));
    }

    debug!(
        "parity: {}/{} rows present, {}/{} incidents present",
        present, rows_in_window, incidents_present, incidents
    );

    ParityResult {
        rows_in_window,
        rows_present_in_compacted: present,
        rows_missing_in_compacted: rows_missing,
        incidents_in_window: incidents,
        incidents_present_in_compacted: incidents_present,
        incidents_missing_in_compacted: incidents_missing,
        raw_window_coverage_pct,
        incident_coverage_pct,
        missing_identities,
        malformed_in_window,
        malformed_in_compacted,
        newest_raw_present,
        strict_fail_reasons,
        risk_reasons,
    }
}
