//! Health entry model and line codec
//!
//! One `HealthEntry` per JSONL line. The schema is validated once at the
//! log-read boundary: a line that fails to parse becomes a tagged
//! `LogRecord` with no entry, never a batch failure. Unknown payload
//! fields survive a parse/serialize round trip via `extra`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Digest status carried by heartbeat-shaped entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestStatus {
    Ok,
    Degraded,
    Failed,
}

impl DigestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DigestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Red/amber/green risk verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Green,
    Amber,
    Red,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Amber => "amber",
            Self::Red => "red",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure counters extracted from every entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntrySummary {
    /// Count of failing sections
    #[serde(default)]
    pub sections_fail: u64,

    /// Total failing checks across all sections
    #[serde(default)]
    pub total_fail: u64,

    /// Names of failing sections, in report order
    #[serde(default)]
    pub failed_sections: Vec<String>,
}

impl EntrySummary {
    pub fn is_empty(&self) -> bool {
        self.sections_fail == 0 && self.total_fail == 0 && self.failed_sections.is_empty()
    }
}

/// Downstream-staleness marker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// True means a downstream artifact is stale relative to source.
    /// Absence of the whole object is read as false.
    #[serde(default)]
    pub would_change: bool,
}

impl SyncState {
    pub fn is_default(&self) -> bool {
        !self.would_change
    }
}

/// One observation in an append-only health log
///
/// The same shape serves every cascade layer: raw bundle history rows use
/// `summary`/`contracts`/`sync_state`, heartbeat rows additionally carry
/// `heartbeat_id`/`status`/`risk_level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthEntry {
    /// Observation timestamp (UTC, RFC3339) - required
    pub run_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "EntrySummary::is_empty")]
    pub summary: EntrySummary,

    /// Named boolean checks; an absent key is never a failure
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contracts: BTreeMap<String, bool>,

    #[serde(default, skip_serializing_if = "SyncState::is_default")]
    pub sync_state: SyncState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DigestStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,

    /// Layer-specific payload fields, preserved verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl HealthEntry {
    /// Minimal entry with the given timestamp and no findings
    pub fn new(run_at: DateTime<Utc>) -> Self {
        Self {
            run_at,
            summary: EntrySummary::default(),
            contracts: BTreeMap::new(),
            sync_state: SyncState::default(),
            heartbeat_id: None,
            status: None,
            risk_level: None,
            extra: BTreeMap::new(),
        }
    }

    /// An entry with zero failures, no pending sync, every present
    /// contract true, and (for heartbeat-shaped rows) an ok/green verdict.
    pub fn is_clean(&self) -> bool {
        self.summary.sections_fail == 0
            && self.summary.total_fail == 0
            && !self.sync_state.would_change
            && self.contracts.values().all(|ok| *ok)
            && self.status.map_or(true, |s| s == DigestStatus::Ok)
            && self.risk_level.map_or(true, |r| r == RiskLevel::Green)
    }

    /// Anomaly predicate shared by compaction and parity: any failing
    /// count, pending sync, false contract flag, or failed/red verdict.
    pub fn has_incident(&self) -> bool {
        self.summary.sections_fail > 0
            || self.summary.total_fail > 0
            || self.sync_state.would_change
            || self.contracts.values().any(|ok| !*ok)
            || self.status == Some(DigestStatus::Failed)
            || self.risk_level == Some(RiskLevel::Red)
    }
}

/// One line as read from disk
///
/// `entry` is `None` when the line failed JSON parse or schema
/// validation; such records carry their line number through every
/// aggregation as an automatic incident.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// 1-based line number in the source file
    pub line_no: usize,

    /// Raw line text, kept verbatim for compaction passthrough
    pub raw: String,

    pub entry: Option<HealthEntry>,

    /// Parse error text for malformed lines
    pub parse_error: Option<String>,
}

impl LogRecord {
    pub fn is_malformed(&self) -> bool {
        self.entry.is_none()
    }

    /// Malformed lines always count as incidents
    pub fn has_incident(&self) -> bool {
        match &self.entry {
            Some(entry) => entry.has_incident(),
            None => true,
        }
    }

    pub fn run_at(&self) -> Option<DateTime<Utc>> {
        self.entry.as_ref().map(|e| e.run_at)
    }
}

/// Parse one JSONL line into a `LogRecord`, tagging malformed lines
/// instead of failing.
pub fn parse_line(line_no: usize, raw: &str) -> LogRecord {
    match serde_json::from_str::<HealthEntry>(raw) {
        Ok(entry) => LogRecord {
            line_no,
            raw: raw.to_string(),
            entry: Some(entry),
            parse_error: None,
        },
        Err(e) => LogRecord {
            line_no,
            raw: raw.to_string(),
            entry: None,
            parse_error: Some(e.to_string()),
        },
    }
}

/// Serialize one entry as a compact JSON object (no trailing newline)
pub fn encode_line(entry: &HealthEntry) -> Result<String, crate::error::VigilError> {
    Ok(serde_json::to_string(entry)?)
}
