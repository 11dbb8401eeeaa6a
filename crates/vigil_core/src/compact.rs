//! Age-tiered retention compaction
//!
//! Rewrites a log into a reduced stream under a tiered sampling cadence.
//! Anchors (oldest and newest rows), malformed lines and incident rows
//! are always kept, whatever the cadence says. The output file carries
//! the selected raw lines verbatim, order preserved.

use crate::entry::LogRecord;
use crate::error::VigilError;
use crate::store;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Tiered retention cadence. Age is counted from the newest row
/// (age 0 = newest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Rows younger than this are all kept
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,

    /// Width of the mid tier that follows the recent tier
    #[serde(default = "default_keep_mid_span")]
    pub keep_mid_span: usize,

    /// Sampling cadence inside the mid tier
    #[serde(default = "default_keep_mid_every")]
    pub keep_mid_every: usize,

    /// Sampling cadence beyond the mid tier
    #[serde(default = "default_keep_old_every")]
    pub keep_old_every: usize,

    /// Below this row count, a compaction that drops nothing is fine
    #[serde(default = "default_min_raw_for_dropped_check")]
    pub min_raw_for_dropped_check: usize,
}

fn default_keep_recent() -> usize {
    10
}
fn default_keep_mid_span() -> usize {
    40
}
fn default_keep_mid_every() -> usize {
    4
}
fn default_keep_old_every() -> usize {
    12
}
fn default_min_raw_for_dropped_check() -> usize {
    20
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_recent: default_keep_recent(),
            keep_mid_span: default_keep_mid_span(),
            keep_mid_every: default_keep_mid_every(),
            keep_old_every: default_keep_old_every(),
            min_raw_for_dropped_check: default_min_raw_for_dropped_check(),
        }
    }
}

impl RetentionPolicy {
    /// Cadence divisors must be non-zero
    pub fn validate(&self) -> Result<(), VigilError> {
        if self.keep_mid_every == 0 {
            return Err(VigilError::Retention(
                "keep_mid_every must be at least 1".to_string(),
            ));
        }
        if self.keep_old_every == 0 {
            return Err(VigilError::Retention(
                "keep_old_every must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One kept row with every reason it survived
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedRow {
    pub index: usize,
    pub line_no: usize,
    pub age: usize,
    pub reasons: Vec<String>,
}

/// Full compaction outcome over one input log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionPlan {
    pub selected: Vec<SelectedRow>,
    pub rows_total: usize,
    pub rows_selected: usize,
    pub rows_dropped: usize,
    pub incidents_total: usize,
    pub incidents_selected: usize,
    pub incidents_dropped: usize,
    pub malformed_total: usize,
    pub strict_fail_reasons: Vec<String>,
}

/// Decide which rows survive. Pure; does not touch the filesystem.
pub fn plan(records: &[LogRecord], policy: &RetentionPolicy) -> Result<CompactionPlan, VigilError> {
    policy.validate()?;

    let total = records.len();
    let mut selected = Vec::new();
    let mut incidents_total = 0usize;
    let mut incidents_selected = 0usize;

    for (index, record) in records.iter().enumerate() {
        let age = total - 1 - index;
        let mut reasons = Vec::new();

        if index == 0 {
            reasons.push("anchor_oldest".to_string());
        }
        if index == total - 1 {
            reasons.push("anchor_latest".to_string());
        }
        if record.is_malformed() {
            reasons.push("malformed_line".to_string());
        } else if record.has_incident() {
            reasons.push("incident_entry".to_string());
        }

        if age < policy.keep_recent {
            reasons.push("cadence_recent".to_string());
        } else if age < policy.keep_recent + policy.keep_mid_span {
            if age % policy.keep_mid_every == 0 {
                reasons.push("cadence_mid".to_string());
            }
        } else if age % policy.keep_old_every == 0 {
            reasons.push("cadence_old".to_string());
        }

        if record.has_incident() {
            incidents_total += 1;
            if !reasons.is_empty() {
                incidents_selected += 1;
            }
        }

        if !reasons.is_empty() {
            selected.push(SelectedRow {
                index,
                line_no: record.line_no,
                age,
                reasons,
            });
        }
    }

    let rows_selected = selected.len();
    let rows_dropped = total - rows_selected;
    let incidents_dropped = incidents_total - incidents_selected;

    let mut strict_fail_reasons = Vec::new();
    if selected.is_empty() {
        strict_fail_reasons.push("selection_empty".to_string());
    }
    if total > 0 && selected.last().map(|row| row.index) != Some(total - 1) {
        strict_fail_reasons.push("newest_row_not_selected".to_string());
    }
    if incidents_dropped > 0 {
        strict_fail_reasons.push(format!("incidents_dropped:{}", incidents_dropped));
    }
    if total >= policy.min_raw_for_dropped_check && rows_dropped == 0 {
        strict_fail_reasons.push("no_rows_dropped".to_string());
    }

    debug!(
        "compaction plan: {} of {} rows kept, {} incidents, {} dropped",
        rows_selected, total, incidents_total, rows_dropped
    );

    Ok(CompactionPlan {
        selected,
        rows_total: total,
        rows_selected,
        rows_dropped,
        incidents_total,
        incidents_selected,
        incidents_dropped,
        malformed_total: records.iter().filter(|r| r.is_malformed()).count(),
        strict_fail_reasons,
    })
}

/// Write the selected raw lines to `out_path`, order preserved.
/// The input file is never touched.
pub fn write_plan<P: AsRef<Path>>(
    records: &[LogRecord],
    plan: &CompactionPlan,
    out_path: P,
) -> Result<(), VigilError> {
    let lines: Vec<&str> = plan
        .selected
        .iter()
        .map(|row| records[row.index].raw.as_str())
        .collect();
    store::write_raw_lines(&out_path, &lines)?;
    info!(
        "compacted {} rows down to {} at {}",
        plan.rows_total,
        plan.rows_selected,
        out_path.as_ref().display()
    );
    Ok(())
}

/// Plan and write in one step
pub fn compact_records<P: AsRef<Path>>(
    records: &[LogRecord],
    policy: &RetentionPolicy,
    out_path: P,
) -> Result<CompactionPlan, VigilError> {
    let plan = plan(records, policy)?;
    write_plan(records, &plan, out_path)?;
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{encode_line, parse_line, DigestStatus, HealthEntry, RiskLevel};
    use crate::store::EventLogStore;
    use chrono::{DateTime, Duration, Utc};
    use tempfile::TempDir;

    fn base() -> DateTime<Utc> {
        "2026-08-01T00:00:00Z".parse().unwrap()
    }

    fn clean_records(n: usize) -> Vec<LogRecord> {
        (0..n)
            .map(|i| {
                let entry = HealthEntry::new(base() + Duration::hours(i as i64));
                parse_line(i + 1, &encode_line(&entry).unwrap())
            })
            .collect()
    }

    fn tight_policy() -> RetentionPolicy {
        RetentionPolicy {
            keep_recent: 2,
            keep_mid_span: 6,
            keep_mid_every: 3,
            keep_old_every: 10,
            min_raw_for_dropped_check: 5,
        }
    }

    #[test]
    fn test_anchors_always_selected() {
        for n in [1, 2, 5, 30, 100] {
            let records = clean_records(n);
            let plan = plan(&records, &tight_policy()).unwrap();
            let indices: Vec<usize> = plan.selected.iter().map(|r| r.index).collect();
            assert!(indices.contains(&0), "oldest missing for n={}", n);
            assert!(indices.contains(&(n - 1)), "newest missing for n={}", n);

            let oldest = &plan.selected[0];
            assert!(oldest.reasons.contains(&"anchor_oldest".to_string()));
            let newest = plan.selected.last().unwrap();
            assert!(newest.reasons.contains(&"anchor_latest".to_string()));
        }
    }

    #[test]
    fn test_recent_tier_keeps_everything() {
        let records = clean_records(30);
        let plan = plan(&records, &tight_policy()).unwrap();
        // Ages 0 and 1 are the recent tier: indices 28 and 29
        for index in [28, 29] {
            let row = plan.selected.iter().find(|r| r.index == index).unwrap();
            assert!(row.reasons.contains(&"cadence_recent".to_string()));
        }
    }

    #[test]
    fn test_mid_and_old_cadence() {
        let records = clean_records(30);
        let plan = plan(&records, &tight_policy()).unwrap();
        let kept: Vec<usize> = plan.selected.iter().map(|r| r.index).collect();

        // Mid tier: 2 <= age < 8, kept iff age % 3 == 0, i.e. ages 3, 6
        // (indices 26 and 23). Age 4 (index 25) is dropped.
        assert!(kept.contains(&26));
        assert!(kept.contains(&23));
        assert!(!kept.contains(&25));

        // Old tier: age >= 8, kept iff age % 10 == 0, i.e. ages 10, 20
        // (indices 19 and 9). Age 9 (index 20) is dropped.
        assert!(kept.contains(&19));
        assert!(kept.contains(&9));
        assert!(!kept.contains(&20));
    }

    #[test]
    fn test_incident_rows_survive_any_cadence() {
        let mut records = clean_records(30);
        // Put an incident at an age every cadence would drop (age 9)
        let mut incident = HealthEntry::new(base() + Duration::hours(20));
        incident.summary.sections_fail = 2;
        records[20] = parse_line(21, &encode_line(&incident).unwrap());

        let plan = plan(&records, &tight_policy()).unwrap();
        let row = plan.selected.iter().find(|r| r.index == 20).unwrap();
        assert!(row.reasons.contains(&"incident_entry".to_string()));
        assert_eq!(plan.incidents_dropped, 0);
        assert!(plan.strict_fail_reasons.is_empty());
    }

    #[test]
    fn test_malformed_rows_survive() {
        let mut records = clean_records(30);
        records[15] = parse_line(16, "corrupt {");

        let plan = plan(&records, &tight_policy()).unwrap();
        let row = plan.selected.iter().find(|r| r.index == 15).unwrap();
        assert!(row.reasons.contains(&"malformed_line".to_string()));
        assert_eq!(plan.incidents_dropped, 0);
    }

    #[test]
    fn test_failed_heartbeat_row_is_kept() {
        // 8 heartbeat-shaped rows, row 3 failed, keep-recent 5
        let mut records = Vec::new();
        for i in 0..8usize {
            let mut entry = HealthEntry::new(base() + Duration::hours(i as i64));
            entry.heartbeat_id = Some(format!("hb-{}", i));
            if i == 3 {
                entry.status = Some(DigestStatus::Failed);
                entry.risk_level = Some(RiskLevel::Red);
            } else {
                entry.status = Some(DigestStatus::Ok);
                entry.risk_level = Some(RiskLevel::Green);
            }
            records.push(parse_line(i + 1, &encode_line(&entry).unwrap()));
        }

        let policy = RetentionPolicy {
            keep_recent: 5,
            keep_mid_span: 0,
            keep_mid_every: 1,
            keep_old_every: 100,
            min_raw_for_dropped_check: 100,
        };
        let plan = plan(&records, &policy).unwrap();
        let row = plan.selected.iter().find(|r| r.index == 3).unwrap();
        assert!(row.reasons.contains(&"incident_entry".to_string()));
        assert_eq!(plan.incidents_dropped, 0);
    }

    #[test]
    fn test_no_rows_dropped_check_respects_floor() {
        // Small log: dropping nothing is acceptable
        let records = clean_records(3);
        let policy = RetentionPolicy {
            keep_recent: 10,
            min_raw_for_dropped_check: 5,
            ..tight_policy()
        };
        let plan_small = plan(&records, &policy).unwrap();
        assert!(plan_small.strict_fail_reasons.is_empty());

        // At the floor, a no-op compaction is a strict failure
        let records = clean_records(5);
        let plan_noop = plan(&records, &policy).unwrap();
        assert_eq!(plan_noop.rows_dropped, 0);
        assert!(plan_noop
            .strict_fail_reasons
            .contains(&"no_rows_dropped".to_string()));
    }

    #[test]
    fn test_empty_log_is_strict_failure() {
        let plan = plan(&[], &tight_policy()).unwrap();
        assert!(plan
            .strict_fail_reasons
            .contains(&"selection_empty".to_string()));
    }

    #[test]
    fn test_zero_cadence_is_rejected() {
        let mut policy = tight_policy();
        policy.keep_mid_every = 0;
        assert!(plan(&clean_records(3), &policy).is_err());
    }

    #[test]
    fn test_output_preserves_raw_lines_and_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut records = clean_records(30);
        records[15] = parse_line(16, "corrupt {");

        let out_path = temp_dir.path().join("compacted.jsonl");
        let plan = compact_records(&records, &tight_policy(), &out_path).unwrap();

        let out_store = EventLogStore::new(&out_path);
        let written = out_store.read_all().unwrap();
        assert_eq!(written.len(), plan.rows_selected);

        // Malformed line came through verbatim
        assert!(written.iter().any(|r| r.raw == "corrupt {"));

        // Order preserved: run_at monotonically increasing over parsed rows
        let stamps: Vec<_> = written.iter().filter_map(|r| r.run_at()).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }
}
