//! Retention and parity integration tests
//!
//! End-to-end properties over the compaction/heartbeat layers: anchors
//! always survive, incidents are never dropped, a freshly compacted
//! stream always passes parity, and heartbeat emission is idempotent.

use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;
use vigil_core::compact::{self, RetentionPolicy};
use vigil_core::digest::Digest;
use vigil_core::entry::{encode_line, parse_line, HealthEntry, LogRecord};
use vigil_core::heartbeat;
use vigil_core::parity;
use vigil_core::store::EventLogStore;
use vigil_core::window::{evaluate_records, SloThresholds};

fn base() -> DateTime<Utc> {
    "2026-08-01T00:00:00Z".parse().unwrap()
}

fn entry_at(hours: i64) -> HealthEntry {
    HealthEntry::new(base() + Duration::hours(hours))
}

fn record(line_no: usize, entry: &HealthEntry) -> LogRecord {
    parse_line(line_no, &encode_line(entry).unwrap())
}

fn mixed_log(n: usize) -> Vec<LogRecord> {
    // Incidents roughly every seventh row, one malformed line
    (0..n)
        .map(|i| {
            if i % 13 == 5 {
                return parse_line(i + 1, "%% truncated write %%");
            }
            let mut entry = entry_at(i as i64);
            if i % 7 == 3 {
                entry.summary.sections_fail = 1;
                entry.summary.failed_sections = vec!["codec".to_string()];
            }
            record(i + 1, &entry)
        })
        .collect()
}

#[test]
fn test_anchor_invariant_over_many_shapes() {
    let policies = [
        RetentionPolicy::default(),
        RetentionPolicy {
            keep_recent: 1,
            keep_mid_span: 1,
            keep_mid_every: 1,
            keep_old_every: 1,
            min_raw_for_dropped_check: 1000,
        },
        RetentionPolicy {
            keep_recent: 0,
            keep_mid_span: 0,
            keep_mid_every: 9,
            keep_old_every: 97,
            min_raw_for_dropped_check: 1000,
        },
    ];

    for policy in &policies {
        for n in [1, 2, 3, 17, 64] {
            let records = mixed_log(n);
            let plan = compact::plan(&records, policy).unwrap();
            let kept: Vec<usize> = plan.selected.iter().map(|r| r.index).collect();
            assert!(kept.contains(&0), "oldest dropped: n={} {:?}", n, policy);
            assert!(
                kept.contains(&(n - 1)),
                "newest dropped: n={} {:?}",
                n,
                policy
            );
        }
    }
}

#[test]
fn test_incident_preservation() {
    for n in [8, 26, 50, 120] {
        let records = mixed_log(n);
        let plan = compact::plan(&records, &RetentionPolicy::default()).unwrap();
        assert_eq!(plan.incidents_dropped, 0, "incidents dropped at n={}", n);

        // Every incident row index is in the selection
        let kept: Vec<usize> = plan.selected.iter().map(|r| r.index).collect();
        for (index, record) in records.iter().enumerate() {
            if record.has_incident() {
                assert!(kept.contains(&index), "incident {} dropped", index);
            }
        }
    }
}

#[test]
fn test_compacted_stream_passes_parity() {
    // Parity identity is content-derived, so this fixture carries
    // incidents but no malformed rows (a malformed row can never be
    // re-identified across files and is a strict failure on its own).
    let temp_dir = TempDir::new().unwrap();
    let records: Vec<LogRecord> = (0..60)
        .map(|i| {
            let mut entry = entry_at(i as i64);
            if i % 7 == 3 {
                entry.summary.sections_fail = 1;
                entry.summary.failed_sections = vec!["codec".to_string()];
            }
            record(i + 1, &entry)
        })
        .collect();

    let out_path = temp_dir.path().join("compacted.jsonl");
    let policy = RetentionPolicy {
        keep_recent: 8,
        keep_mid_span: 20,
        keep_mid_every: 4,
        keep_old_every: 10,
        min_raw_for_dropped_check: 20,
    };
    compact::compact_records(&records, &policy, &out_path).unwrap();
    let compacted = EventLogStore::new(&out_path).read_all().unwrap();

    // The trailing window the recent tier fully covers must be intact
    let result = parity::check(&records, &compacted, 8);
    assert_eq!(result.rows_missing_in_compacted, 0);
    assert_eq!(result.raw_window_coverage_pct, 100.0);
    assert_eq!(result.incidents_missing_in_compacted, 0);
    assert!(result.newest_raw_present);

    // Incidents stay covered over the whole log, not just the window
    let wide = parity::check(&records, &compacted, records.len());
    assert_eq!(wide.incidents_missing_in_compacted, 0);
    assert_eq!(wide.incident_coverage_pct, 100.0);
}

#[test]
fn test_heartbeat_idempotence_across_invocations() {
    let temp_dir = TempDir::new().unwrap();
    let history_path = temp_dir.path().join("history.jsonl");
    let heartbeat_path = temp_dir.path().join("heartbeat.jsonl");

    let history = EventLogStore::new(&history_path);
    for i in 0..5 {
        history.append(&entry_at(i)).unwrap();
    }

    let records = history.read_all().unwrap();
    let eval = evaluate_records(&records, 20, &SloThresholds::default());
    let digest = Digest::from_window(&eval, base() + Duration::days(1));

    let heartbeat_store = EventLogStore::new(&heartbeat_path);
    let first = heartbeat::emit(&heartbeat_store, &digest).unwrap();
    assert!(first.appended);
    assert_eq!(first.history_size_after, 1);

    // Re-running over the unchanged digest never grows the log
    for _ in 0..3 {
        let again = heartbeat::emit(&heartbeat_store, &digest).unwrap();
        assert!(again.duplicate_detected);
        assert_eq!(again.history_size_after, 1);
    }

    // A new upstream observation changes the id and appends
    history.append(&entry_at(5)).unwrap();
    let records = history.read_all().unwrap();
    let eval = evaluate_records(&records, 20, &SloThresholds::default());
    let digest2 = Digest::from_window(&eval, base() + Duration::days(1));
    let second = heartbeat::emit(&heartbeat_store, &digest2).unwrap();
    assert!(second.appended);
    assert_eq!(second.history_size_after, 2);
}

#[test]
fn test_cascade_slo_over_heartbeat_log() {
    // The heartbeat stream is itself a health log: the evaluator,
    // compactor and parity checker run over it unchanged.
    let temp_dir = TempDir::new().unwrap();
    let heartbeat_path = temp_dir.path().join("heartbeat.jsonl");
    let heartbeat_store = EventLogStore::new(&heartbeat_path);

    for day in 0..6 {
        let records: Vec<LogRecord> = (0..4)
            .map(|i| record(i + 1, &entry_at(day * 24 + i as i64)))
            .collect();
        let eval = evaluate_records(&records, 20, &SloThresholds::default());
        let digest = Digest::from_window(&eval, base() + Duration::days(day + 1));
        heartbeat::emit(&heartbeat_store, &digest).unwrap();
    }

    let heartbeats = heartbeat_store.read_all().unwrap();
    assert_eq!(heartbeats.len(), 6);

    let eval = evaluate_records(&heartbeats, 4, &SloThresholds::default());
    assert_eq!(eval.window.entries_in_window, 4);
    assert!(eval.window.latest_entry_clean);
    assert_eq!(eval.window.regressions_in_window, 0);

    let plan = compact::plan(
        &heartbeats,
        &RetentionPolicy {
            keep_recent: 2,
            keep_mid_span: 2,
            keep_mid_every: 2,
            keep_old_every: 3,
            min_raw_for_dropped_check: 100,
        },
    )
    .unwrap();
    assert_eq!(plan.incidents_dropped, 0);
    assert!(plan.strict_fail_reasons.is_empty());
}

#[test]
fn test_compaction_leaves_input_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let in_path = temp_dir.path().join("raw.jsonl");
    let store = EventLogStore::new(&in_path);
    for i in 0..30 {
        store.append(&entry_at(i)).unwrap();
    }
    let before = std::fs::read_to_string(&in_path).unwrap();

    let records = store.read_all().unwrap();
    let out_path = temp_dir.path().join("compacted.jsonl");
    let plan = compact::compact_records(
        &records,
        &RetentionPolicy {
            keep_recent: 3,
            keep_mid_span: 9,
            keep_mid_every: 3,
            keep_old_every: 6,
            min_raw_for_dropped_check: 10,
        },
        &out_path,
    )
    .unwrap();

    assert!(plan.rows_dropped > 0);
    assert_eq!(std::fs::read_to_string(&in_path).unwrap(), before);
    assert!(out_path.exists());
}
