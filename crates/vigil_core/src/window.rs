//! Trailing-window SLO evaluation
//!
//! Aggregates the trailing N records of a log into counts, rates and
//! streaks, optionally diffed against the window of equal size
//! immediately preceding it, and derives a red/amber/green verdict.
//!
//! Red means the latest state is bad or a hard threshold is exceeded.
//! Amber means thresholds hold but the streak target is unmet or the
//! window is strictly worse than the previous one.

use crate::entry::{LogRecord, RiskLevel};
use crate::regression;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// SLO thresholds for window evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SloThresholds {
    /// Maximum regressing transitions tolerated in the window
    #[serde(default)]
    pub max_regressions: u64,

    /// Maximum regression rate tolerated, in percent
    #[serde(default)]
    pub max_regression_rate_pct: f64,

    /// Minimum count of consecutive clean entries ending at the newest
    #[serde(default = "default_min_green_streak")]
    pub min_green_streak: u64,
}

fn default_min_green_streak() -> u64 {
    3
}

impl Default for SloThresholds {
    fn default() -> Self {
        Self {
            max_regressions: 0,
            max_regression_rate_pct: 0.0,
            min_green_streak: default_min_green_streak(),
        }
    }
}

/// One regressing transition inside a window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionEvent {
    pub from_line: usize,
    pub to_line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_run_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_run_at: Option<DateTime<Utc>>,
    pub reasons: Vec<String>,
}

/// Derived aggregate over one window; never stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub entries_in_window: usize,
    pub transitions_in_window: usize,
    /// Count of transitions with at least one regression reason.
    /// A pair never contributes more than once.
    pub regressions_in_window: usize,
    pub regression_rate_pct: f64,
    pub latest_entry_clean: bool,
    pub green_streak_latest: usize,
    pub malformed_in_window: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_run_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Full evaluation result for one trailing window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowEvaluation {
    pub thresholds: SloThresholds,
    pub window: WindowSummary,
    /// Present only when at least one record precedes the window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_window: Option<WindowSummary>,
    pub regression_events: Vec<RegressionEvent>,
    pub risk_level: RiskLevel,
    pub risk_reasons: Vec<String>,
    pub strict_fail_reasons: Vec<String>,
}

/// Round to four decimal places
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Evaluate the trailing `last` records of `records` against `thresholds`.
///
/// The previous window is the `last` records immediately preceding the
/// current one; it may be shorter than `last` and is absent when no
/// records precede the window.
pub fn evaluate_records(
    records: &[LogRecord],
    last: usize,
    thresholds: &SloThresholds,
) -> WindowEvaluation {
    let window_start = records.len().saturating_sub(last);
    let current = &records[window_start..];
    let prev_start = window_start.saturating_sub(last);
    let previous = &records[prev_start..window_start];

    let (window, regression_events) = summarize(current);
    let previous_window = if previous.is_empty() {
        None
    } else {
        Some(summarize(previous).0)
    };

    debug!(
        "window evaluation: {} entries, {} regressions, previous window {}",
        window.entries_in_window,
        window.regressions_in_window,
        if previous_window.is_some() { "present" } else { "absent" }
    );

    let strict_fail_reasons = strict_violations(&window, thresholds);
    let (risk_level, risk_reasons) =
        risk_verdict(&window, previous_window.as_ref(), thresholds);

    WindowEvaluation {
        thresholds: *thresholds,
        window,
        previous_window,
        regression_events,
        risk_level,
        risk_reasons,
        strict_fail_reasons,
    }
}

/// Aggregate one slice of records into a summary plus its regressing
/// transitions.
fn summarize(records: &[LogRecord]) -> (WindowSummary, Vec<RegressionEvent>) {
    let entries = records.len();
    let transitions = entries.saturating_sub(1);

    let mut events = Vec::new();
    for pair in records.windows(2) {
        let reasons = regression::detect_records(&pair[0], &pair[1]);
        if !reasons.is_empty() {
            events.push(RegressionEvent {
                from_line: pair[0].line_no,
                to_line: pair[1].line_no,
                from_run_at: pair[0].run_at(),
                to_run_at: pair[1].run_at(),
                reasons,
            });
        }
    }
    let regressions = events.len();

    let rate = if transitions == 0 {
        0.0
    } else {
        round4(regressions as f64 / transitions as f64 * 100.0)
    };

    let latest_entry_clean = records
        .last()
        .map(|r| !r.is_malformed() && r.entry.as_ref().map_or(false, |e| e.is_clean()))
        .unwrap_or(false);

    let green_streak_latest = records
        .iter()
        .rev()
        .take_while(|r| !r.is_malformed() && r.entry.as_ref().map_or(false, |e| e.is_clean()))
        .count();

    let summary = WindowSummary {
        entries_in_window: entries,
        transitions_in_window: transitions,
        regressions_in_window: regressions,
        regression_rate_pct: rate,
        latest_entry_clean,
        green_streak_latest,
        malformed_in_window: records.iter().filter(|r| r.is_malformed()).count(),
        first_run_at: records.first().and_then(|r| r.run_at()),
        last_run_at: records.last().and_then(|r| r.run_at()),
    };
    (summary, events)
}

/// Every violated threshold, evaluated independently of the risk path
fn strict_violations(window: &WindowSummary, thresholds: &SloThresholds) -> Vec<String> {
    let mut reasons = Vec::new();

    if window.entries_in_window == 0 {
        reasons.push("window_empty".to_string());
        return reasons;
    }

    if !window.latest_entry_clean {
        reasons.push("latest_entry_not_clean".to_string());
    }
    if window.regressions_in_window as u64 > thresholds.max_regressions {
        reasons.push("max_regressions_exceeded".to_string());
    }
    if window.regression_rate_pct > thresholds.max_regression_rate_pct {
        reasons.push("max_regression_rate_pct_exceeded".to_string());
    }
    if (window.green_streak_latest as u64) < thresholds.min_green_streak {
        reasons.push("min_green_streak_not_met".to_string());
    }

    reasons
}

/// Red/amber/green promotion with named reasons.
///
/// Worsening against the previous window only ever promotes to amber;
/// it is not a strict failure.
fn risk_verdict(
    window: &WindowSummary,
    previous: Option<&WindowSummary>,
    thresholds: &SloThresholds,
) -> (RiskLevel, Vec<String>) {
    let mut red = Vec::new();

    if window.entries_in_window == 0 {
        red.push("window_empty".to_string());
    } else if !window.latest_entry_clean {
        red.push("latest_entry_not_clean".to_string());
    }
    if window.regressions_in_window as u64 > thresholds.max_regressions {
        red.push("max_regressions_exceeded".to_string());
    }
    if window.regression_rate_pct > thresholds.max_regression_rate_pct {
        red.push("max_regression_rate_pct_exceeded".to_string());
    }

    if !red.is_empty() {
        return (RiskLevel::Red, red);
    }

    let mut amber = Vec::new();
    if (window.green_streak_latest as u64) < thresholds.min_green_streak {
        amber.push("min_green_streak_not_met".to_string());
    }
    if let Some(prev) = previous {
        if window.regressions_in_window > prev.regressions_in_window {
            amber.push("regressions_worsened".to_string());
        }
        if window.regression_rate_pct > prev.regression_rate_pct {
            amber.push("regression_rate_worsened".to_string());
        }
        if window.green_streak_latest < prev.green_streak_latest {
            amber.push("green_streak_worsened".to_string());
        }
    }

    if amber.is_empty() {
        (RiskLevel::Green, Vec::new())
    } else {
        (RiskLevel::Amber, amber)
    }
}
