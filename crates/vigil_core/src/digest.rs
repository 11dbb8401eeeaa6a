//! Digest of an evaluation into a compact status record
//!
//! Collapses a window or parity result into an independently validatable
//! `{status, risk_level, key_metrics, key_checks}` record. Two layer
//! rules coexist deliberately: the first-level SLO digest inherits the
//! window verdict (which only ambers on streak shortfall or worsening),
//! while digest-of-digest layers amber on any non-empty risk-reason list.

use crate::entry::{DigestStatus, RiskLevel};
use crate::window::{round4, SloThresholds, WindowEvaluation, WindowSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Window-over-window movement of the headline metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowDeltas {
    pub regressions: i64,
    pub regression_rate_pct: f64,
    pub green_streak: i64,
}

/// Compact, self-describing status record emitted by every stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    /// When this digest was computed (UTC, RFC3339)
    pub generated_at: DateTime<Utc>,

    /// `run_at` of the newest upstream record this digest covers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_generated_at: Option<DateTime<Utc>>,

    pub status: DigestStatus,
    pub risk_level: RiskLevel,

    pub key_metrics: BTreeMap<String, serde_json::Value>,
    pub key_checks: BTreeMap<String, bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<SloThresholds>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_window: Option<WindowSummary>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deltas: Option<WindowDeltas>,

    pub risk_reasons: Vec<String>,
    pub strict_fail_reasons: Vec<String>,

    /// Must equal `risk_reasons.len()`; checked by `validate`
    pub risk_reason_count: usize,

    /// Must equal `strict_fail_reasons.len()`; checked by `validate`
    pub strict_fail_count: usize,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
}

impl Digest {
    /// Digest of a first-level window evaluation. Risk carries over from
    /// the evaluator; status follows red/amber/green.
    pub fn from_window(eval: &WindowEvaluation, generated_at: DateTime<Utc>) -> Self {
        let mut key_metrics = BTreeMap::new();
        key_metrics.insert(
            "entries_in_window".to_string(),
            eval.window.entries_in_window.into(),
        );
        key_metrics.insert(
            "transitions_in_window".to_string(),
            eval.window.transitions_in_window.into(),
        );
        key_metrics.insert(
            "regressions_in_window".to_string(),
            eval.window.regressions_in_window.into(),
        );
        key_metrics.insert(
            "regression_rate_pct".to_string(),
            eval.window.regression_rate_pct.into(),
        );
        key_metrics.insert(
            "green_streak_latest".to_string(),
            eval.window.green_streak_latest.into(),
        );
        key_metrics.insert(
            "malformed_in_window".to_string(),
            eval.window.malformed_in_window.into(),
        );

        let mut key_checks = BTreeMap::new();
        key_checks.insert(
            "window_non_empty".to_string(),
            eval.window.entries_in_window > 0,
        );
        key_checks.insert(
            "latest_entry_clean".to_string(),
            eval.window.latest_entry_clean,
        );
        key_checks.insert(
            "no_malformed_in_window".to_string(),
            eval.window.malformed_in_window == 0,
        );
        key_checks.insert(
            "thresholds_met".to_string(),
            eval.strict_fail_reasons.is_empty(),
        );

        let deltas = eval.previous_window.as_ref().map(|prev| WindowDeltas {
            regressions: eval.window.regressions_in_window as i64
                - prev.regressions_in_window as i64,
            regression_rate_pct: round4(
                eval.window.regression_rate_pct - prev.regression_rate_pct,
            ),
            green_streak: eval.window.green_streak_latest as i64
                - prev.green_streak_latest as i64,
        });

        Digest {
            generated_at,
            upstream_generated_at: eval.window.last_run_at,
            status: status_for_risk(eval.risk_level),
            risk_level: eval.risk_level,
            key_metrics,
            key_checks,
            thresholds: Some(eval.thresholds),
            previous_window: eval.previous_window.clone(),
            deltas,
            risk_reason_count: eval.risk_reasons.len(),
            strict_fail_count: eval.strict_fail_reasons.len(),
            risk_reasons: eval.risk_reasons.clone(),
            strict_fail_reasons: eval.strict_fail_reasons.clone(),
            validation_errors: Vec::new(),
        }
        .validated()
    }

    /// Digest for later cascade layers (heartbeat, parity). `failed`
    /// forces a red/failed verdict; otherwise any risk reason at all
    /// makes the digest degraded/amber.
    pub fn from_reasons(
        generated_at: DateTime<Utc>,
        upstream_generated_at: Option<DateTime<Utc>>,
        key_metrics: BTreeMap<String, serde_json::Value>,
        key_checks: BTreeMap<String, bool>,
        risk_reasons: Vec<String>,
        strict_fail_reasons: Vec<String>,
        failed: bool,
    ) -> Self {
        let (status, risk_level) = if failed {
            (DigestStatus::Failed, RiskLevel::Red)
        } else if risk_reasons.is_empty() {
            (DigestStatus::Ok, RiskLevel::Green)
        } else {
            (DigestStatus::Degraded, RiskLevel::Amber)
        };

        Digest {
            generated_at,
            upstream_generated_at,
            status,
            risk_level,
            key_metrics,
            key_checks,
            thresholds: None,
            previous_window: None,
            deltas: None,
            risk_reason_count: risk_reasons.len(),
            strict_fail_count: strict_fail_reasons.len(),
            risk_reasons,
            strict_fail_reasons,
            validation_errors: Vec::new(),
        }
        .validated()
    }

    /// Run the self-consistency contract and return every violation
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.strict_fail_count != self.strict_fail_reasons.len() {
            errors.push(format!(
                "strict_fail_count_mismatch:{}!={}",
                self.strict_fail_count,
                self.strict_fail_reasons.len()
            ));
        }
        if self.risk_reason_count != self.risk_reasons.len() {
            errors.push(format!(
                "risk_reason_count_mismatch:{}!={}",
                self.risk_reason_count,
                self.risk_reasons.len()
            ));
        }
        if self.status == DigestStatus::Failed && self.risk_level != RiskLevel::Red {
            errors.push("failed_status_requires_red_risk".to_string());
        }
        if self.status == DigestStatus::Ok && self.risk_level != RiskLevel::Green {
            errors.push("ok_status_requires_green_risk".to_string());
        }

        // Present = total - missing arithmetic, where the metrics exist
        for (total, present, missing) in [
            (
                "rows_in_window",
                "rows_present_in_compacted",
                "rows_missing_in_compacted",
            ),
            (
                "incidents_in_window",
                "incidents_present_in_compacted",
                "incidents_missing_in_compacted",
            ),
        ] {
            if let (Some(t), Some(p), Some(m)) = (
                metric_u64(&self.key_metrics, total),
                metric_u64(&self.key_metrics, present),
                metric_u64(&self.key_metrics, missing),
            ) {
                if p + m != t {
                    errors.push(format!("{}_arithmetic_mismatch:{}+{}!={}", present, p, m, t));
                }
            }
        }

        errors
    }

    /// Record validation results on the digest itself
    pub fn validated(mut self) -> Self {
        self.validation_errors = self.validate();
        self
    }

    /// Numeric metric accessor for id derivation and reports
    pub fn metric_u64(&self, key: &str) -> Option<u64> {
        metric_u64(&self.key_metrics, key)
    }

    pub fn metric_f64(&self, key: &str) -> Option<f64> {
        self.key_metrics.get(key).and_then(|v| v.as_f64())
    }
}

fn status_for_risk(risk: RiskLevel) -> DigestStatus {
    match risk {
        RiskLevel::Green => DigestStatus::Ok,
        RiskLevel::Amber => DigestStatus::Degraded,
        RiskLevel::Red => DigestStatus::Failed,
    }
}

fn metric_u64(metrics: &BTreeMap<String, serde_json::Value>, key: &str) -> Option<u64> {
    metrics.get(key).and_then(|v| v.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{encode_line, parse_line, HealthEntry};
    use crate::window::{evaluate_records, SloThresholds};
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        "2026-08-02T00:00:00Z".parse().unwrap()
    }

    fn clean_eval(n: usize, last: usize) -> crate::window::WindowEvaluation {
        let records: Vec<_> = (0..n)
            .map(|i| {
                let entry =
                    HealthEntry::new(now() - Duration::hours((n - i) as i64));
                parse_line(i + 1, &encode_line(&entry).unwrap())
            })
            .collect();
        evaluate_records(&records, last, &SloThresholds::default())
    }

    #[test]
    fn test_green_window_maps_to_ok() {
        let digest = Digest::from_window(&clean_eval(4, 10), now());
        assert_eq!(digest.status, DigestStatus::Ok);
        assert_eq!(digest.risk_level, RiskLevel::Green);
        assert!(digest.validation_errors.is_empty());
        assert_eq!(digest.metric_u64("entries_in_window"), Some(4));
        assert_eq!(digest.key_checks.get("latest_entry_clean"), Some(&true));
        assert!(digest.upstream_generated_at.is_some());
    }

    #[test]
    fn test_empty_window_maps_to_failed_red() {
        let digest = Digest::from_window(&clean_eval(0, 10), now());
        assert_eq!(digest.status, DigestStatus::Failed);
        assert_eq!(digest.risk_level, RiskLevel::Red);
        assert_eq!(digest.strict_fail_count, digest.strict_fail_reasons.len());
        assert!(digest.validation_errors.is_empty());
    }

    #[test]
    fn test_deltas_against_previous_window() {
        // 6 records, window of 3: previous window exists and is clean
        let digest = Digest::from_window(&clean_eval(6, 3), now());
        let deltas = digest.deltas.unwrap();
        assert_eq!(deltas.regressions, 0);
        assert_eq!(deltas.regression_rate_pct, 0.0);
        // Both windows fully clean: equal streaks
        assert_eq!(deltas.green_streak, 0);
    }

    #[test]
    fn test_validate_catches_count_mismatch() {
        let mut digest = Digest::from_window(&clean_eval(4, 10), now());
        digest.strict_fail_count = 7;
        let errors = digest.validate();
        assert!(errors
            .iter()
            .any(|e| e.starts_with("strict_fail_count_mismatch")));
    }

    #[test]
    fn test_validate_catches_status_risk_violation() {
        let mut digest = Digest::from_window(&clean_eval(4, 10), now());
        digest.status = DigestStatus::Failed;
        let errors = digest.validate();
        assert!(errors.contains(&"failed_status_requires_red_risk".to_string()));
    }

    #[test]
    fn test_validate_present_arithmetic() {
        let mut metrics = BTreeMap::new();
        metrics.insert("rows_in_window".to_string(), 10.into());
        metrics.insert("rows_present_in_compacted".to_string(), 7.into());
        metrics.insert("rows_missing_in_compacted".to_string(), 2.into());

        let digest = Digest::from_reasons(
            now(),
            None,
            metrics,
            BTreeMap::new(),
            Vec::new(),
            Vec::new(),
            false,
        );
        assert!(digest
            .validation_errors
            .iter()
            .any(|e| e.contains("arithmetic_mismatch")));
    }

    #[test]
    fn test_reason_layer_ambers_on_any_risk_reason() {
        // Unlike the window layer, any reason at all degrades the digest
        let digest = Digest::from_reasons(
            now(),
            None,
            BTreeMap::new(),
            BTreeMap::new(),
            vec!["coverage_below_target".to_string()],
            Vec::new(),
            false,
        );
        assert_eq!(digest.status, DigestStatus::Degraded);
        assert_eq!(digest.risk_level, RiskLevel::Amber);

        let failed = Digest::from_reasons(
            now(),
            None,
            BTreeMap::new(),
            BTreeMap::new(),
            vec!["incident_missing:x".to_string()],
            vec!["incident_missing:x".to_string()],
            true,
        );
        assert_eq!(failed.status, DigestStatus::Failed);
        assert_eq!(failed.risk_level, RiskLevel::Red);
    }
}
