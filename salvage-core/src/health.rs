//! Health scoring from a SMART report.

use crate::diagnostics::smart::{NO_ERRORS, UNAVAILABLE};
use crate::diagnostics::SmartReport;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Normal,
    Degraded,
    Failing,
    Unknown,
}

impl HealthStatus {
    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Normal => "normal",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Failing => "failing",
            HealthStatus::Unknown => "unknown",
        }
    }

    pub fn label_ja(&self) -> &'static str {
        match self {
            HealthStatus::Normal => "正常",
            HealthStatus::Degraded => "異常",
            HealthStatus::Failing => "故障",
            HealthStatus::Unknown => "不明",
        }
    }

    fn from_score(score: i32) -> Self {
        if score >= 90 {
            HealthStatus::Normal
        } else if score >= 70 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Failing
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthAssessment {
    pub status: HealthStatus,
    /// Starts at 100; not clamped, so heavily damaged drives go negative.
    pub score: i32,
    pub issues: Vec<String>,
}

pub fn score(report: &SmartReport) -> HealthAssessment {
    if !report.smart_supported {
        return HealthAssessment {
            status: HealthStatus::Unknown,
            score: 0,
            issues: vec!["SMART not supported".to_string()],
        };
    }

    let mut score: i32 = 100;
    let mut issues = Vec::new();

    match report.overall_health.as_str() {
        "PASSED" => {}
        "FAILED" => {
            score -= 50;
            issues.push("SMART overall-health test: FAILED".to_string());
        }
        other => {
            score -= 10;
            issues.push(format!("SMART overall-health test: {}", other));
        }
    }

    // BTreeMap order is the declaration order of SmartAttribute.
    for (attr, value) in &report.attributes {
        let limits = attr.thresholds();
        if *value > limits.critical {
            score -= 30;
            issues.push(format!("{}: {} (critical)", attr.name(), value));
        } else if *value > limits.normal {
            score -= 10;
            issues.push(format!("{}: {} (warning)", attr.name(), value));
        }
    }

    let summary = report.error_log_summary.as_str();
    if summary != NO_ERRORS && summary != UNAVAILABLE {
        score -= 15;
        issues.push(format!("Error log: {}", summary));
    }

    if let Some(counters) = &report.sata_phy_errors {
        for (name, count) in counters.iter().filter(|(_, count)| **count > 0) {
            score -= 5;
            issues.push(format!("SATA PHY {}: {}", name, count));
        }
    }

    HealthAssessment {
        status: HealthStatus::from_score(score),
        score,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::SmartAttribute;
    use std::collections::BTreeMap;

    fn report(health: &str, attrs: &[(SmartAttribute, u64)], errors: &str) -> SmartReport {
        SmartReport {
            overall_health: health.to_string(),
            smart_supported: true,
            attributes: attrs.iter().copied().collect(),
            error_log_summary: errors.to_string(),
            ..SmartReport::default()
        }
    }

    fn all_zero() -> Vec<(SmartAttribute, u64)> {
        SmartAttribute::ALL.iter().map(|a| (*a, 0)).collect()
    }

    #[test]
    fn healthy_drive_scores_100() {
        let assessment = score(&report("PASSED", &all_zero(), "no errors"));
        assert_eq!(assessment.status, HealthStatus::Normal);
        assert_eq!(assessment.score, 100);
        assert!(assessment.issues.is_empty());
    }

    #[test]
    fn failed_drive_with_reallocations_is_failing() {
        let mut attrs = all_zero();
        attrs[0].1 = 20;
        let assessment = score(&report("FAILED", &attrs, "3 errors"));
        assert!(assessment.score <= 5);
        assert_eq!(assessment.score, 5);
        assert_eq!(assessment.status, HealthStatus::Failing);
        assert_eq!(
            assessment.issues,
            [
                "SMART overall-health test: FAILED",
                "Reallocated_Sector_Ct: 20 (critical)",
                "Error log: 3 errors",
            ]
        );
    }

    #[test]
    fn unsupported_is_unknown() {
        let mut r = report("PASSED", &all_zero(), "no errors");
        r.smart_supported = false;
        let assessment = score(&r);
        assert_eq!(assessment.status, HealthStatus::Unknown);
        assert_eq!(assessment.score, 0);
        assert_eq!(assessment.issues, ["SMART not supported"]);
        assert_eq!(assessment.status.label_ja(), "不明");
    }

    #[test]
    fn warning_band_and_unknown_token() {
        let attrs = [
            (SmartAttribute::CurrentPendingSector, 5),
            (SmartAttribute::OfflineUncorrectable, 0),
        ];
        let assessment = score(&report("UNKNOWN", &attrs, "unavailable"));
        assert_eq!(assessment.score, 80);
        assert_eq!(assessment.status, HealthStatus::Degraded);
        assert_eq!(assessment.status.label_ja(), "異常");
        assert_eq!(
            assessment.issues,
            [
                "SMART overall-health test: UNKNOWN",
                "Current_Pending_Sector: 5 (warning)",
            ]
        );
    }

    #[test]
    fn score_is_not_clamped() {
        let attrs: Vec<_> = SmartAttribute::ALL.iter().map(|a| (*a, 1000)).collect();
        let mut r = report("FAILED", &attrs, "12 errors");
        r.sata_phy_errors = Some(BTreeMap::from([
            ("CRC_Error_Count".to_string(), 3),
            ("Illegal_State".to_string(), 0),
            ("R_ERR_Response".to_string(), 1),
        ]));
        let assessment = score(&r);
        assert_eq!(assessment.score, 100 - 50 - 4 * 30 - 15 - 2 * 5);
        assert!(assessment.score < 0);
        assert_eq!(assessment.status.label_ja(), "故障");
        assert_eq!(assessment.issues.len(), 1 + 4 + 1 + 2);
    }

    #[test]
    fn scoring_is_idempotent() {
        let mut attrs = all_zero();
        attrs[3].1 = 7;
        let r = report("PASSED", &attrs, "1 errors, latest at 10 power-on hours");
        assert_eq!(score(&r), score(&r));
    }
}
