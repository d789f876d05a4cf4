use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::UNSPECIFIED;
use crate::pipeline::processing::normalize::rules::{EventRule, ReclassificationRule};
use crate::pipeline::processing::normalize::NormalizedRecord;

/// A normalized record together with its quality assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessedRecord {
    pub normalized_record: NormalizedRecord,
    pub quality_assessment: QualityAssessment,
    pub assessed_at: DateTime<Utc>,
}

/// Quality assessment result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub decision: QualityDecision,
    /// Overall quality score (0.0 to 1.0)
    pub quality_score: f64,
    pub issues: Vec<QualityIssue>,
    /// The quality rule set version used
    pub rule_version: String,
}

/// Decision for a record. Quarantine never removes a record from the
/// dataset; it marks it for review.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QualityDecision {
    Accept,
    AcceptWithWarnings,
    Quarantine,
}

impl QualityDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityDecision::Accept => "accept",
            QualityDecision::AcceptWithWarnings => "accept_with_warnings",
            QualityDecision::Quarantine => "quarantine",
        }
    }
}

/// Individual quality issue found during assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityIssue {
    pub issue_type: QualityIssueType,
    pub severity: QualitySeverity,
    pub description: String,
    /// Storage column that triggered this issue
    pub field: Option<String>,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssueType {
    MissingData,
    OutOfRange,
    SuspiciousValue,
    IncompleteGeography,
    TemporalInconsistency,
    InferredValue,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum QualitySeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Trait for implementing quality assessment logic
pub trait QualityGate: Send + Sync {
    fn assess(&self, record: &NormalizedRecord) -> QualityAssessedRecord;
}

/// Configuration for quality assessment rules
#[derive(Debug, Clone)]
pub struct QualityGateConfig {
    /// Minimum quality score for acceptance
    pub min_quality_score: f64,
    pub rule_version: String,
    /// Flag records whose date lies after the assessment date
    pub reject_future_dates: bool,
    /// Distributions before this year are considered typos
    pub earliest_year: i32,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            min_quality_score: 0.6,
            rule_version: "aid-quality-v1".to_string(),
            reject_future_dates: true,
            earliest_year: 2000,
        }
    }
}

/// Default quality gate for canonical aid records
pub struct DefaultQualityGate {
    pub config: QualityGateConfig,
}

impl DefaultQualityGate {
    pub fn new() -> Self {
        Self {
            config: QualityGateConfig::default(),
        }
    }

    pub fn with_config(config: QualityGateConfig) -> Self {
        Self { config }
    }

    fn assess_geography(&self, record: &NormalizedRecord) -> Vec<QualityIssue> {
        let mut issues = Vec::new();
        let canonical = &record.record;

        if !record.normalization.department_mapped {
            issues.push(QualityIssue {
                issue_type: QualityIssueType::IncompleteGeography,
                severity: QualitySeverity::Warning,
                description: format!("Department '{}' is not an official department", canonical.department),
                field: Some("departamento".to_string()),
                suggestion: Some("Add an alias for this spelling to the ruleset".to_string()),
            });
        }

        if record.normalization.department_swapped {
            issues.push(QualityIssue {
                issue_type: QualityIssueType::InferredValue,
                severity: QualitySeverity::Info,
                description: format!(
                    "District '{}' was entered as the department; department set to {}",
                    canonical.district, canonical.department
                ),
                field: Some("departamento".to_string()),
                suggestion: None,
            });
        }

        if record.normalization.district_backfilled {
            issues.push(QualityIssue {
                issue_type: QualityIssueType::InferredValue,
                severity: QualitySeverity::Info,
                description: format!("District was blank; filled from department {}", canonical.department),
                field: Some("distrito".to_string()),
                suggestion: None,
            });
        } else if canonical.district == UNSPECIFIED {
            issues.push(QualityIssue {
                issue_type: QualityIssueType::IncompleteGeography,
                severity: QualitySeverity::Info,
                description: "District not specified".to_string(),
                field: Some("distrito".to_string()),
                suggestion: None,
            });
        }

        issues
    }

    fn assess_date(&self, record: &NormalizedRecord) -> Vec<QualityIssue> {
        let mut issues = Vec::new();

        match record.record.date {
            None => issues.push(QualityIssue {
                issue_type: QualityIssueType::MissingData,
                severity: QualitySeverity::Warning,
                description: "Record has no usable date; it is left out of time series".to_string(),
                field: Some("fecha".to_string()),
                suggestion: Some("Use YYYY-MM-DD or DD/MM/YYYY".to_string()),
            }),
            Some(date) => {
                let today = Utc::now().date_naive();
                if self.config.reject_future_dates && date > today {
                    issues.push(QualityIssue {
                        issue_type: QualityIssueType::TemporalInconsistency,
                        severity: QualitySeverity::Error,
                        description: format!("Distribution date {} is in the future", date),
                        field: Some("fecha".to_string()),
                        suggestion: Some("Verify day and month were not swapped".to_string()),
                    });
                }
                if record.record.year().is_some_and(|y| y < self.config.earliest_year) {
                    issues.push(QualityIssue {
                        issue_type: QualityIssueType::TemporalInconsistency,
                        severity: QualitySeverity::Error,
                        description: format!("Distribution date {} predates {}", date, self.config.earliest_year),
                        field: Some("fecha".to_string()),
                        suggestion: None,
                    });
                }
            }
        }

        issues
    }

    fn assess_quantities(&self, record: &NormalizedRecord) -> Vec<QualityIssue> {
        let mut issues = Vec::new();
        let canonical = &record.record;

        for (field, quantity) in canonical.aid.iter() {
            if quantity < 0 {
                issues.push(QualityIssue {
                    issue_type: QualityIssueType::OutOfRange,
                    severity: QualitySeverity::Error,
                    description: format!("Negative quantity {} for {}", quantity, field),
                    field: Some(field.name().to_string()),
                    suggestion: Some("Confirm whether this is a return or a typo".to_string()),
                });
            }
        }

        if canonical.aid.iter().all(|(_, q)| q == 0) && canonical.viveres.unwrap_or(0) == 0 {
            issues.push(QualityIssue {
                issue_type: QualityIssueType::MissingData,
                severity: QualitySeverity::Warning,
                description: "Record carries no aid quantities".to_string(),
                field: None,
                suggestion: None,
            });
        }

        issues
    }

    fn assess_event(&self, record: &NormalizedRecord) -> Vec<QualityIssue> {
        let mut issues = Vec::new();
        let metadata = &record.normalization;

        if metadata.event_rule == EventRule::Passthrough {
            issues.push(QualityIssue {
                issue_type: QualityIssueType::SuspiciousValue,
                severity: QualitySeverity::Warning,
                description: format!("Event '{}' matched no known category", record.record.event),
                field: Some("evento".to_string()),
                suggestion: Some("Add an alias or keyword to the ruleset".to_string()),
            });
        }

        if !matches!(
            metadata.reclassification,
            ReclassificationRule::Unchanged | ReclassificationRule::Discarded
        ) {
            issues.push(QualityIssue {
                issue_type: QualityIssueType::InferredValue,
                severity: QualitySeverity::Info,
                description: format!(
                    "Event inferred as {} ({})",
                    record.record.event,
                    metadata.reclassification.as_str()
                ),
                field: Some("evento".to_string()),
                suggestion: None,
            });
        }

        issues
    }

    /// Calculate overall quality score based on issues
    fn calculate_quality_score(&self, issues: &[QualityIssue]) -> f64 {
        issues.iter().fold(1.0_f64, |score, issue| {
            let deduction = match issue.severity {
                QualitySeverity::Info => 0.01,
                QualitySeverity::Warning => 0.05,
                QualitySeverity::Error => 0.15,
                QualitySeverity::Critical => 0.30,
            };
            (score - deduction).max(0.0)
        })
    }

    fn determine_decision(&self, quality_score: f64, issues: &[QualityIssue]) -> QualityDecision {
        if issues.iter().any(|i| i.severity == QualitySeverity::Critical) {
            return QualityDecision::Quarantine;
        }

        if quality_score < self.config.min_quality_score {
            return QualityDecision::Quarantine;
        }

        if issues.iter().any(|i| i.severity >= QualitySeverity::Warning) {
            return QualityDecision::AcceptWithWarnings;
        }

        QualityDecision::Accept
    }
}

impl QualityGate for DefaultQualityGate {
    fn assess(&self, record: &NormalizedRecord) -> QualityAssessedRecord {
        let mut issues: Vec<QualityIssue> = record
            .normalization
            .warnings
            .iter()
            .map(|warning| QualityIssue {
                issue_type: QualityIssueType::SuspiciousValue,
                severity: QualitySeverity::Info,
                description: format!("Normalization warning: {}", warning),
                field: None,
                suggestion: None,
            })
            .collect();

        issues.extend(self.assess_geography(record));
        issues.extend(self.assess_date(record));
        issues.extend(self.assess_quantities(record));
        issues.extend(self.assess_event(record));

        let quality_score = self.calculate_quality_score(&issues);
        let decision = self.determine_decision(quality_score, &issues);
        crate::observability::metrics::quality_gate::decision(decision.as_str(), quality_score, issues.len());

        QualityAssessedRecord {
            normalized_record: record.clone(),
            quality_assessment: QualityAssessment {
                decision,
                quality_score,
                issues,
                rule_version: self.config.rule_version.clone(),
            },
            assessed_at: Utc::now(),
        }
    }
}

impl Default for DefaultQualityGate {
    fn default() -> Self {
        Self::new()
    }
}
