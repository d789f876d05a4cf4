//! Metrics for the normalizer, cleanup job and report path, recorded through
//! the `metrics` facade and exposed in Prometheus text format.

use std::fmt;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::error::{NormalizerError, Result};

/// Every metric name used in the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Normalize metrics
    NormalizeRecordsKept,
    NormalizeRecordsDiscarded,
    NormalizeRecordsReclassified,
    NormalizeDepartmentSwaps,
    NormalizeUnmappedDepartments,
    NormalizeBatchSize,

    // Quality Gate metrics
    QualityGateDecisions,
    QualityGateQualityScore,
    QualityGateIssuesDetected,

    // Cleanup metrics
    CleanupRecordsUpdated,
    CleanupRecordsDeleted,
    CleanupErrors,
    CleanupBatchSize,
    CleanupDuration,

    // Report metrics
    ReportCacheHits,
    ReportCacheMisses,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::NormalizeRecordsKept => "aid_normalize_records_kept_total",
            MetricName::NormalizeRecordsDiscarded => "aid_normalize_records_discarded_total",
            MetricName::NormalizeRecordsReclassified => "aid_normalize_records_reclassified_total",
            MetricName::NormalizeDepartmentSwaps => "aid_normalize_department_swaps_total",
            MetricName::NormalizeUnmappedDepartments => "aid_normalize_unmapped_departments_total",
            MetricName::NormalizeBatchSize => "aid_normalize_batch_size",

            MetricName::QualityGateDecisions => "aid_quality_gate_decisions_total",
            MetricName::QualityGateQualityScore => "aid_quality_gate_quality_score",
            MetricName::QualityGateIssuesDetected => "aid_quality_gate_issues_detected_total",

            MetricName::CleanupRecordsUpdated => "aid_cleanup_records_updated_total",
            MetricName::CleanupRecordsDeleted => "aid_cleanup_records_deleted_total",
            MetricName::CleanupErrors => "aid_cleanup_errors_total",
            MetricName::CleanupBatchSize => "aid_cleanup_batch_size",
            MetricName::CleanupDuration => "aid_cleanup_duration_seconds",

            MetricName::ReportCacheHits => "aid_report_cache_hits_total",
            MetricName::ReportCacheMisses => "aid_report_cache_misses_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            NormalizeRecordsKept,
            NormalizeRecordsDiscarded,
            NormalizeRecordsReclassified,
            NormalizeDepartmentSwaps,
            NormalizeUnmappedDepartments,
            NormalizeBatchSize,
            QualityGateDecisions,
            QualityGateQualityScore,
            QualityGateIssuesDetected,
            CleanupRecordsUpdated,
            CleanupRecordsDeleted,
            CleanupErrors,
            CleanupBatchSize,
            CleanupDuration,
            ReportCacheHits,
            ReportCacheMisses,
        ]
        .into_iter()
    }

    /// (phase, description)
    pub fn metadata(&self) -> (&'static str, &'static str) {
        match self {
            MetricName::NormalizeRecordsKept => ("normalize", "Records kept, by event rule"),
            MetricName::NormalizeRecordsDiscarded => ("normalize", "Records discarded by the event rules"),
            MetricName::NormalizeRecordsReclassified => ("normalize", "Events inferred from aid, by rule"),
            MetricName::NormalizeDepartmentSwaps => ("normalize", "District names found in the department column"),
            MetricName::NormalizeUnmappedDepartments => ("normalize", "Departments left outside the official list"),
            MetricName::NormalizeBatchSize => ("normalize", "Normalization batch size"),

            MetricName::QualityGateDecisions => ("quality_gate", "Quality decisions, by decision"),
            MetricName::QualityGateQualityScore => ("quality_gate", "Quality score distribution"),
            MetricName::QualityGateIssuesDetected => ("quality_gate", "Quality issues detected"),

            MetricName::CleanupRecordsUpdated => ("cleanup", "Records rewritten by the cleanup job"),
            MetricName::CleanupRecordsDeleted => ("cleanup", "Records deleted by the cleanup job"),
            MetricName::CleanupErrors => ("cleanup", "Records the cleanup job failed to write"),
            MetricName::CleanupBatchSize => ("cleanup", "Records read per cleanup run"),
            MetricName::CleanupDuration => ("cleanup", "Cleanup run duration"),

            MetricName::ReportCacheHits => ("report", "Cleaned dataset served from cache"),
            MetricName::ReportCacheMisses => ("report", "Cleaned dataset rebuilt"),
        }
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init_metrics() -> Result<()> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| NormalizerError::Config(format!("Failed to install Prometheus recorder: {}", e)))?;

    for metric in MetricName::all_metrics() {
        let (_, description) = metric.metadata();
        if metric.as_str().ends_with("_total") {
            ::metrics::describe_counter!(metric.as_str(), description);
        } else {
            ::metrics::describe_histogram!(metric.as_str(), description);
        }
    }

    let _ = METRICS_HANDLE.set(handle);
    info!("Metrics system initialized");
    Ok(())
}

/// Current metrics in Prometheus text format, if the recorder is installed
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

// ============================================================================
// Normalize Metrics
// ============================================================================

pub mod normalize {
    use super::MetricName;

    /// Record a kept record and the event rule that labeled it
    pub fn record_kept(event_rule: &str) {
        ::metrics::counter!(MetricName::NormalizeRecordsKept.as_str(), "event_rule" => event_rule.to_string()).increment(1);
    }

    pub fn record_discarded() {
        ::metrics::counter!(MetricName::NormalizeRecordsDiscarded.as_str()).increment(1);
    }

    pub fn record_reclassified(rule: &str) {
        ::metrics::counter!(MetricName::NormalizeRecordsReclassified.as_str(), "rule" => rule.to_string()).increment(1);
    }

    pub fn department_swapped() {
        ::metrics::counter!(MetricName::NormalizeDepartmentSwaps.as_str()).increment(1);
    }

    pub fn department_unmapped() {
        ::metrics::counter!(MetricName::NormalizeUnmappedDepartments.as_str()).increment(1);
    }

    pub fn batch_size(size: usize) {
        ::metrics::histogram!(MetricName::NormalizeBatchSize.as_str()).record(size as f64);
    }
}

// ============================================================================
// Quality Gate Metrics
// ============================================================================

pub mod quality_gate {
    use super::MetricName;

    pub fn decision(decision: &str, quality_score: f64, issue_count: usize) {
        ::metrics::counter!(MetricName::QualityGateDecisions.as_str(), "decision" => decision.to_string()).increment(1);
        ::metrics::histogram!(MetricName::QualityGateQualityScore.as_str()).record(quality_score);
        ::metrics::counter!(MetricName::QualityGateIssuesDetected.as_str()).increment(issue_count as u64);
    }
}

// ============================================================================
// Cleanup Metrics
// ============================================================================

pub mod cleanup {
    use super::MetricName;

    pub fn record_updated() {
        ::metrics::counter!(MetricName::CleanupRecordsUpdated.as_str()).increment(1);
    }

    pub fn records_deleted(count: usize) {
        ::metrics::counter!(MetricName::CleanupRecordsDeleted.as_str()).increment(count as u64);
    }

    pub fn record_error() {
        ::metrics::counter!(MetricName::CleanupErrors.as_str()).increment(1);
    }

    pub fn batch_size(size: usize) {
        ::metrics::histogram!(MetricName::CleanupBatchSize.as_str()).record(size as f64);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::CleanupDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Report Metrics
// ============================================================================

pub mod report {
    use super::MetricName;

    pub fn cache_hit() {
        ::metrics::counter!(MetricName::ReportCacheHits.as_str()).increment(1);
    }

    pub fn cache_miss() {
        ::metrics::counter!(MetricName::ReportCacheMisses.as_str()).increment(1);
    }
}
