//! Metrics for the reconciliation pipeline
//!
//! Every stage records through the `metrics` facade. Nothing is exported
//! unless a recorder is installed; the CLI installs a Prometheus recorder
//! when asked to write an exposition file.

use std::fmt;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::error::{ReconcilerError, Result};

/// Enum representing all metric names used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Normalize metrics
    NormalizeRowsProcessed,
    NormalizeCellsDegraded,

    // Identity metrics
    IdentityIdsMissing,
    IdentityRowsDuplicated,
    IdentityExactDuplicates,

    // Reconcile metrics
    ReconcileFieldsReconstructed,
    ReconcileRowsBlocked,
    ReconcileRowsUnrecoverable,

    // Consistency metrics
    ConsistencyRowsChecked,
    ConsistencyMismatches,
    ConsistencyDeviation,

    // Quality report metrics
    QualityIssuesDetected,

    // Run metrics
    PipelineRuns,
    PipelineDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::NormalizeRowsProcessed => "pos_normalize_rows_processed_total",
            MetricName::NormalizeCellsDegraded => "pos_normalize_cells_degraded_total",

            MetricName::IdentityIdsMissing => "pos_identity_ids_missing_total",
            MetricName::IdentityRowsDuplicated => "pos_identity_rows_duplicated_total",
            MetricName::IdentityExactDuplicates => "pos_identity_exact_duplicates_total",

            MetricName::ReconcileFieldsReconstructed => "pos_reconcile_fields_reconstructed_total",
            MetricName::ReconcileRowsBlocked => "pos_reconcile_rows_blocked_total",
            MetricName::ReconcileRowsUnrecoverable => "pos_reconcile_rows_unrecoverable_total",

            MetricName::ConsistencyRowsChecked => "pos_consistency_rows_checked_total",
            MetricName::ConsistencyMismatches => "pos_consistency_mismatches_total",
            MetricName::ConsistencyDeviation => "pos_consistency_deviation",

            MetricName::QualityIssuesDetected => "pos_quality_issues_detected_total",

            MetricName::PipelineRuns => "pos_pipeline_runs_total",
            MetricName::PipelineDuration => "pos_pipeline_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it again is a no-op.
pub fn init() -> Result<()> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        ReconcilerError::Config(format!("Failed to install Prometheus recorder: {}", e))
    })?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics recorder installed");
    Ok(())
}

/// Prometheus exposition text, if a recorder was installed
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

pub mod normalize {
    use super::MetricName;

    pub fn rows_processed(count: usize) {
        ::metrics::counter!(MetricName::NormalizeRowsProcessed.as_str()).increment(count as u64);
    }

    pub fn cells_degraded(column: &str, count: usize) {
        ::metrics::counter!(MetricName::NormalizeCellsDegraded.as_str(),
            "column" => column.to_string()
        )
        .increment(count as u64);
    }
}

pub mod identity {
    use super::MetricName;

    pub fn validated(missing: usize, duplicated: usize, exact_duplicates: usize) {
        ::metrics::counter!(MetricName::IdentityIdsMissing.as_str()).increment(missing as u64);
        ::metrics::counter!(MetricName::IdentityRowsDuplicated.as_str())
            .increment(duplicated as u64);
        ::metrics::counter!(MetricName::IdentityExactDuplicates.as_str())
            .increment(exact_duplicates as u64);
    }
}

pub mod reconcile {
    use super::MetricName;

    pub fn field_reconstructed(field: &str, count: usize) {
        ::metrics::counter!(MetricName::ReconcileFieldsReconstructed.as_str(),
            "field" => field.to_string()
        )
        .increment(count as u64);
    }

    pub fn rows_blocked(count: usize) {
        ::metrics::counter!(MetricName::ReconcileRowsBlocked.as_str()).increment(count as u64);
    }

    pub fn rows_unrecoverable(count: usize) {
        ::metrics::counter!(MetricName::ReconcileRowsUnrecoverable.as_str())
            .increment(count as u64);
    }
}

pub mod consistency {
    use super::MetricName;

    pub fn checked(rows: usize, mismatches: usize) {
        ::metrics::counter!(MetricName::ConsistencyRowsChecked.as_str()).increment(rows as u64);
        ::metrics::counter!(MetricName::ConsistencyMismatches.as_str())
            .increment(mismatches as u64);
    }

    /// Absolute deviation of a mismatched row
    pub fn deviation_recorded(deviation: f64) {
        ::metrics::histogram!(MetricName::ConsistencyDeviation.as_str()).record(deviation);
    }
}

pub mod quality_report {
    use super::MetricName;

    pub fn issue_detected(kind: &str, count: usize) {
        ::metrics::counter!(MetricName::QualityIssuesDetected.as_str(),
            "issue" => kind.to_string()
        )
        .increment(count as u64);
    }
}

pub mod pipeline {
    use super::MetricName;

    pub fn run_completed(duration_secs: f64) {
        ::metrics::counter!(MetricName::PipelineRuns.as_str()).increment(1);
        ::metrics::histogram!(MetricName::PipelineDuration.as_str()).record(duration_secs);
    }
}
