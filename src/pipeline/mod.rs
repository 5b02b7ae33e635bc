// Reconciliation pipeline: stage implementations and the orchestrator

pub mod processing;

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span};
use uuid::Uuid;

use crate::config::{ColumnMap, Config, MissingDatePlacement};
use crate::error::Result;
use crate::observability::metrics;
use crate::types::{RawTable, Table};
use processing::{
    build_quality_report, check_consistency, normalize, reconcile_money, sort_transactions,
    validate_identity, ConsistencyReport, IdentityReport, IssueKind, NormalizationReport,
    QualityIssue, ReconcileReport, Tolerance,
};

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// SHA-256 of the loaded input, when the caller knows it
    pub input_digest: Option<String>,
    pub rows: usize,
    pub normalization: NormalizationReport,
    pub identity: IdentityReport,
    pub reconcile: ReconcileReport,
    pub consistency: ConsistencyReport,
    pub issue_counts: BTreeMap<IssueKind, usize>,
    pub issues: Vec<QualityIssue>,
    /// Final table with every flag group filled in
    #[serde(skip)]
    pub table: Table,
}

/// Runs the six stages in order over one raw table
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    columns: ColumnMap,
    tolerance: Tolerance,
    missing_dates: MissingDatePlacement,
}

impl Pipeline {
    /// Build from validated configuration. An invalid tolerance fails here,
    /// before any data is touched.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            columns: config.columns.clone(),
            tolerance: config.tolerance()?,
            missing_dates: config.pipeline.missing_dates,
        })
    }

    /// Normalize, sort, validate identity, reconcile money, check
    /// consistency and build the issue list.
    ///
    /// Fails only when the raw table lacks a required column; data problems
    /// are reported through flags and issues instead.
    pub fn run(&self, raw: &RawTable) -> Result<PipelineResult> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", %run_id, rows = raw.len());
        let _enter = span.enter();

        let started_at = Utc::now();
        let clock = Instant::now();
        info!("Starting pipeline");

        let (normalized, normalization) = normalize(raw, &self.columns)?;
        let sorted = sort_transactions(&normalized, self.missing_dates);
        let (validated, identity) = validate_identity(&sorted);
        let (reconciled, reconcile) = reconcile_money(&validated);
        let (checked, consistency) = check_consistency(&reconciled, self.tolerance);
        let issues = build_quality_report(&checked);

        let elapsed = clock.elapsed();
        metrics::pipeline::run_completed(elapsed.as_secs_f64());
        info!(
            issues = issues.len(),
            duration_ms = elapsed.as_millis() as u64,
            "Pipeline finished"
        );

        Ok(PipelineResult {
            run_id,
            started_at,
            duration_ms: elapsed.as_millis() as u64,
            input_digest: None,
            rows: checked.len(),
            normalization,
            identity,
            reconcile,
            consistency,
            issue_counts: processing::quality_report::count_by_kind(&issues),
            issues,
            table: checked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcilerError;
    use crate::types::Column;

    fn raw(rows: Vec<[&str; 8]>) -> RawTable {
        RawTable::new(
            Column::ALL
                .iter()
                .map(|c| c.default_header().to_string())
                .collect(),
            rows.into_iter()
                .map(|r| {
                    r.iter()
                        .map(|c| (!c.is_empty()).then(|| c.to_string()))
                        .collect()
                })
                .collect(),
        )
    }

    #[test]
    fn test_run_fills_every_flag_group() {
        let table = raw(vec![
            ["T2", "Tea", "2", "3", "10", "Card", "Takeaway", "2023-02-01"],
            ["T1", "Coffee", "3", "2.5", "", "Cash", "In-store", "2023-01-01"],
            ["T3", "Cake", "", "0", "5", "Cash", "", "ERROR"],
            ["T4", "Juice", "", "", "3", "", "", "2023-03-01"],
        ]);
        let result = Pipeline::default().run(&table).unwrap();

        assert_eq!(result.rows, 4);
        assert!(result.table.iter().all(|r| r.identity.is_some()
            && r.money.is_some()
            && r.consistency.is_some()));

        let ids: Vec<_> = result
            .table
            .transactions()
            .map(|t| t.transaction_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["T1", "T2", "T4", "T3"]);

        assert_eq!(result.reconcile.n_reconstructed_total, 1);
        assert_eq!(result.reconcile.n_blocked_div0, 1);
        assert_eq!(result.consistency.n_mismatch, 1);
        assert_eq!(result.normalization.degraded_in(Column::TransactionDate), 1);

        let pairs: Vec<(String, &str)> = result
            .issues
            .iter()
            .map(|i| (i.transaction_id.clone().unwrap(), i.kind.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("T2".to_string(), "money_mismatch"),
                ("T3".to_string(), "missing_transaction_date"),
                ("T4".to_string(), "unrecoverable_money"),
            ]
        );
        assert_eq!(result.issue_counts[&IssueKind::MoneyMismatch], 1);
    }

    #[test]
    fn test_invalid_tolerance_fails_before_running() {
        let mut config = Config::default();
        config.pipeline.tolerance = f64::NAN;
        assert!(matches!(
            Pipeline::new(&config),
            Err(ReconcilerError::InvalidTolerance(_))
        ));
    }

    #[test]
    fn test_missing_column_aborts_run() {
        let mut table = raw(vec![]);
        table.headers.pop();
        assert!(matches!(
            Pipeline::default().run(&table),
            Err(ReconcilerError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_empty_table_runs_clean() {
        let result = Pipeline::default().run(&raw(vec![])).unwrap();
        assert_eq!(result.rows, 0);
        assert!(result.issues.is_empty());
        assert_eq!(result.identity.n_rows, 0);
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let result = Pipeline::default()
            .run(&raw(vec![["T1", "Tea", "1", "2", "", "", "", ""]]))
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["rows"], 1);
        assert_eq!(json["consistency"]["tolerance"], 0.01);
        assert_eq!(json["issue_counts"]["missing_transaction_date"], 1);
        assert!(json.get("table").is_none());
    }
}
