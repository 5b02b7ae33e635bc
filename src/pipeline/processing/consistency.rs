use serde::{Serialize, Serializer};
use tracing::{debug, info, instrument};

use crate::constants;
use crate::error::{ReconcilerError, Result};
use crate::observability::metrics;
use crate::types::{ConsistencyFlags, Row, Table};

/// Absolute tolerance for total vs quantity × unit price, in currency units.
/// Always finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Tolerance(f64);

impl Tolerance {
    pub fn new(value: f64) -> Result<Self> {
        if value.is_finite() && value >= 0.0 {
            Ok(Self(value))
        } else {
            Err(ReconcilerError::InvalidTolerance(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self(constants::DEFAULT_TOLERANCE)
    }
}

impl Serialize for Tolerance {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0)
    }
}

/// Summary of the consistency check
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsistencyReport {
    /// Rows with all three monetary fields present
    pub n_checked: usize,
    pub n_mismatch: usize,
    pub tolerance: Tolerance,
}

/// Flag money-complete rows whose total strays from quantity × unit price by
/// more than `tolerance`. A deviation exactly equal to the tolerance passes.
///
/// The comparison is on raw `f64` values, so a decimal difference that reads
/// as equal to the tolerance can still exceed it: 1.01 - 1.0 evaluates to
/// 0.010000000000000009 and is a mismatch at tolerance 0.01.
#[instrument(skip_all, fields(rows = table.len(), tolerance = tolerance.value()))]
pub fn check_consistency(table: &Table, tolerance: Tolerance) -> (Table, ConsistencyReport) {
    let mut report = ConsistencyReport {
        tolerance,
        ..ConsistencyReport::default()
    };

    let rows: Vec<Row> = table
        .iter()
        .map(|row| {
            let t = &row.transaction;
            let expected_total = match (t.quantity, t.unit_price, t.total) {
                (Some(q), Some(p), Some(_)) => Some(f64::from(q) * p),
                _ => None,
            };

            let mut mismatch = false;
            if let (Some(expected), Some(total)) = (expected_total, t.total) {
                report.n_checked += 1;
                let deviation = (total - expected).abs();
                if deviation > tolerance.value() {
                    mismatch = true;
                    report.n_mismatch += 1;
                    metrics::consistency::deviation_recorded(deviation);
                    debug!(
                        id = ?t.transaction_id,
                        total,
                        expected,
                        "total does not match quantity × unit price"
                    );
                }
            }

            Row {
                consistency: Some(ConsistencyFlags {
                    expected_total,
                    mismatch,
                }),
                ..row.clone()
            }
        })
        .collect();

    metrics::consistency::checked(report.n_checked, report.n_mismatch);
    info!(
        checked = report.n_checked,
        mismatches = report.n_mismatch,
        "consistency check complete"
    );

    (Table::new(rows), report)
}
