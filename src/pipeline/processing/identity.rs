use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, instrument};

use crate::observability::metrics;
use crate::types::{IdentityFlags, Row, Table, Transaction};

/// Summary of identity validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentityReport {
    pub n_rows: usize,
    pub n_id_missing: usize,
    pub n_id_duplicated_rows: usize,
    /// Distinct ids among the duplicated rows
    pub n_id_duplicated_unique: usize,
    pub n_exact_duplicated_rows: usize,
}

/// Hashable image of all eight canonical columns. Amounts compare by bit
/// pattern, which is exact because normalization never yields NaN or -0.0.
#[derive(Debug, PartialEq, Eq, Hash)]
struct RowKey<'a> {
    transaction_id: Option<&'a str>,
    item: Option<&'a str>,
    quantity: Option<u32>,
    unit_price: Option<u64>,
    total: Option<u64>,
    payment_method: Option<&'a str>,
    location: Option<&'a str>,
    transaction_date: Option<NaiveDateTime>,
}

impl<'a> From<&'a Transaction> for RowKey<'a> {
    fn from(t: &'a Transaction) -> Self {
        Self {
            transaction_id: t.transaction_id.as_deref(),
            item: t.item.as_deref(),
            quantity: t.quantity,
            unit_price: t.unit_price.map(f64::to_bits),
            total: t.total.map(f64::to_bits),
            payment_method: t.payment_method.as_deref(),
            location: t.location.as_deref(),
            transaction_date: t.transaction_date,
        }
    }
}

/// The id if it is present and not blank
fn present_id(t: &Transaction) -> Option<&str> {
    t.transaction_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// Flag missing ids, duplicated ids and exact duplicate rows.
///
/// Every occurrence of a duplicate is flagged, not just the repeats. A blank
/// id counts as missing and is never considered duplicated.
#[instrument(skip_all, fields(rows = table.len()))]
pub fn validate_identity(table: &Table) -> (Table, IdentityReport) {
    let mut id_counts: HashMap<&str, usize> = HashMap::new();
    let mut row_counts: HashMap<RowKey<'_>, usize> = HashMap::new();
    for t in table.transactions() {
        if let Some(id) = present_id(t) {
            *id_counts.entry(id).or_insert(0) += 1;
        }
        *row_counts.entry(RowKey::from(t)).or_insert(0) += 1;
    }

    let mut report = IdentityReport {
        n_rows: table.len(),
        ..IdentityReport::default()
    };
    let mut duplicated_ids: HashSet<&str> = HashSet::new();

    let rows: Vec<Row> = table
        .iter()
        .map(|row| {
            let t = &row.transaction;
            let id = present_id(t);
            let id_duplicated = id.is_some_and(|id| id_counts.get(id).copied().unwrap_or(0) > 1);
            let flags = IdentityFlags {
                id_missing: id.is_none(),
                id_duplicated,
                row_exact_duplicate: row_counts.get(&RowKey::from(t)).copied().unwrap_or(0) > 1,
            };

            if flags.id_missing {
                report.n_id_missing += 1;
            }
            if let (true, Some(id)) = (flags.id_duplicated, id) {
                report.n_id_duplicated_rows += 1;
                duplicated_ids.insert(id);
            }
            if flags.row_exact_duplicate {
                report.n_exact_duplicated_rows += 1;
            }

            Row {
                identity: Some(flags),
                ..row.clone()
            }
        })
        .collect();
    report.n_id_duplicated_unique = duplicated_ids.len();

    metrics::identity::validated(
        report.n_id_missing,
        report.n_id_duplicated_rows,
        report.n_exact_duplicated_rows,
    );
    info!(
        missing = report.n_id_missing,
        duplicated_rows = report.n_id_duplicated_rows,
        duplicated_ids = report.n_id_duplicated_unique,
        exact_duplicates = report.n_exact_duplicated_rows,
        "identity validation complete"
    );

    (Table::new(rows), report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(id: Option<&str>, item: &str, quantity: u32) -> Transaction {
        Transaction {
            transaction_id: id.map(str::to_string),
            item: Some(item.to_string()),
            quantity: Some(quantity),
            unit_price: Some(2.0),
            total: Some(2.0 * f64::from(quantity)),
            ..Transaction::default()
        }
    }

    fn flags(table: &Table, i: usize) -> IdentityFlags {
        table.rows()[i].identity.unwrap()
    }

    #[test]
    fn test_exact_duplicates_flag_every_occurrence() {
        let table = Table::from_transactions(vec![
            txn(Some("T1"), "Coffee", 2),
            txn(Some("T1"), "Coffee", 2),
            txn(Some("T2"), "Tea", 1),
        ]);
        let (validated, report) = validate_identity(&table);

        for i in 0..2 {
            assert!(flags(&validated, i).row_exact_duplicate);
            assert!(flags(&validated, i).id_duplicated);
            assert!(!flags(&validated, i).id_missing);
        }
        assert_eq!(flags(&validated, 2), IdentityFlags::default());
        assert_eq!(
            report,
            IdentityReport {
                n_rows: 3,
                n_id_missing: 0,
                n_id_duplicated_rows: 2,
                n_id_duplicated_unique: 1,
                n_exact_duplicated_rows: 2,
            }
        );
    }

    #[test]
    fn test_shared_id_with_different_values_is_not_exact_duplicate() {
        let table = Table::from_transactions(vec![
            txn(Some("T1"), "Coffee", 2),
            txn(Some("T1"), "Cake", 2),
            txn(Some("T3"), "Tea", 1),
            txn(Some("T3"), "Tea", 4),
        ]);
        let (validated, report) = validate_identity(&table);

        assert!(validated.iter().all(|r| r.identity.unwrap().id_duplicated));
        assert!(validated.iter().all(|r| !r.identity.unwrap().row_exact_duplicate));
        assert_eq!(report.n_id_duplicated_rows, 4);
        assert_eq!(report.n_id_duplicated_unique, 2);
        assert_eq!(report.n_exact_duplicated_rows, 0);
    }

    #[test]
    fn test_blank_id_is_missing_never_duplicated() {
        let table = Table::from_transactions(vec![
            txn(Some(""), "Coffee", 2),
            txn(Some(""), "Cake", 1),
            txn(None, "Tea", 1),
        ]);
        let (validated, report) = validate_identity(&table);

        for row in validated.iter() {
            let f = row.identity.unwrap();
            assert!(f.id_missing);
            assert!(!f.id_duplicated);
        }
        assert_eq!(report.n_id_missing, 3);
        assert_eq!(report.n_id_duplicated_rows, 0);
    }

    #[test]
    fn test_missing_values_compare_equal_for_exact_duplicates() {
        let blank = Transaction::default();
        let table = Table::from_transactions(vec![blank.clone(), blank]);
        let (validated, report) = validate_identity(&table);

        assert!(validated.iter().all(|r| r.identity.unwrap().row_exact_duplicate));
        assert_eq!(report.n_exact_duplicated_rows, 2);
        assert_eq!(report.n_id_missing, 2);
        assert_eq!(validated.len(), table.len());
    }
}
