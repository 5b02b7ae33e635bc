use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::observability::metrics;
use crate::pipeline::processing::sort::none_last;
use crate::types::{Row, Table};

/// Types of unresolved data-quality problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Two or more monetary fields missing after reconciliation
    UnrecoverableMoney,
    /// No parsable transaction date
    MissingTransactionDate,
    /// Total disagrees with quantity × unit price beyond tolerance
    MoneyMismatch,
}

impl IssueKind {
    pub const ALL: [IssueKind; 3] = [
        IssueKind::UnrecoverableMoney,
        IssueKind::MissingTransactionDate,
        IssueKind::MoneyMismatch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::UnrecoverableMoney => "unrecoverable_money",
            IssueKind::MissingTransactionDate => "missing_transaction_date",
            IssueKind::MoneyMismatch => "money_mismatch",
        }
    }

    /// Whether the row exhibits this issue. Flag groups a stage has not
    /// filled in count as false.
    pub fn matches(self, row: &Row) -> bool {
        match self {
            IssueKind::UnrecoverableMoney => row.money.is_some_and(|m| m.is_unrecoverable()),
            IssueKind::MissingTransactionDate => row.transaction.transaction_date.is_none(),
            IssueKind::MoneyMismatch => row.consistency.is_some_and(|c| c.mismatch),
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Issue kinds order by their text name so reports sort the same way they read
impl Ord for IssueKind {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for IssueKind {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One unresolved data-quality problem of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssue {
    /// The record's id exactly as it appears in the table, blank or duplicated included
    pub transaction_id: Option<String>,
    #[serde(rename = "issue")]
    pub kind: IssueKind,
}

impl Ord for QualityIssue {
    fn cmp(&self, other: &Self) -> Ordering {
        none_last(&self.transaction_id, &other.transaction_id).then(self.kind.cmp(&other.kind))
    }
}

impl PartialOrd for QualityIssue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Collect one issue per row per matching kind, sorted by (id, kind).
/// Rows without an id sort last.
#[instrument(skip_all, fields(rows = table.len()))]
pub fn build_quality_report(table: &Table) -> Vec<QualityIssue> {
    let mut issues = Vec::new();
    for kind in IssueKind::ALL {
        let before = issues.len();
        issues.extend(table.iter().filter(|row| kind.matches(row)).map(|row| QualityIssue {
            transaction_id: row.transaction.transaction_id.clone(),
            kind,
        }));
        metrics::quality_report::issue_detected(kind.as_str(), issues.len() - before);
    }
    issues.sort();

    info!(issues = issues.len(), "quality report built");
    issues
}

/// Number of issues of each kind; kinds with no issues are listed with zero
pub fn count_by_kind(issues: &[QualityIssue]) -> BTreeMap<IssueKind, usize> {
    let mut counts: BTreeMap<IssueKind, usize> =
        IssueKind::ALL.iter().map(|kind| (*kind, 0)).collect();
    for issue in issues {
        *counts.entry(issue.kind).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConsistencyFlags, MoneyClass, MoneyFlags, Transaction};
    use chrono::NaiveDate;

    fn money_flags(class: MoneyClass) -> MoneyFlags {
        MoneyFlags {
            class_before: class,
            class,
            need_total: false,
            need_quantity: false,
            need_price: false,
            div0_quantity: false,
            div0_price: false,
            reconstructed_total: false,
            reconstructed_quantity: false,
            reconstructed_price: false,
        }
    }

    fn row(id: Option<&str>, dated: bool, class: MoneyClass, mismatch: bool) -> Row {
        Row {
            transaction: Transaction {
                transaction_id: id.map(str::to_string),
                transaction_date: dated
                    .then(|| NaiveDate::from_ymd_opt(2023, 5, 1))
                    .flatten()
                    .and_then(|d| d.and_hms_opt(0, 0, 0)),
                ..Transaction::default()
            },
            identity: None,
            money: Some(money_flags(class)),
            consistency: Some(ConsistencyFlags {
                expected_total: None,
                mismatch,
            }),
        }
    }

    fn issue(id: Option<&str>, kind: IssueKind) -> QualityIssue {
        QualityIssue {
            transaction_id: id.map(str::to_string),
            kind,
        }
    }

    #[test]
    fn test_issue_kinds_sort_by_name() {
        let mut kinds = IssueKind::ALL.to_vec();
        kinds.sort();
        assert_eq!(
            kinds,
            vec![
                IssueKind::MissingTransactionDate,
                IssueKind::MoneyMismatch,
                IssueKind::UnrecoverableMoney,
            ]
        );
    }

    #[test]
    fn test_collects_and_sorts_issues() {
        let table = Table::new(vec![
            row(Some("T2"), true, MoneyClass::Complete, true),
            row(Some("T1"), false, MoneyClass::Unrecoverable, false),
            row(None, false, MoneyClass::Complete, false),
            row(Some("T3"), true, MoneyClass::Complete, false),
            row(Some(""), true, MoneyClass::Unrecoverable, false),
        ]);

        let issues = build_quality_report(&table);
        assert_eq!(
            issues,
            vec![
                issue(Some(""), IssueKind::UnrecoverableMoney),
                issue(Some("T1"), IssueKind::MissingTransactionDate),
                issue(Some("T1"), IssueKind::UnrecoverableMoney),
                issue(Some("T2"), IssueKind::MoneyMismatch),
                issue(None, IssueKind::MissingTransactionDate),
            ]
        );

        let counts = count_by_kind(&issues);
        assert_eq!(counts[&IssueKind::UnrecoverableMoney], 2);
        assert_eq!(counts[&IssueKind::MissingTransactionDate], 2);
        assert_eq!(counts[&IssueKind::MoneyMismatch], 1);
    }

    #[test]
    fn test_duplicate_ids_are_not_deduplicated() {
        let table = Table::new(vec![
            row(Some("T1"), false, MoneyClass::Complete, false),
            row(Some("T1"), false, MoneyClass::Complete, false),
        ]);
        let issues = build_quality_report(&table);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.transaction_id.as_deref() == Some("T1")));
    }

    #[test]
    fn test_unset_flags_count_as_false() {
        let mut bare = Row::from(Transaction {
            transaction_id: Some("T9".to_string()),
            ..Transaction::default()
        });
        bare.transaction.transaction_date =
            NaiveDate::from_ymd_opt(2023, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));

        let issues = build_quality_report(&Table::new(vec![bare]));
        assert!(issues.is_empty());
    }

    #[test]
    fn test_clean_table_yields_empty_report() {
        let table = Table::new(vec![row(Some("T1"), true, MoneyClass::Complete, false)]);
        assert!(build_quality_report(&table).is_empty());
        assert!(count_by_kind(&[]).values().all(|c| *c == 0));
    }
}
