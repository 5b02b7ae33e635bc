//! Frequency counts of a single column's values

use std::collections::HashMap;

use crate::error::{ReconcilerError, Result};
use crate::pipeline::processing::sort::none_last;
use crate::types::{Column, RawTable, Table};

/// Count each distinct value. Missing values are counted under `None` only
/// when `include_missing` is set. Sorted by count descending, then value
/// ascending with `None` last.
pub fn value_counts<'a, I>(values: I, include_missing: bool) -> Vec<(Option<String>, usize)>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut counts: HashMap<Option<&str>, usize> = HashMap::new();
    for value in values {
        if value.is_none() && !include_missing {
            continue;
        }
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut tally: Vec<(Option<String>, usize)> = counts
        .into_iter()
        .map(|(value, count)| (value.map(str::to_string), count))
        .collect();
    tally.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| none_last(&a.0, &b.0)));
    tally
}

/// Tally a column of the raw table as loaded
pub fn raw_value_counts(
    raw: &RawTable,
    header: &str,
    include_missing: bool,
) -> Result<Vec<(Option<String>, usize)>> {
    let column = raw
        .column(header)
        .ok_or_else(|| ReconcilerError::MissingColumn(header.to_string()))?;
    Ok(value_counts(column, include_missing))
}

/// Tally a canonical column of a normalized table, using its text rendering
pub fn column_value_counts(
    table: &Table,
    column: Column,
    include_missing: bool,
) -> Vec<(Option<String>, usize)> {
    let rendered: Vec<Option<String>> = table.transactions().map(|t| t.render(column)).collect();
    value_counts(rendered.iter().map(|v| v.as_deref()), include_missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transaction;

    fn entry(value: Option<&str>, count: usize) -> (Option<String>, usize) {
        (value.map(str::to_string), count)
    }

    #[test]
    fn test_counts_sorted_by_frequency_then_value() {
        let values = vec![Some("Cash"), Some("Card"), None, Some("Cash"), Some("ERROR"), None];

        assert_eq!(
            value_counts(values.clone(), false),
            vec![entry(Some("Cash"), 2), entry(Some("Card"), 1), entry(Some("ERROR"), 1)]
        );
        assert_eq!(
            value_counts(values, true),
            vec![
                entry(Some("Cash"), 2),
                entry(None, 2),
                entry(Some("Card"), 1),
                entry(Some("ERROR"), 1),
            ]
        );
    }

    #[test]
    fn test_raw_column_must_exist() {
        let raw = RawTable::new(vec!["Item".to_string()], vec![vec![Some("Tea".to_string())]]);
        assert_eq!(
            raw_value_counts(&raw, "Item", false).unwrap(),
            vec![entry(Some("Tea"), 1)]
        );
        assert!(matches!(
            raw_value_counts(&raw, "Location", false),
            Err(ReconcilerError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_normalized_column_counts() {
        let table = Table::from_transactions(vec![
            Transaction {
                quantity: Some(2),
                ..Transaction::default()
            },
            Transaction {
                quantity: Some(2),
                ..Transaction::default()
            },
            Transaction::default(),
        ]);
        assert_eq!(
            column_value_counts(&table, Column::Quantity, true),
            vec![entry(Some("2"), 2), entry(None, 1)]
        );
    }
}
