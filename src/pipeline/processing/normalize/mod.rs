use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::ColumnMap;
use crate::constants;
use crate::error::{ReconcilerError, Result};
use crate::observability::metrics;
use crate::types::{Column, RawTable, Table, Transaction};

/// Outcome of coercing one raw cell
#[derive(Debug, Clone, PartialEq)]
enum Coerced<T> {
    /// The source had no value
    Missing,
    Value(T),
    /// The source had a value that failed coercion; it becomes missing
    Degraded,
}

impl<T> Coerced<T> {
    fn into_option(self) -> Option<T> {
        match self {
            Coerced::Value(v) => Some(v),
            Coerced::Missing | Coerced::Degraded => None,
        }
    }
}

/// Summary of a normalization pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    pub rows: usize,
    /// Cells holding a value that could not be coerced, per column
    pub degraded: BTreeMap<Column, usize>,
}

impl NormalizationReport {
    pub fn total_degraded(&self) -> usize {
        self.degraded.values().sum()
    }

    pub fn degraded_in(&self, column: Column) -> usize {
        self.degraded.get(&column).copied().unwrap_or(0)
    }
}

/// Column positions of the canonical columns within a raw table
struct ColumnIndex([usize; 8]);

impl ColumnIndex {
    /// Fails on the first canonical column whose header is absent
    fn resolve(raw: &RawTable, columns: &ColumnMap) -> Result<Self> {
        let mut positions = [0usize; 8];
        for (slot, column) in positions.iter_mut().zip(Column::ALL) {
            let header = columns.header(column);
            *slot = raw
                .column_index(header)
                .ok_or_else(|| ReconcilerError::MissingColumn(header.to_string()))?;
        }
        Ok(Self(positions))
    }

    fn of(&self, column: Column) -> usize {
        // Column::ALL order matches the enum declaration order
        self.0[column as usize]
    }
}

/// Coerce a raw table into canonical typed columns.
///
/// Unparsable cells become missing and are counted; the only error is a
/// required header that the raw table does not carry.
#[instrument(skip_all, fields(rows = raw.len()))]
pub fn normalize(raw: &RawTable, columns: &ColumnMap) -> Result<(Table, NormalizationReport)> {
    let index = ColumnIndex::resolve(raw, columns)?;
    let mut report = NormalizationReport {
        rows: raw.len(),
        degraded: BTreeMap::new(),
    };

    let mut transactions = Vec::with_capacity(raw.len());
    for row in 0..raw.len() {
        let cell = |column: Column| raw.cell(row, index.of(column));

        let quantity = settle(
            parse_quantity,
            Column::Quantity,
            cell(Column::Quantity),
            row,
            &mut report,
        );
        let unit_price = settle(
            parse_amount,
            Column::UnitPrice,
            cell(Column::UnitPrice),
            row,
            &mut report,
        );
        let total = settle(parse_amount, Column::Total, cell(Column::Total), row, &mut report);
        let transaction_date = settle(
            parse_datetime,
            Column::TransactionDate,
            cell(Column::TransactionDate),
            row,
            &mut report,
        );

        transactions.push(Transaction {
            transaction_id: parse_text(cell(Column::TransactionId)),
            item: parse_text(cell(Column::Item)),
            quantity,
            unit_price,
            total,
            payment_method: parse_text(cell(Column::PaymentMethod)),
            location: parse_text(cell(Column::Location)),
            transaction_date,
        });
    }

    for (column, count) in &report.degraded {
        warn!(%column, count, "cells degraded to missing");
        metrics::normalize::cells_degraded(column.as_str(), *count);
    }
    metrics::normalize::rows_processed(report.rows);
    info!(
        rows = report.rows,
        degraded = report.total_degraded(),
        "schema normalization complete"
    );

    Ok((Table::from_transactions(transactions), report))
}

/// Run a typed parser over one cell, counting a degraded value against its column
fn settle<T>(
    parse: fn(Option<&str>) -> Coerced<T>,
    column: Column,
    value: Option<&str>,
    row: usize,
    report: &mut NormalizationReport,
) -> Option<T> {
    let coerced = parse(value);
    if matches!(coerced, Coerced::Degraded) {
        debug!(row, %column, ?value, "cell failed coercion");
        *report.degraded.entry(column).or_insert(0) += 1;
    }
    coerced.into_option()
}

/// Trimmed text; nulls stay null and blanks stay blank
fn parse_text(value: Option<&str>) -> Option<String> {
    value.map(|s| s.trim().to_string())
}

/// Trimmed, non-empty text or `None`
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Non-negative integral quantity. "3.0" is accepted, "3.5" is not.
fn parse_quantity(value: Option<&str>) -> Coerced<u32> {
    let Some(text) = non_blank(value) else {
        return Coerced::Missing;
    };

    if let Ok(q) = text.parse::<u32>() {
        return Coerced::Value(q);
    }

    match text.parse::<f64>() {
        Ok(q) if q.is_finite() && q >= 0.0 && q.fract() == 0.0 && q <= f64::from(u32::MAX) => {
            Coerced::Value(q as u32)
        }
        _ => Coerced::Degraded,
    }
}

/// Non-negative finite monetary amount
fn parse_amount(value: Option<&str>) -> Coerced<f64> {
    let Some(text) = non_blank(value) else {
        return Coerced::Missing;
    };

    match text.parse::<f64>() {
        // adding 0.0 folds -0.0 into 0.0
        Ok(v) if v.is_finite() && v >= 0.0 => Coerced::Value(v + 0.0),
        _ => Coerced::Degraded,
    }
}

/// Date/time in any of the accepted layouts; date-only values land at midnight
fn parse_datetime(value: Option<&str>) -> Coerced<NaiveDateTime> {
    let Some(text) = non_blank(value) else {
        return Coerced::Missing;
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Coerced::Value(dt.naive_utc());
    }

    for format in constants::DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Coerced::Value(dt);
        }
    }

    for format in constants::DATE_FORMATS {
        if let Some(dt) = NaiveDate::parse_from_str(text, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Coerced::Value(dt);
        }
    }

    Coerced::Degraded
}
