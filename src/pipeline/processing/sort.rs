use std::cmp::Ordering;

use tracing::{debug, instrument};

use crate::config::MissingDatePlacement;
use crate::types::{Row, Table};

/// Order rows by (transaction date, transaction id).
///
/// Missing dates go to the end or the front per `missing_dates`; missing ids
/// always sort after present ids. The sort is stable, so rows with equal keys
/// keep their input order.
#[instrument(skip_all, fields(rows = table.len()))]
pub fn sort_transactions(table: &Table, missing_dates: MissingDatePlacement) -> Table {
    let mut rows: Vec<Row> = table.rows().to_vec();
    rows.sort_by(|a, b| compare_rows(a, b, missing_dates));
    debug!(?missing_dates, "rows sorted by date and id");
    Table::new(rows)
}

fn compare_rows(a: &Row, b: &Row, missing_dates: MissingDatePlacement) -> Ordering {
    let (a, b) = (&a.transaction, &b.transaction);
    let by_date = match (&a.transaction_date, &b.transaction_date) {
        (Some(x), Some(y)) => x.cmp(y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => match missing_dates {
            MissingDatePlacement::Last => Ordering::Greater,
            MissingDatePlacement::First => Ordering::Less,
        },
        (Some(_), None) => match missing_dates {
            MissingDatePlacement::Last => Ordering::Less,
            MissingDatePlacement::First => Ordering::Greater,
        },
    };
    by_date.then_with(|| none_last(&a.transaction_id, &b.transaction_id))
}

/// Ascending order with `None` after every present value
pub(crate) fn none_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    }
}
