use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::observability::metrics;
use crate::types::{MoneyClass, MoneyFlags, Row, Table, Transaction};

/// Summary of monetary reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub n_complete_before: usize,
    pub n_reconstructable_before: usize,
    pub n_unrecoverable_before: usize,
    pub n_reconstructed_total: usize,
    pub n_reconstructed_quantity: usize,
    pub n_reconstructed_price: usize,
    /// Rows whose reconstruction would have divided by zero
    pub n_blocked_div0: usize,
    pub n_complete: usize,
    pub n_reconstructable: usize,
    pub n_unrecoverable: usize,
}

impl ReconcileReport {
    pub fn n_reconstructed(&self) -> usize {
        self.n_reconstructed_total + self.n_reconstructed_quantity + self.n_reconstructed_price
    }

    fn tally(&mut self, flags: &MoneyFlags) {
        match flags.class_before {
            MoneyClass::Complete => self.n_complete_before += 1,
            MoneyClass::Reconstructable => self.n_reconstructable_before += 1,
            MoneyClass::Unrecoverable => self.n_unrecoverable_before += 1,
        }
        match flags.class {
            MoneyClass::Complete => self.n_complete += 1,
            MoneyClass::Reconstructable => self.n_reconstructable += 1,
            MoneyClass::Unrecoverable => self.n_unrecoverable += 1,
        }
        self.n_reconstructed_total += usize::from(flags.reconstructed_total);
        self.n_reconstructed_quantity += usize::from(flags.reconstructed_quantity);
        self.n_reconstructed_price += usize::from(flags.reconstructed_price);
        self.n_blocked_div0 += usize::from(flags.is_blocked());
    }
}

/// Classify every row by how many monetary fields it carries and fill the
/// single missing field where the arithmetic is defined.
///
/// Rows with two or more gaps, and rows whose reconstruction would divide by
/// zero, pass through with their gaps intact.
#[instrument(skip_all, fields(rows = table.len()))]
pub fn reconcile_money(table: &Table) -> (Table, ReconcileReport) {
    let mut report = ReconcileReport::default();

    let rows: Vec<Row> = table
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let (transaction, flags) = reconcile_transaction(&row.transaction);
            if flags.is_blocked() {
                debug!(
                    index,
                    id = ?transaction.transaction_id,
                    div0_quantity = flags.div0_quantity,
                    div0_price = flags.div0_price,
                    "reconstruction blocked by zero divisor"
                );
            } else if flags.any_reconstructed() {
                debug!(index, id = ?transaction.transaction_id, "monetary field reconstructed");
            }
            report.tally(&flags);

            Row {
                transaction,
                money: Some(flags),
                ..row.clone()
            }
        })
        .collect();

    metrics::reconcile::field_reconstructed("total", report.n_reconstructed_total);
    metrics::reconcile::field_reconstructed("quantity", report.n_reconstructed_quantity);
    metrics::reconcile::field_reconstructed("unit_price", report.n_reconstructed_price);
    metrics::reconcile::rows_blocked(report.n_blocked_div0);
    metrics::reconcile::rows_unrecoverable(report.n_unrecoverable);
    info!(
        reconstructed = report.n_reconstructed(),
        blocked = report.n_blocked_div0,
        unrecoverable = report.n_unrecoverable,
        "monetary reconciliation complete"
    );

    (Table::new(rows), report)
}

fn reconcile_transaction(before: &Transaction) -> (Transaction, MoneyFlags) {
    let (quantity, unit_price, total) = (before.quantity, before.unit_price, before.total);
    let class_before = MoneyClass::from_present(before.money_present());

    let need_total = total.is_none() && quantity.is_some() && unit_price.is_some();
    let need_quantity = quantity.is_none() && unit_price.is_some() && total.is_some();
    let need_price = unit_price.is_none() && quantity.is_some() && total.is_some();
    let div0_quantity = need_price && quantity == Some(0);
    let div0_price = need_quantity && unit_price == Some(0.0);

    let mut after = before.clone();
    if class_before == MoneyClass::Reconstructable && !(div0_quantity || div0_price) {
        match (quantity, unit_price, total) {
            (Some(q), Some(p), None) => after.total = total_from(q, p),
            (None, Some(p), Some(t)) => after.quantity = quantity_from(t, p),
            (Some(q), None, Some(t)) => after.unit_price = Some(t / f64::from(q)),
            _ => {}
        }
    }

    let flags = MoneyFlags {
        class_before,
        class: MoneyClass::from_present(after.money_present()),
        need_total,
        need_quantity,
        need_price,
        div0_quantity,
        div0_price,
        reconstructed_total: before.total.is_none() && after.total.is_some(),
        reconstructed_quantity: before.quantity.is_none() && after.quantity.is_some(),
        reconstructed_price: before.unit_price.is_none() && after.unit_price.is_some(),
    };
    (after, flags)
}

/// quantity × unit price; `None` if the product overflows
fn total_from(quantity: u32, unit_price: f64) -> Option<f64> {
    let total = f64::from(quantity) * unit_price;
    if total.is_finite() {
        Some(total)
    } else {
        debug!(quantity, unit_price, "reconstructed total out of range");
        None
    }
}

/// total / unit price rounded half away from zero; `None` if it does not fit
fn quantity_from(total: f64, unit_price: f64) -> Option<u32> {
    let q = (total / unit_price).round();
    if q.is_finite() && q >= 0.0 && q <= f64::from(u32::MAX) {
        Some(q as u32)
    } else {
        debug!(total, unit_price, "reconstructed quantity out of range");
        None
    }
}
