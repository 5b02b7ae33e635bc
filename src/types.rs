use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::ColumnMap;
use crate::constants;

/// One of the eight canonical columns of a transaction table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    TransactionId,
    Item,
    Quantity,
    UnitPrice,
    Total,
    PaymentMethod,
    Location,
    TransactionDate,
}

impl Column {
    pub const ALL: [Column; 8] = [
        Column::TransactionId,
        Column::Item,
        Column::Quantity,
        Column::UnitPrice,
        Column::Total,
        Column::PaymentMethod,
        Column::Location,
        Column::TransactionDate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Column::TransactionId => "transaction_id",
            Column::Item => "item",
            Column::Quantity => "quantity",
            Column::UnitPrice => "unit_price",
            Column::Total => "total",
            Column::PaymentMethod => "payment_method",
            Column::Location => "location",
            Column::TransactionDate => "transaction_date",
        }
    }

    /// Header name used by the point-of-sale export
    pub fn default_header(self) -> &'static str {
        match self {
            Column::TransactionId => constants::TRANSACTION_ID,
            Column::Item => constants::ITEM,
            Column::Quantity => constants::QUANTITY,
            Column::UnitPrice => constants::UNIT_PRICE,
            Column::Total => constants::TOTAL,
            Column::PaymentMethod => constants::PAYMENT_METHOD,
            Column::Location => constants::LOCATION,
            Column::TransactionDate => constants::TRANSACTION_DATE,
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untyped table as loaded: header names plus rows of optional text cells.
/// `None` marks a cell that had no value at all in the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at (row, column). Short rows read as missing.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .and_then(|cell| cell.as_deref())
    }

    /// All cells of a named column, or `None` if the header is absent
    pub fn column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let index = self.column_index(name)?;
        Some((0..self.rows.len()).map(|row| self.cell(row, index)).collect())
    }
}

/// A point-of-sale record in canonical typed form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: Option<String>,
    pub item: Option<String>,
    pub quantity: Option<u32>,
    pub unit_price: Option<f64>,
    pub total: Option<f64>,
    pub payment_method: Option<String>,
    pub location: Option<String>,
    pub transaction_date: Option<NaiveDateTime>,
}

impl Transaction {
    /// Number of monetary fields (quantity, unit price, total) present
    pub fn money_present(&self) -> u8 {
        u8::from(self.quantity.is_some())
            + u8::from(self.unit_price.is_some())
            + u8::from(self.total.is_some())
    }

    /// Text rendering of one column, the inverse of normalization
    pub fn render(&self, column: Column) -> Option<String> {
        match column {
            Column::TransactionId => self.transaction_id.clone(),
            Column::Item => self.item.clone(),
            Column::Quantity => self.quantity.map(|q| q.to_string()),
            Column::UnitPrice => self.unit_price.map(|p| p.to_string()),
            Column::Total => self.total.map(|t| t.to_string()),
            Column::PaymentMethod => self.payment_method.clone(),
            Column::Location => self.location.clone(),
            Column::TransactionDate => self
                .transaction_date
                .map(|d| d.format(constants::CANONICAL_DATE_TIME_FORMAT).to_string()),
        }
    }
}

/// Flags computed by the identity validator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityFlags {
    pub id_missing: bool,
    pub id_duplicated: bool,
    pub row_exact_duplicate: bool,
}

/// Completeness class of the monetary triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoneyClass {
    /// All three fields present
    Complete,
    /// Exactly one field missing
    Reconstructable,
    /// Two or three fields missing
    Unrecoverable,
}

impl MoneyClass {
    pub fn from_present(present: u8) -> Self {
        match present {
            3..=u8::MAX => MoneyClass::Complete,
            2 => MoneyClass::Reconstructable,
            _ => MoneyClass::Unrecoverable,
        }
    }
}

/// Flags computed by the monetary reconciler.
///
/// `need_*` and the division guards describe the row as it entered the
/// reconciler; `class` describes it after reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyFlags {
    pub class_before: MoneyClass,
    pub class: MoneyClass,
    pub need_total: bool,
    pub need_quantity: bool,
    pub need_price: bool,
    /// Unit price needed but quantity is zero
    pub div0_quantity: bool,
    /// Quantity needed but unit price is zero
    pub div0_price: bool,
    pub reconstructed_total: bool,
    pub reconstructed_quantity: bool,
    pub reconstructed_price: bool,
}

impl MoneyFlags {
    pub fn is_complete(&self) -> bool {
        self.class == MoneyClass::Complete
    }

    pub fn is_reconstructable(&self) -> bool {
        self.class == MoneyClass::Reconstructable
    }

    pub fn is_unrecoverable(&self) -> bool {
        self.class == MoneyClass::Unrecoverable
    }

    pub fn is_blocked(&self) -> bool {
        self.div0_quantity || self.div0_price
    }

    pub fn any_reconstructed(&self) -> bool {
        self.reconstructed_total || self.reconstructed_quantity || self.reconstructed_price
    }
}

/// Flags computed by the consistency checker
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyFlags {
    /// quantity × unit price; `None` when the row is not money-complete
    pub expected_total: Option<f64>,
    pub mismatch: bool,
}

/// A transaction plus the flag groups attached by each pipeline stage.
/// A group stays `None` until its stage has run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub transaction: Transaction,
    pub identity: Option<IdentityFlags>,
    pub money: Option<MoneyFlags>,
    pub consistency: Option<ConsistencyFlags>,
}

impl From<Transaction> for Row {
    fn from(transaction: Transaction) -> Self {
        Self {
            transaction,
            ..Self::default()
        }
    }
}

/// An immutable snapshot produced by one pipeline stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        transactions.into_iter().map(Row::from).collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.rows.iter().map(|row| &row.transaction)
    }

    /// Render the canonical columns back to text under the given headers
    pub fn to_raw(&self, columns: &ColumnMap) -> RawTable {
        let headers = Column::ALL
            .iter()
            .map(|c| columns.header(*c).to_string())
            .collect();
        let rows = self
            .transactions()
            .map(|t| Column::ALL.iter().map(|c| t.render(*c)).collect())
            .collect();
        RawTable::new(headers, rows)
    }
}

impl FromIterator<Row> for Table {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
