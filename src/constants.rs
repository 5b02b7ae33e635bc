/// Default header names of the eight canonical columns, as exported by the
/// point-of-sale system. The `[columns]` config table can override any of them.
pub const TRANSACTION_ID: &str = "Transaction ID";
pub const ITEM: &str = "Item";
pub const QUANTITY: &str = "Quantity";
pub const UNIT_PRICE: &str = "Price Per Unit";
pub const TOTAL: &str = "Total Spent";
pub const PAYMENT_METHOD: &str = "Payment Method";
pub const LOCATION: &str = "Location";
pub const TRANSACTION_DATE: &str = "Transaction Date";

/// Default absolute tolerance (currency units) when comparing a total
/// against quantity × unit price.
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Header row of the issue CSV written by the reporting layer
pub const ISSUE_CSV_HEADERS: [&str; 2] = ["transaction_id", "issue"];

// Environment overrides
pub const CONFIG_PATH_ENV: &str = "POS_RECONCILER_CONFIG";
pub const TOLERANCE_ENV: &str = "POS_RECONCILER_TOLERANCE";

/// Accepted layouts for the transaction date column, tried in order.
/// Date-only layouts resolve to midnight.
pub const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
pub const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"];

/// Layout used when a normalized date is rendered back to text
pub const CANONICAL_DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
