use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::constants;
use crate::error::{ReconcilerError, Result};
use crate::pipeline::processing::consistency::Tolerance;
use crate::types::Column;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub columns: ColumnMap,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Allowed |total - quantity × unit price| before a row is a mismatch
    pub tolerance: f64,
    pub missing_dates: MissingDatePlacement,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tolerance: constants::DEFAULT_TOLERANCE,
            missing_dates: MissingDatePlacement::default(),
        }
    }
}

/// Where rows without a transaction date land in the sorted table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingDatePlacement {
    First,
    #[default]
    Last,
}

/// Header names of the eight canonical columns in the raw input
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ColumnMap {
    pub transaction_id: String,
    pub item: String,
    pub quantity: String,
    pub unit_price: String,
    pub total: String,
    pub payment_method: String,
    pub location: String,
    pub transaction_date: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            transaction_id: constants::TRANSACTION_ID.to_string(),
            item: constants::ITEM.to_string(),
            quantity: constants::QUANTITY.to_string(),
            unit_price: constants::UNIT_PRICE.to_string(),
            total: constants::TOTAL.to_string(),
            payment_method: constants::PAYMENT_METHOD.to_string(),
            location: constants::LOCATION.to_string(),
            transaction_date: constants::TRANSACTION_DATE.to_string(),
        }
    }
}

impl ColumnMap {
    pub fn header(&self, column: Column) -> &str {
        match column {
            Column::TransactionId => &self.transaction_id,
            Column::Item => &self.item,
            Column::Quantity => &self.quantity,
            Column::UnitPrice => &self.unit_price,
            Column::Total => &self.total,
            Column::PaymentMethod => &self.payment_method,
            Column::Location => &self.location,
            Column::TransactionDate => &self.transaction_date,
        }
    }

    /// Reverse lookup from a raw header to its canonical column
    pub fn column_for(&self, header: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| self.header(*c) == header)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub log_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
        }
    }
}

impl Config {
    /// Load from an explicit path, else from `POS_RECONCILER_CONFIG`, else
    /// defaults. Environment overrides are applied and the result validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_path(path)?,
            None => match std::env::var(constants::CONFIG_PATH_ENV) {
                Ok(p) if !p.trim().is_empty() => Self::from_path(Path::new(p.trim()))?,
                _ => Self::default(),
            },
        };

        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReconcilerError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(constants::TOLERANCE_ENV) {
            self.pipeline.tolerance = value.trim().parse().map_err(|_| {
                ReconcilerError::Config(format!(
                    "{} is not a number: {:?}",
                    constants::TOLERANCE_ENV,
                    value
                ))
            })?;
        }
        Ok(self)
    }

    /// Reject settings that would make the pipeline meaningless
    pub fn validate(&self) -> Result<()> {
        Tolerance::new(self.pipeline.tolerance)?;

        for column in Column::ALL {
            if self.columns.header(column).trim().is_empty() {
                return Err(ReconcilerError::Config(format!(
                    "header name for column '{}' is empty",
                    column
                )));
            }
        }

        Ok(())
    }

    pub fn tolerance(&self) -> Result<Tolerance> {
        Tolerance::new(self.pipeline.tolerance)
    }
}
