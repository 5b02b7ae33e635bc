pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod tally;
pub mod types;

// Layered boundaries: use cases and ports in app, file adapters in infra
pub mod app;
pub mod infra;

pub use config::Config;
pub use error::{ReconcilerError, Result};
pub use pipeline::{Pipeline, PipelineResult};
pub use types::{RawTable, Row, Table, Transaction};
