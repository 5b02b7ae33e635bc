// Pipeline processing: one module per reconciliation stage, in run order

pub mod normalize;
pub mod sort;
pub mod identity;
pub mod reconcile;
pub mod consistency;
pub mod quality_report;

pub use consistency::{check_consistency, ConsistencyReport, Tolerance};
pub use identity::{validate_identity, IdentityReport};
pub use normalize::{normalize, NormalizationReport};
pub use quality_report::{build_quality_report, IssueKind, QualityIssue};
pub use reconcile::{reconcile_money, ReconcileReport};
pub use sort::sort_transactions;
