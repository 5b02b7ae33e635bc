use crate::error::Result;
use crate::pipeline::processing::QualityIssue;
use crate::pipeline::PipelineResult;
use crate::types::RawTable;

/// A raw table plus what is known about where it came from
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: RawTable,
    /// Content digest of the source, e.g. `sha256:<hex>`
    pub digest: Option<String>,
    pub source: String,
}

pub trait TableSourcePort {
    fn load(&self) -> Result<LoadedTable>;
}

pub trait IssueOutputPort {
    fn write_issues(&self, issues: &[QualityIssue]) -> Result<()>;
}

pub trait SummaryOutputPort {
    fn write_summary(&self, result: &PipelineResult) -> Result<()>;
}
