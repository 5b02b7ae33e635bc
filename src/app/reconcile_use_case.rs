use tracing::{info, instrument};

use crate::app::ports::{IssueOutputPort, SummaryOutputPort, TableSourcePort};
use crate::error::Result;
use crate::pipeline::{Pipeline, PipelineResult};

/// Use case for loading a transaction table, reconciling it and handing the
/// results to the configured outputs
pub struct ReconcileUseCase {
    source: Box<dyn TableSourcePort>,
    pipeline: Pipeline,
    issue_outputs: Vec<Box<dyn IssueOutputPort>>,
    summary_outputs: Vec<Box<dyn SummaryOutputPort>>,
}

impl ReconcileUseCase {
    pub fn new(source: Box<dyn TableSourcePort>, pipeline: Pipeline) -> Self {
        Self {
            source,
            pipeline,
            issue_outputs: Vec::new(),
            summary_outputs: Vec::new(),
        }
    }

    pub fn with_issue_output(mut self, output: Box<dyn IssueOutputPort>) -> Self {
        self.issue_outputs.push(output);
        self
    }

    pub fn with_summary_output(mut self, output: Box<dyn SummaryOutputPort>) -> Self {
        self.summary_outputs.push(output);
        self
    }

    /// Load, run every stage, then write issues and the run summary
    #[instrument(skip(self))]
    pub fn execute(&self) -> Result<PipelineResult> {
        let loaded = self.source.load()?;
        info!(source = %loaded.source, rows = loaded.table.len(), "table loaded");

        let mut result = self.pipeline.run(&loaded.table)?;
        result.input_digest = loaded.digest;

        for output in &self.issue_outputs {
            output.write_issues(&result.issues)?;
        }
        for output in &self.summary_outputs {
            output.write_summary(&result)?;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::LoadedTable;
    use crate::error::ReconcilerError;
    use crate::pipeline::processing::QualityIssue;
    use crate::types::{Column, RawTable};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct StaticSource(RawTable);

    impl TableSourcePort for StaticSource {
        fn load(&self) -> Result<LoadedTable> {
            Ok(LoadedTable {
                table: self.0.clone(),
                digest: Some("sha256:test".to_string()),
                source: "memory".to_string(),
            })
        }
    }

    struct FailingSource;

    impl TableSourcePort for FailingSource {
        fn load(&self) -> Result<LoadedTable> {
            Err(ReconcilerError::Config("no input".to_string()))
        }
    }

    #[derive(Clone, Default)]
    struct CapturedIssues(Rc<RefCell<Vec<QualityIssue>>>);

    impl IssueOutputPort for CapturedIssues {
        fn write_issues(&self, issues: &[QualityIssue]) -> Result<()> {
            self.0.borrow_mut().extend_from_slice(issues);
            Ok(())
        }
    }

    fn headers() -> Vec<String> {
        Column::ALL
            .iter()
            .map(|c| c.default_header().to_string())
            .collect()
    }

    #[test]
    fn test_execute_routes_issues_and_digest() {
        let raw = RawTable::new(
            headers(),
            vec![vec![
                Some("T1".to_string()),
                Some("Tea".to_string()),
                None,
                None,
                Some("4".to_string()),
                None,
                None,
                None,
            ]],
        );
        let captured = CapturedIssues::default();
        let use_case = ReconcileUseCase::new(Box::new(StaticSource(raw)), Pipeline::default())
            .with_issue_output(Box::new(captured.clone()));

        let result = use_case.execute().unwrap();
        assert_eq!(result.input_digest.as_deref(), Some("sha256:test"));
        assert_eq!(captured.0.borrow().len(), 2);
        assert_eq!(*captured.0.borrow(), result.issues);
    }

    #[test]
    fn test_source_failure_propagates() {
        let use_case = ReconcileUseCase::new(Box::new(FailingSource), Pipeline::default());
        assert!(use_case.execute().is_err());
    }
}
