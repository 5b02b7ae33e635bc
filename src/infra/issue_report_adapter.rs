use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::app::ports::{IssueOutputPort, SummaryOutputPort};
use crate::constants;
use crate::error::Result;
use crate::pipeline::processing::QualityIssue;
use crate::pipeline::PipelineResult;

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Writes the issue list as a two-column CSV: `transaction_id,issue`.
/// A missing id is written as an empty field.
pub struct CsvIssueOutputAdapter {
    file_path: PathBuf,
}

impl CsvIssueOutputAdapter {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }
}

impl IssueOutputPort for CsvIssueOutputAdapter {
    fn write_issues(&self, issues: &[QualityIssue]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(create_file(&self.file_path)?);
        writer.write_record(constants::ISSUE_CSV_HEADERS)?;
        for issue in issues {
            writer.write_record([
                issue.transaction_id.as_deref().unwrap_or(""),
                issue.kind.as_str(),
            ])?;
        }
        writer.flush()?;

        info!(path = %self.file_path.display(), issues = issues.len(), "issue report written");
        Ok(())
    }
}

/// Writes the run summary as pretty-printed JSON
pub struct JsonSummaryOutputAdapter {
    file_path: PathBuf,
}

impl JsonSummaryOutputAdapter {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }
}

impl SummaryOutputPort for JsonSummaryOutputAdapter {
    fn write_summary(&self, result: &PipelineResult) -> Result<()> {
        let mut writer = create_file(&self.file_path)?;
        serde_json::to_writer_pretty(&mut writer, result)?;
        writeln!(writer)?;
        writer.flush()?;

        info!(path = %self.file_path.display(), run_id = %result.run_id, "run summary written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::IssueKind;
    use tempfile::tempdir;

    #[test]
    fn test_writes_issue_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("issues.csv");
        let issues = vec![
            QualityIssue {
                transaction_id: Some("TXN_1".to_string()),
                kind: IssueKind::MoneyMismatch,
            },
            QualityIssue {
                transaction_id: None,
                kind: IssueKind::MissingTransactionDate,
            },
        ];

        CsvIssueOutputAdapter::new(&path).write_issues(&issues).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "transaction_id,issue\nTXN_1,money_mismatch\n,missing_transaction_date\n"
        );
    }

    #[test]
    fn test_empty_issue_list_writes_header_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.csv");
        CsvIssueOutputAdapter::new(&path).write_issues(&[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "transaction_id,issue\n");
    }
}
