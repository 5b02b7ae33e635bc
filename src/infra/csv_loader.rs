use std::fs;
use std::io::Read;
use std::path::PathBuf;

use csv::ReaderBuilder;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::app::ports::{LoadedTable, TableSourcePort};
use crate::error::Result;
use crate::types::RawTable;

/// Loads a delimited text file with a header row into a `RawTable`
pub struct CsvTableSource {
    path: PathBuf,
    delimiter: u8,
}

impl CsvTableSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl TableSourcePort for CsvTableSource {
    fn load(&self) -> Result<LoadedTable> {
        let bytes = fs::read(&self.path)?;
        let digest = content_digest(&bytes);
        let table = read_table(bytes.as_slice(), self.delimiter)?;

        info!(
            path = %self.path.display(),
            rows = table.len(),
            columns = table.headers.len(),
            %digest,
            "CSV loaded"
        );

        Ok(LoadedTable {
            table,
            digest: Some(digest),
            source: self.path.display().to_string(),
        })
    }
}

/// Parse CSV text into a raw table.
///
/// Empty fields become missing cells. Rows may be ragged; short rows read as
/// missing for their absent trailing columns. Invalid UTF-8 is replaced
/// rather than rejected so one bad byte degrades a single cell.
pub fn read_table<R: Read>(reader: R, delimiter: u8) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .byte_headers()?
        .iter()
        .map(|h| String::from_utf8_lossy(h).trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in rdr.byte_records() {
        let record = record?;
        let cells: Vec<Option<String>> = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    None
                } else {
                    Some(String::from_utf8_lossy(field).into_owned())
                }
            })
            .collect();
        if cells.len() != headers.len() {
            debug!(
                line = ?record.position().map(|p| p.line()),
                cells = cells.len(),
                "ragged row"
            );
        }
        rows.push(cells);
    }

    Ok(RawTable::new(headers, rows))
}

/// `sha256:<hex>` digest of the raw bytes
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_reads_headers_and_missing_cells() {
        let content = "Transaction ID,Item,Quantity\nTXN_1,Coffee,2\nTXN_2,,\n";
        let table = read_table(content.as_bytes(), b',').unwrap();

        assert_eq!(table.headers, vec!["Transaction ID", "Item", "Quantity"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 1), Some("Coffee"));
        assert_eq!(table.cell(1, 1), None);
        assert_eq!(table.cell(1, 2), None);
    }

    #[test]
    fn test_ragged_rows_kept() {
        let content = "a,b,c\n1\n1,2,3,4\n";
        let table = read_table(content.as_bytes(), b',').unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 2), None);
        assert_eq!(table.rows[1].len(), 4);
    }

    #[test]
    fn test_quoted_fields_and_delimiter() {
        let content = "id;item\n\"T;1\";\"Cake, large\"\n";
        let table = read_table(content.as_bytes(), b';').unwrap();
        assert_eq!(table.cell(0, 0), Some("T;1"));
        assert_eq!(table.cell(0, 1), Some("Cake, large"));
    }

    #[test]
    fn test_load_from_file_records_digest() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "id,item\nT1,Tea\n").unwrap();

        let loaded = CsvTableSource::new(file.path()).load().unwrap();
        assert_eq!(loaded.table.len(), 1);
        assert_eq!(
            loaded.digest.as_deref(),
            Some(content_digest(b"id,item\nT1,Tea\n").as_str())
        );
        assert!(loaded.digest.unwrap().starts_with("sha256:"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let source = CsvTableSource::new("/no/such/file.csv");
        assert!(matches!(
            source.load(),
            Err(crate::error::ReconcilerError::Io(_))
        ));
    }
}
