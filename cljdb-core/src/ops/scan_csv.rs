use std::path::PathBuf;

use tracing::debug;

use crate::catalog;
use crate::error::{Error, Result};
use crate::tuple::ColumnIndex;

use super::{Environment, IntermediateResult, Operator};

/// Open `<dir>/<table>_table.csv` and `<dir>/<table>_catalog`. Column
/// names come from the CSV header row; their types come from the
/// catalog, matched up by position.
pub struct ScanCsv {
    dir: PathBuf,
    table: String,
}

impl ScanCsv {
    pub fn new(dir: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            table: table.into(),
        }
    }
}

impl Operator for ScanCsv {
    fn apply(
        self: Box<Self>,
        _env: &mut Environment,
        _input: Option<IntermediateResult>,
    ) -> Result<IntermediateResult> {
        let cat = catalog::read_catalog(&self.dir, &self.table)?;
        let path = self.dir.join(format!("{}_table.csv", self.table));
        debug!(table = %self.table, path = %path.display(), "scan_csv opening");

        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(&path)?;
        let header: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
        if header.len() != cat.schema.len() {
            return Err(Error::SchemaViolation(format!(
                "CSV header has {} columns, catalog schema has {}",
                header.len(),
                cat.schema.len()
            )));
        }
        let columns = ColumnIndex::new(header, cat.schema.clone());

        let row_columns = columns.clone();
        let rows = reader.into_records().map(move |record| {
            let record = record?;
            let raw: Vec<String> = record.iter().map(|s| s.to_string()).collect();
            row_columns.string_row_to_types(&raw)
        });

        Ok(IntermediateResult::new(columns, Box::new(rows)))
    }
}
