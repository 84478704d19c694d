use std::fs::File;
use std::path::PathBuf;

use tracing::debug;

use crate::catalog;
use crate::error::Result;
use crate::heap;
use crate::tuple::ColumnIndex;

use super::{Environment, IntermediateResult, Operator};

/// Open `<dir>/<table>_table.cljdb` and `<dir>/<table>_catalog`, producing
/// a lazy scan over the heap file's pages.
pub struct ScanHeap {
    dir: PathBuf,
    table: String,
}

impl ScanHeap {
    pub fn new(dir: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            table: table.into(),
        }
    }
}

impl Operator for ScanHeap {
    fn apply(
        self: Box<Self>,
        _env: &mut Environment,
        _input: Option<IntermediateResult>,
    ) -> Result<IntermediateResult> {
        let cat = catalog::read_catalog(&self.dir, &self.table)?;
        let path = self.dir.join(format!("{}_table.cljdb", self.table));
        debug!(table = %self.table, path = %path.display(), "scan_heap opening");

        let file = File::open(&path)?;
        let columns = ColumnIndex::new(cat.columns.clone(), cat.schema.clone());
        let scan = heap::scan(&cat, file);

        Ok(IntermediateResult::new(columns, Box::new(scan)))
    }
}
