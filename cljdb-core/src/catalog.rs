//! Catalog store: reads/writes the small per-table metadata document.
//!
//! The catalog is a self-describing JSON document with exactly the two
//! fields the rest of the engine needs: `columns` and `schema`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tuple::ScalarType;

/// `{columns: [name...], schema: [type...]}`, same arity, insertion order
/// equals column order. Immutable for the lifetime of a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub columns: Vec<String>,
    pub schema: Vec<ScalarType>,
}

impl Catalog {
    pub fn new(columns: Vec<String>, schema: Vec<ScalarType>) -> Self {
        assert_eq!(columns.len(), schema.len(), "columns/schema arity mismatch");
        Self { columns, schema }
    }
}

/// Path convention: `<dir>/<table>_catalog`.
pub fn catalog_path(dir: &Path, table: &str) -> std::path::PathBuf {
    dir.join(format!("{table}_catalog"))
}

pub fn read_catalog(dir: &Path, table: &str) -> Result<Catalog> {
    let path = catalog_path(dir, table);
    let text = fs::read_to_string(path)?;
    let catalog: Catalog = serde_json::from_str(&text)?;
    Ok(catalog)
}

pub fn write_catalog(dir: &Path, table: &str, catalog: &Catalog) -> Result<()> {
    let path = catalog_path(dir, table);
    let text = serde_json::to_string_pretty(catalog)?;
    fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn catalog_round_trips() {
        let tmp = TempDir::new().unwrap();
        let catalog = Catalog::new(
            vec!["name".into(), "age".into()],
            vec![ScalarType::String, ScalarType::Int],
        );
        write_catalog(tmp.path(), "person", &catalog).unwrap();
        let read_back = read_catalog(tmp.path(), "person").unwrap();
        assert_eq!(read_back.columns, catalog.columns);
        assert_eq!(read_back.schema.len(), catalog.schema.len());
    }
}
