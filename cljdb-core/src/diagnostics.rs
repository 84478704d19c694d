//! Heap file diagnostics: a read-only walk over a heap file's sections and
//! pages that reports structural statistics and problems without failing
//! the whole pass on the first inconsistency. Does not change scan/write
//! semantics; this is purely additive.

use std::io::{Read, Seek, SeekFrom};

use crate::error::Result;
use crate::page::{self, PAGE_SIZE, SECTION_STRIDE};
use crate::tuple::ColumnIndex;

/// Aggregate counts gathered while walking a heap file.
#[derive(Debug, Default, Clone)]
pub struct HeapStats {
    pub section_count: u64,
    pub data_page_count: u64,
    pub row_count: u64,
}

/// Result of validating a heap file's page layout.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub stats: HeapStats,
    pub problems: Vec<String>,
}

impl ValidationReport {
    fn add_problem(&mut self, msg: impl Into<String>) {
        self.valid = false;
        self.problems.push(msg.into());
    }
}

/// Walk every section of `reader`, comparing each data page's directory
/// free-byte entry against what a schema-guided parse of that page
/// actually finds, and each page's footer `row_count` against the number
/// of rows recovered. Stops at the first short read (end of file);
/// individual page problems are recorded, not fatal.
pub fn validate_heap<R: Read + Seek>(reader: &mut R, columns: &ColumnIndex) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        valid: true,
        ..Default::default()
    };

    let file_len = reader.seek(SeekFrom::End(0))?;
    if file_len % PAGE_SIZE as u64 != 0 {
        report.add_problem(format!(
            "file size {file_len} is not a multiple of page size {PAGE_SIZE}"
        ));
    }
    let total_pages = file_len / PAGE_SIZE as u64;

    let mut section_start = 0u64;
    while section_start < total_pages {
        report.stats.section_count += 1;

        let directory = match read_page(reader, section_start)? {
            Some(bytes) => match page::decode_directory(&bytes) {
                Ok(d) => d,
                Err(e) => {
                    report.add_problem(format!("section {section_start}: {e}"));
                    section_start += SECTION_STRIDE as u64;
                    continue;
                }
            },
            None => break,
        };

        for (slot, &claimed_free) in directory.iter().enumerate() {
            let abs_index = section_start + 1 + slot as u64;
            if abs_index >= total_pages {
                break;
            }
            let bytes = match read_page(reader, abs_index)? {
                Some(b) => b,
                None => break,
            };
            report.stats.data_page_count += 1;

            match page::take_data_rows(columns, &bytes) {
                Ok(rows) => {
                    report.stats.row_count += rows.len() as u64;
                    let actual_free = directory_free_for(&bytes)?;
                    if actual_free != claimed_free {
                        report.add_problem(format!(
                            "page {abs_index}: directory claims {claimed_free} free bytes, page footer implies {actual_free}"
                        ));
                    }
                }
                Err(e) => {
                    report.add_problem(format!("page {abs_index}: {e}"));
                }
            }
        }

        section_start += SECTION_STRIDE as u64;
    }

    Ok(report)
}

/// Recompute the free-byte accounting a correct directory entry for this
/// page would hold, from the page's own footer.
fn directory_free_for(page_bytes: &[u8]) -> Result<u16> {
    let footer = &page_bytes[PAGE_SIZE - page::FOOTER_SIZE..];
    let row_count = crate::codec::decode_u16(&footer[..page::COUNT_SIZE])?;
    let free_offset = crate::codec::decode_u16(&footer[page::COUNT_SIZE..])?;
    Ok(page::free_after(free_offset as usize, row_count as usize))
}

fn read_page<R: Read + Seek>(reader: &mut R, abs_page_index: u64) -> Result<Option<Vec<u8>>> {
    let offset = abs_page_index * PAGE_SIZE as u64;
    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; PAGE_SIZE];
    let mut total = 0;
    while total < PAGE_SIZE {
        let n = reader.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    if total == 0 {
        return Ok(None);
    }
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::heap;
    use crate::tuple::{ScalarType, Value};
    use std::io::Cursor;

    #[test]
    fn validates_freshly_written_heap_file() {
        let catalog = Catalog::new(
            vec!["name".into(), "age".into()],
            vec![ScalarType::String, ScalarType::Int],
        );
        let columns = ColumnIndex::new(catalog.columns.clone(), catalog.schema.clone());
        let rows: Vec<_> = (0..50)
            .map(|i| vec![Value::String(format!("person-{i}")), Value::Int(i)])
            .collect();

        let mut stream = Cursor::new(Vec::new());
        heap::write_rows(&mut stream, &catalog, rows).unwrap();

        let report = validate_heap(&mut stream, &columns).unwrap();
        assert!(report.valid, "problems: {:?}", report.problems);
        assert_eq!(report.stats.row_count, 50);
        assert_eq!(report.stats.section_count, 1);
    }

    #[test]
    fn flags_truncated_file_without_panicking() {
        let columns = ColumnIndex::new(vec!["name".into()], vec![ScalarType::String]);
        let mut stream = Cursor::new(vec![0u8; PAGE_SIZE + 100]);
        let report = validate_heap(&mut stream, &columns).unwrap();
        assert!(!report.valid);
        assert!(report.problems.iter().any(|p| p.contains("multiple of page size")));
    }
}
