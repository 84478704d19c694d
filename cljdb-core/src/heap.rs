//! The paged heap file: lazy full scans and small-batch appending writes.
//!
//! A heap file is a concatenation of sections. Each section is one page
//! directory (`PAGE_DIRECTORY_ENTRIES_NUM` big-endian `u16` free-byte
//! counters) followed by `PAGE_DIRECTORY_ENTRIES_NUM` data pages. Absolute
//! page index `k * SECTION_STRIDE` is always a directory page.

use std::collections::VecDeque;
use std::io::{Read, Seek, SeekFrom, Write};

use tracing::{debug, trace};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::page::{
    self, decode_directory, empty_data_page, empty_directory, encode_directory, row_cost,
    take_data_rows, PAGE_SIZE, SECTION_STRIDE,
};
use crate::tuple::{ColumnIndex, Row};

/// Small-batch insert policy: at most this many data pages are modified
/// per section during a single `write_rows` pass. Reproduces the
/// source's on-disk layout bit-for-bit; widen it if byte-for-byte
/// compatibility with other implementations is not required.
pub const MAX_PAGES_PER_PASS: usize = 2;

/// Lazily scan every data page of a heap file, yielding rows in on-disk
/// order. Single-pass: once exhausted, reopen the file for a fresh scan.
/// Owns `reader`, so dropping the iterator before exhaustion still closes
/// the underlying handle.
pub struct HeapScan<R> {
    reader: R,
    columns: ColumnIndex,
    next_page_index: u64,
    buffer: VecDeque<Row>,
    done: bool,
}

impl<R: Read + Seek> HeapScan<R> {
    pub fn new(reader: R, columns: ColumnIndex) -> Self {
        Self {
            reader,
            columns,
            next_page_index: 0,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    fn fetch_next_page(&mut self) -> Result<Option<Vec<Row>>> {
        loop {
            if page::is_directory_page(self.next_page_index) {
                self.next_page_index += 1;
                continue;
            }
            break;
        }
        let page_index = self.next_page_index;
        self.next_page_index += 1;

        let offset = page_index * PAGE_SIZE as u64;
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; PAGE_SIZE];
        let read = read_best_effort(&mut self.reader, &mut buf)?;
        if read == 0 {
            return Ok(None);
        }
        if read != PAGE_SIZE {
            return Err(Error::CorruptPage(format!(
                "page {page_index} truncated: read {read} of {PAGE_SIZE} bytes"
            )));
        }
        let rows = take_data_rows(&self.columns, &buf)?;
        Ok(Some(rows))
    }
}

impl<R: Read + Seek> Iterator for HeapScan<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Result<Row>> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            match self.fetch_next_page() {
                Ok(Some(rows)) => {
                    if rows.is_empty() {
                        continue;
                    }
                    self.buffer.extend(rows);
                }
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn read_best_effort<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = reader.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

fn read_page_or_empty<RW: Read + Seek>(stream: &mut RW, abs_page_index: u64) -> Result<Vec<u8>> {
    let offset = abs_page_index * PAGE_SIZE as u64;
    stream.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; PAGE_SIZE];
    let read = read_best_effort(stream, &mut buf)?;
    match read {
        0 => Ok(empty_data_page()),
        n if n == PAGE_SIZE => Ok(buf),
        n => Err(Error::CorruptPage(format!(
            "page {abs_page_index} truncated: read {n} of {PAGE_SIZE} bytes"
        ))),
    }
}

fn read_directory_or_empty<RW: Read + Seek>(stream: &mut RW, section_start: u64) -> Result<Vec<u16>> {
    let offset = section_start * PAGE_SIZE as u64;
    stream.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; PAGE_SIZE];
    let read = read_best_effort(stream, &mut buf)?;
    match read {
        0 => Ok(empty_directory()),
        n if n == PAGE_SIZE => decode_directory(&buf),
        n => Err(Error::CorruptPage(format!(
            "directory page at section {section_start} truncated: read {n} of {PAGE_SIZE} bytes"
        ))),
    }
}

fn write_page_at<RW: Write + Seek>(stream: &mut RW, abs_page_index: u64, bytes: &[u8]) -> Result<()> {
    let offset = abs_page_index * PAGE_SIZE as u64;
    stream.seek(SeekFrom::Start(offset))?;
    stream.write_all(bytes)?;
    Ok(())
}

/// Open a fresh scan over `reader`'s pages, typed by `catalog`.
pub fn scan<R: Read + Seek>(catalog: &Catalog, reader: R) -> HeapScan<R> {
    let columns = ColumnIndex::new(catalog.columns.clone(), catalog.schema.clone());
    HeapScan::new(reader, columns)
}

/// Append `rows` to `stream`, spanning as many sections as needed. Each
/// section pass modifies at most `MAX_PAGES_PER_PASS` data pages before
/// moving on, per the small-batch insert policy.
pub fn write_rows<RW: Read + Write + Seek>(
    stream: &mut RW,
    catalog: &Catalog,
    rows: Vec<Row>,
) -> Result<()> {
    let columns = ColumnIndex::new(catalog.columns.clone(), catalog.schema.clone());
    for row in &rows {
        let cost = row_cost(row, &columns)?;
        if cost + page::FOOTER_SIZE > PAGE_SIZE {
            return Err(Error::RowTooLarge(format!(
                "row costs {cost} bytes plus footer, exceeds page budget of {PAGE_SIZE}"
            )));
        }
    }
    let mut queue: VecDeque<Row> = rows.into();
    let mut section: u64 = 0;

    while !queue.is_empty() {
        let section_start = section * SECTION_STRIDE as u64;
        let mut directory = read_directory_or_empty(stream, section_start)?;

        let mut modified: Vec<(usize, Vec<Row>)> = Vec::new();
        for p in 1..=page::PAGE_DIRECTORY_ENTRIES_NUM {
            if modified.len() >= MAX_PAGES_PER_PASS || queue.is_empty() {
                break;
            }
            let mut free = directory[p - 1] as usize;
            let mut placed = Vec::new();
            while let Some(row) = queue.front() {
                let cost = row_cost(row, &columns)?;
                if cost <= free {
                    free -= cost;
                    placed.push(queue.pop_front().unwrap());
                } else {
                    break;
                }
            }
            if !placed.is_empty() {
                modified.push((p, placed));
            }
        }

        debug!(section, modified_pages = modified.len(), "packing section");

        for (p, new_rows) in modified {
            let abs_index = section_start + p as u64;
            let existing_bytes = read_page_or_empty(stream, abs_index)?;
            let mut all_rows = take_data_rows(&columns, &existing_bytes)?;
            all_rows.extend(new_rows);
            let page_bytes = page::build_page(&all_rows, &columns)?;
            write_page_at(stream, abs_index, &page_bytes)?;

            let free_offset = crate::codec::decode_u16(&page_bytes[PAGE_SIZE - page::FREE_OFFSET_SIZE..])?;
            directory[p - 1] = page::free_after(free_offset as usize, all_rows.len());
            trace!(page = abs_index, free = directory[p - 1], "updated page");
        }

        write_page_at(stream, section_start, &encode_directory(&directory))?;
        section += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{ScalarType, Value};
    use std::io::Cursor;

    fn person_catalog() -> Catalog {
        Catalog::new(
            vec!["name".into(), "age".into()],
            vec![ScalarType::String, ScalarType::Int],
        )
    }

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| vec![Value::String(format!("person-{i}")), Value::Int(i as i32)])
            .collect()
    }

    #[test]
    fn write_then_scan_round_trips_order_and_values() {
        let catalog = person_catalog();
        let mut stream = Cursor::new(Vec::new());
        let input = rows(10);
        write_rows(&mut stream, &catalog, input.clone()).unwrap();

        stream.set_position(0);
        let scanned: Vec<Row> = scan(&catalog, &mut stream)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(scanned, input);
    }

    #[test]
    fn write_spans_multiple_sections_when_needed() {
        let catalog = person_catalog();
        let mut stream = Cursor::new(Vec::new());
        // Enough rows that, combined with the two-page-per-pass policy
        // packing many rows per page, multiple write_rows calls exercise
        // appending into a file that already has data.
        let batch1 = rows(500);
        let batch2 = rows(500);
        write_rows(&mut stream, &catalog, batch1.clone()).unwrap();
        write_rows(&mut stream, &catalog, batch2.clone()).unwrap();

        stream.set_position(0);
        let scanned: Vec<Row> = scan(&catalog, &mut stream)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        let mut expected = batch1;
        expected.extend(batch2);
        assert_eq!(scanned, expected);
    }

    #[test]
    fn scan_of_empty_stream_yields_no_rows() {
        let catalog = person_catalog();
        let mut stream = Cursor::new(Vec::new());
        let scanned: Vec<Row> = scan(&catalog, &mut stream)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert!(scanned.is_empty());
    }

    /// Dropping a scan before it is fully consumed must still release its
    /// file handle (observable by the file being removable right after,
    /// which a leaked/still-open handle would prevent on platforms with
    /// mandatory file locking).
    #[test]
    fn dropping_scan_early_releases_the_file_handle() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("person_table.cljdb");
        let catalog = person_catalog();

        let mut file = std::fs::File::create(&path).unwrap();
        write_rows(&mut file, &catalog, rows(100)).unwrap();
        drop(file);

        let file = std::fs::File::open(&path).unwrap();
        let mut partial = scan(&catalog, file);
        assert!(partial.next().is_some());
        drop(partial);

        std::fs::remove_file(&path).unwrap();
        assert!(!path.exists());
    }

    /// A row whose schema's worst-case width alone exceeds a fresh page's
    /// budget must fail fast with `RowTooLarge`, not loop forever growing
    /// the file section by section.
    #[test]
    fn oversize_row_is_rejected_instead_of_looping_forever() {
        let columns: Vec<String> = (0..16).map(|i| format!("col{i}")).collect();
        let schema = vec![ScalarType::String; 16];
        let catalog = Catalog::new(columns, schema);

        let wide_row: Row = (0..16).map(|_| Value::String("x".repeat(255))).collect();
        let mut stream = Cursor::new(Vec::new());

        let err = write_rows(&mut stream, &catalog, vec![wide_row]).unwrap_err();
        assert!(matches!(err, Error::RowTooLarge(_)));
        assert!(stream.into_inner().is_empty());
    }
}
