//! Slotted page format.
//!
//! A data page is `PAGE_SIZE` bytes: packed row payloads from the front,
//! zero-filled slack, then a 4-byte footer `(row_count: u16, free_offset:
//! u16)`, both big-endian. There is no explicit slot directory: row
//! boundaries are recovered by walking the payload left to right guided
//! by the table's schema, but `SLOT_SIZE` bytes per row are still
//! reserved against the free-byte budget so the accounting matches a
//! layout that does write one.

use crate::codec;
use crate::error::{Error, Result};
use crate::tuple::{ColumnIndex, Row, ScalarType, Value};

pub const PAGE_SIZE: usize = 4096;
pub const COUNT_SIZE: usize = 2;
pub const FREE_OFFSET_SIZE: usize = 2;
pub const FOOTER_SIZE: usize = COUNT_SIZE + FREE_OFFSET_SIZE;
pub const SLOT_SIZE: usize = 2;
pub const DIR_ENTRY_SIZE: usize = 2;
pub const PAGE_DIRECTORY_ENTRIES_NUM: usize = 2048;
pub const SECTION_STRIDE: usize = PAGE_DIRECTORY_ENTRIES_NUM + 1;

/// Free-byte count of a freshly zeroed data page.
pub const EMPTY_PAGE_FREE: u16 = (PAGE_SIZE - FOOTER_SIZE) as u16;

/// An all-zero data page.
pub fn empty_data_page() -> Vec<u8> {
    vec![0u8; PAGE_SIZE]
}

/// A freshly initialized page directory: `PAGE_DIRECTORY_ENTRIES_NUM`
/// copies of the empty-page free-byte count.
pub fn empty_directory() -> Vec<u16> {
    vec![EMPTY_PAGE_FREE; PAGE_DIRECTORY_ENTRIES_NUM]
}

/// Absolute page index `i` is a section's page directory iff it falls at
/// the start of a `SECTION_STRIDE` run.
pub fn is_directory_page(absolute_page_index: u64) -> bool {
    absolute_page_index % SECTION_STRIDE as u64 == 0
}

/// Byte-encode one row's fields back to back, in schema order.
pub fn encode_row(row: &Row, columns: &ColumnIndex) -> Result<Vec<u8>> {
    if row.len() != columns.arity() {
        return Err(Error::SchemaViolation(format!(
            "row has {} fields, expected {}",
            row.len(),
            columns.arity()
        )));
    }
    let mut out = Vec::new();
    for (value, ty) in row.iter().zip(columns.schema().iter()) {
        encode_field(value, *ty, &mut out)?;
    }
    Ok(out)
}

fn encode_field(value: &Value, ty: ScalarType, out: &mut Vec<u8>) -> Result<()> {
    match (value, ty) {
        (Value::String(s), ScalarType::String) => out.extend(codec::encode_string(s)?),
        (Value::Int(v), ScalarType::Int) => out.extend(codec::encode_i32(*v)),
        (Value::Float(v), ScalarType::Float) => out.extend(codec::encode_f32(*v)),
        _ => {
            return Err(Error::SchemaViolation(format!(
                "value {value:?} does not match column type {ty:?}"
            )))
        }
    }
    Ok(())
}

/// Byte length of one row once encoded, without encoding it.
pub fn row_byte_len(row: &Row, columns: &ColumnIndex) -> Result<usize> {
    let mut total = 0usize;
    for (value, ty) in row.iter().zip(columns.schema().iter()) {
        total += match (value, ty) {
            (Value::String(s), ScalarType::String) => codec::encoded_string_len(s),
            (Value::Int(_), ScalarType::Int) => 4,
            (Value::Float(_), ScalarType::Float) => 4,
            _ => {
                return Err(Error::SchemaViolation(format!(
                    "value {value:?} does not match column type {ty:?}"
                )))
            }
        };
    }
    Ok(total)
}

/// Cost of placing `row` into a page: its encoded byte length plus the
/// per-row slot reservation.
pub fn row_cost(row: &Row, columns: &ColumnIndex) -> Result<usize> {
    Ok(row_byte_len(row, columns)? + SLOT_SIZE)
}

/// Parse the `(row_count, free_offset)` footer out of a full page.
fn read_footer(page: &[u8]) -> Result<(u16, u16)> {
    if page.len() != PAGE_SIZE {
        return Err(Error::CorruptPage(format!(
            "page is {} bytes, expected {PAGE_SIZE}",
            page.len()
        )));
    }
    let footer = &page[PAGE_SIZE - FOOTER_SIZE..];
    let row_count = codec::decode_u16(&footer[..COUNT_SIZE])?;
    let free_offset = codec::decode_u16(&footer[COUNT_SIZE..])?;
    Ok((row_count, free_offset))
}

/// Walk a page's payload bytes, guided by `columns`' schema, recovering
/// every row. Fails with `CorruptPage` if the footer's `row_count`
/// disagrees with what schema-guided parsing actually recovers, or if a
/// field's length prefix or fixed width would overrun the payload.
pub fn take_data_rows(columns: &ColumnIndex, page: &[u8]) -> Result<Vec<Row>> {
    let (row_count, free_offset) = read_footer(page)?;
    let payload = page
        .get(..free_offset as usize)
        .ok_or_else(|| Error::CorruptPage("free_offset beyond page bounds".into()))?;

    let mut rows = Vec::new();
    let mut offset = 0usize;
    let arity = columns.arity();
    let schema = columns.schema();

    while offset < payload.len() {
        let mut fields = Vec::with_capacity(arity);
        for ty in schema.iter() {
            let slice = &payload[offset..];
            let (value, consumed) = match ty {
                ScalarType::String => {
                    let (s, consumed) = codec::decode_string(slice)?;
                    (Value::String(s), consumed)
                }
                ScalarType::Int => (Value::Int(codec::decode_i32(slice)?), 4),
                ScalarType::Float => (Value::Float(codec::decode_f32(slice)?), 4),
            };
            fields.push(value);
            offset += consumed;
        }
        rows.push(fields);
    }

    if rows.len() != row_count as usize {
        return Err(Error::CorruptPage(format!(
            "footer row_count {row_count} disagrees with {} rows recovered by schema walk",
            rows.len()
        )));
    }

    Ok(rows)
}

/// Encode `rows` (already in the order they should appear) into a full
/// `PAGE_SIZE` page: payload, zero padding, then the footer.
pub fn build_page(rows: &[Row], columns: &ColumnIndex) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    for row in rows {
        payload.extend(encode_row(row, columns)?);
    }
    if payload.len() + FOOTER_SIZE > PAGE_SIZE {
        return Err(Error::RowTooLarge(format!(
            "encoded payload of {} bytes does not fit page (budget {})",
            payload.len(),
            PAGE_SIZE - FOOTER_SIZE
        )));
    }

    let mut page = vec![0u8; PAGE_SIZE];
    page[..payload.len()].copy_from_slice(&payload);
    page[PAGE_SIZE - FOOTER_SIZE..PAGE_SIZE - FREE_OFFSET_SIZE]
        .copy_from_slice(&codec::encode_u16(rows.len() as u16));
    page[PAGE_SIZE - FREE_OFFSET_SIZE..].copy_from_slice(&codec::encode_u16(payload.len() as u16));
    Ok(page)
}

/// Encode a section's page directory (`PAGE_DIRECTORY_ENTRIES_NUM`
/// `u16` free-byte counts) into one full page.
pub fn encode_directory(entries: &[u16]) -> Vec<u8> {
    debug_assert_eq!(entries.len(), PAGE_DIRECTORY_ENTRIES_NUM);
    let mut page = vec![0u8; PAGE_SIZE];
    for (i, entry) in entries.iter().enumerate() {
        let at = i * DIR_ENTRY_SIZE;
        page[at..at + DIR_ENTRY_SIZE].copy_from_slice(&codec::encode_u16(*entry));
    }
    page
}

/// Decode a section's page directory out of its raw page bytes.
pub fn decode_directory(page: &[u8]) -> Result<Vec<u16>> {
    if page.len() != PAGE_SIZE {
        return Err(Error::CorruptPage(format!(
            "directory page is {} bytes, expected {PAGE_SIZE}",
            page.len()
        )));
    }
    (0..PAGE_DIRECTORY_ENTRIES_NUM)
        .map(|i| {
            let at = i * DIR_ENTRY_SIZE;
            codec::decode_u16(&page[at..at + DIR_ENTRY_SIZE])
        })
        .collect()
}

/// The directory-entry accounting invariant: free bytes remaining after
/// `payload_bytes` of row data and `row_count` slot reservations.
pub fn free_after(payload_bytes: usize, row_count: usize) -> u16 {
    (PAGE_SIZE - FOOTER_SIZE - payload_bytes - row_count * SLOT_SIZE) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_columns() -> ColumnIndex {
        ColumnIndex::new(
            vec!["name".into(), "age".into()],
            vec![ScalarType::String, ScalarType::Int],
        )
    }

    #[test]
    fn build_then_take_round_trips() {
        let columns = person_columns();
        let rows = vec![
            vec![Value::String("Ana".into()), Value::Int(80)],
            vec![Value::String("Bob".into()), Value::Int(40)],
        ];
        let page = build_page(&rows, &columns).unwrap();
        assert_eq!(page.len(), PAGE_SIZE);

        let (row_count, free_offset) = read_footer(&page).unwrap();
        assert_eq!(row_count as usize, rows.len());

        let decoded = take_data_rows(&columns, &page).unwrap();
        assert_eq!(decoded, rows);

        let payload_bytes = free_offset as usize;
        assert_eq!(
            free_after(payload_bytes, rows.len()),
            (PAGE_SIZE - FOOTER_SIZE - payload_bytes - rows.len() * SLOT_SIZE) as u16
        );
    }

    #[test]
    fn empty_page_has_zero_rows() {
        let columns = person_columns();
        let page = empty_data_page();
        let rows = take_data_rows(&columns, &page).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn directory_round_trips() {
        let entries = empty_directory();
        let page = encode_directory(&entries);
        let decoded = decode_directory(&page).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn oversize_row_is_row_too_large() {
        let columns = person_columns();
        let huge = vec![Value::String("x".repeat(255)), Value::Int(1)];
        let rows: Vec<Row> = std::iter::repeat(huge).take(20).collect();
        assert!(matches!(
            build_page(&rows, &columns),
            Err(Error::RowTooLarge(_))
        ));
    }

    #[test]
    fn directory_page_detection() {
        assert!(is_directory_page(0));
        assert!(!is_directory_page(1));
        assert!(is_directory_page(SECTION_STRIDE as u64));
        assert!(!is_directory_page(SECTION_STRIDE as u64 + 1));
    }
}
