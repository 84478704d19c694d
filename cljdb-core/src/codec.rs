//! Big-endian fixed-width primitive encoders/decoders.
//!
//! Everything on disk in cljdb is big-endian: page footers, directory
//! entries, and the fixed-width scalar fields inside row payloads. Strings
//! are the one variable-width field and use a `(len: u8, bytes)` prefix.

use crate::error::{Error, Result};

/// Maximum byte length of an encoded `STRING` value.
pub const MAX_STRING_LEN: usize = 255;

pub fn encode_u16(v: u16) -> [u8; 2] {
    v.to_be_bytes()
}

pub fn decode_u16(buf: &[u8]) -> Result<u16> {
    let bytes: [u8; 2] = buf
        .get(..2)
        .ok_or_else(|| Error::CorruptPage("truncated u16".into()))?
        .try_into()
        .unwrap();
    Ok(u16::from_be_bytes(bytes))
}

pub fn encode_i32(v: i32) -> [u8; 4] {
    v.to_be_bytes()
}

pub fn decode_i32(buf: &[u8]) -> Result<i32> {
    let bytes: [u8; 4] = buf
        .get(..4)
        .ok_or_else(|| Error::CorruptPage("truncated i32".into()))?
        .try_into()
        .unwrap();
    Ok(i32::from_be_bytes(bytes))
}

pub fn encode_f32(v: f32) -> [u8; 4] {
    v.to_be_bytes()
}

pub fn decode_f32(buf: &[u8]) -> Result<f32> {
    let bytes: [u8; 4] = buf
        .get(..4)
        .ok_or_else(|| Error::CorruptPage("truncated f32".into()))?
        .try_into()
        .unwrap();
    Ok(f32::from_be_bytes(bytes))
}

/// Encode a string as `len: u8` followed by its UTF-8 bytes.
///
/// Fails with `SchemaViolation` if the string is longer than
/// `MAX_STRING_LEN` bytes.
pub fn encode_string(s: &str) -> Result<Vec<u8>> {
    let bytes = s.as_bytes();
    if bytes.len() > MAX_STRING_LEN {
        return Err(Error::SchemaViolation(format!(
            "string of {} bytes exceeds max length {MAX_STRING_LEN}",
            bytes.len()
        )));
    }
    let mut out = Vec::with_capacity(1 + bytes.len());
    out.push(bytes.len() as u8);
    out.extend_from_slice(bytes);
    Ok(out)
}

/// Decode a `(len: u8, bytes)` string, returning the string and the number
/// of bytes consumed from `buf`.
pub fn decode_string(buf: &[u8]) -> Result<(String, usize)> {
    let len = *buf
        .first()
        .ok_or_else(|| Error::CorruptPage("truncated string length".into()))? as usize;
    let data = buf
        .get(1..1 + len)
        .ok_or_else(|| Error::CorruptPage("truncated string body".into()))?;
    let s = std::str::from_utf8(data)
        .map_err(|e| Error::CorruptPage(format!("invalid UTF-8 in string: {e}")))?
        .to_string();
    Ok((s, 1 + len))
}

/// Byte length a string will occupy once encoded, without encoding it.
pub fn encoded_string_len(s: &str) -> usize {
    1 + s.len()
}
