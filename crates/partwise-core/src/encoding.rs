//! Order-preserving byte encoding for partition-key values and row keys.
//!
//! Rows are stored under `[type_tag][encoded key][row id]` so that an ordered
//! scan of a relation yields rows in key order, with the row id breaking ties
//! between rows sharing one key value. String keys are NUL-terminated (and
//! reject embedded NUL bytes) so that no encoded key is a prefix of another.

use crate::error::{Error, ValidationError};
use crate::types::{KeyValue, RowId};

/// Type tag for integer keys.
pub const TAG_INT: u8 = 0x01;
/// Type tag for string keys.
pub const TAG_STR: u8 = 0x02;

/// Encode an i64 into 8 bytes that preserve numeric ordering under `memcmp`:
/// flip the sign bit and write big-endian.
pub fn encode_int(value: i64) -> [u8; 8] {
    ((value as u64) ^ (1u64 << 63)).to_be_bytes()
}

/// Decode 8 bytes produced by [`encode_int`].
pub fn decode_int(data: &[u8; 8]) -> i64 {
    (u64::from_be_bytes(*data) ^ (1u64 << 63)) as i64
}

/// Encode a key value with its type tag.
pub fn encode_key(key: &KeyValue) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    match key {
        KeyValue::Int(v) => {
            out.push(TAG_INT);
            out.extend_from_slice(&encode_int(*v));
        }
        KeyValue::Str(s) => {
            if s.as_bytes().contains(&0) {
                return Err(ValidationError::NulByteInKey.into());
            }
            out.push(TAG_STR);
            out.extend_from_slice(s.as_bytes());
            out.push(0);
        }
    }
    Ok(out)
}

/// Encode a full row key: the tagged key value followed by the row id.
pub fn encode_row_key(key: &KeyValue, row_id: RowId) -> Result<Vec<u8>, Error> {
    let mut out = encode_key(key)?;
    out.extend_from_slice(&row_id.to_be_bytes());
    Ok(out)
}

/// Encode a row key for a relation without a partition key (an unpartitioned
/// table's own storage): just the row id, so scans run in insertion order.
pub fn encode_bare_row_key(row_id: RowId) -> Vec<u8> {
    row_id.to_be_bytes().to_vec()
}
