//! PAX extended-header records.
//!
//! A record is one line `"<size> <key>=<value>\n"` whose decimal size
//! counts the whole line, its own digits included. Only the `path` key is
//! acted upon by this crate; other keys are decoded and retained.

use std::collections::BTreeMap;
use std::str;

use crate::error::TarError;

/// Encodes one record, sizing the self-referential length field
pub fn encode_record(key: &str, value: &str) -> Vec<u8> {
    let content = format!(" {}={}\n", key, value);

    // The size counts its own digits; iterate until the estimate is stable.
    let mut size = content.len() + 1;
    loop {
        let total = size.to_string().len() + content.len();
        if total == size {
            break;
        }
        size = total;
    }

    let mut record = Vec::with_capacity(size);
    record.extend_from_slice(size.to_string().as_bytes());
    record.extend_from_slice(content.as_bytes());
    record
}

/// Decodes a PAX payload into its key/value records
///
/// Unknown keys are retained; a repeated key keeps its last value.
pub fn decode_records(data: &[u8]) -> Result<BTreeMap<String, String>, TarError> {
    let mut records = BTreeMap::new();
    let mut pos = 0;

    while pos < data.len() {
        let space = data[pos..]
            .iter()
            .position(|b| *b == b' ')
            .ok_or_else(|| malformed("record has no size terminator"))?;
        let size: usize = str::from_utf8(&data[pos..pos + space])
            .ok()
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| malformed("record size is not decimal"))?;
        if size <= space + 1 || pos + size > data.len() {
            return Err(malformed("record size is out of range"));
        }

        let body = &data[pos + space + 1..pos + size];
        let body = body
            .strip_suffix(b"\n")
            .ok_or_else(|| malformed("record is not newline-terminated"))?;
        let body =
            str::from_utf8(body).map_err(|_| malformed("record is not UTF-8"))?;
        let (key, value) = body
            .split_once('=')
            .ok_or_else(|| malformed("record has no '=' separator"))?;

        records.insert(key.to_owned(), value.to_owned());
        pos += size;
    }

    Ok(records)
}

fn malformed(what: &str) -> TarError {
    TarError::InvalidHeader(format!("extended header: {}", what))
}
