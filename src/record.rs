use crate::error::{MalformedRecordError, Reason};

pub const DELIMITER: u8 = b';';

/// One parsed `key;value` line. Borrows the key from the line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record<'a> {
    pub key: &'a str,
    pub value: f32,
}

/// Splits `line` at the first `;` and parses the remainder as an `f32`.
/// A single trailing `\r` is ignored.
pub fn parse_record(line: &str) -> Result<Record<'_>, MalformedRecordError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let Some(semi_pos) = memchr::memchr(DELIMITER, line.as_bytes()) else {
        return Err(MalformedRecordError::new(Reason::MissingDelimiter, line));
    };
    // `;` is ASCII, so both halves sit on char boundaries
    let (key, rest) = (&line[..semi_pos], &line[semi_pos + 1..]);
    if key.is_empty() {
        return Err(MalformedRecordError::new(Reason::EmptyKey, line));
    }

    let value = match lexical_core::parse::<f32>(rest.as_bytes()) {
        Ok(v) if v.is_finite() => v,
        Ok(v) if v.is_infinite() => {
            return Err(MalformedRecordError::new(Reason::OutOfRange, line));
        }
        _ => return Err(MalformedRecordError::new(Reason::InvalidValue, line)),
    };

    Ok(Record { key, value })
}

/// Byte-level entry point for the mapped-input path.
pub fn parse_record_bytes(line: &[u8]) -> Result<Record<'_>, MalformedRecordError> {
    match std::str::from_utf8(line) {
        Ok(line) => parse_record(line),
        Err(_) => Err(MalformedRecordError::new(
            Reason::InvalidUtf8,
            String::from_utf8_lossy(line),
        )),
    }
}
