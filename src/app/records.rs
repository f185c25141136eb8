//! Text records read from stdin and written to stdout/stderr
//!
//! One record per line: `key,sequence_number,sequence_size,payload`. The
//! payload is everything after the third comma, so it may contain commas.

use crate::barrier::api::{HeaderValue, Message, CORRELATION_ID, SEQUENCE_NUMBER, SEQUENCE_SIZE};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("expected 'key,sequence_number,sequence_size,payload', got {fields} field(s)")]
    FieldCount { fields: usize },

    #[error("empty correlation key")]
    EmptyKey,

    #[error("invalid {field} '{value}'")]
    InvalidNumber { field: &'static str, value: String },
}

/// Parse one input line; `Ok(None)` for blank lines and `#` comments
pub fn parse_record(line: &str) -> Result<Option<Message>, RecordError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.trim_start().starts_with('#') {
        return Ok(None);
    }

    let fields: Vec<&str> = line.splitn(4, ',').collect();
    let &[key, number, size, payload] = fields.as_slice() else {
        return Err(RecordError::FieldCount {
            fields: fields.len(),
        });
    };

    let key = key.trim();
    if key.is_empty() {
        return Err(RecordError::EmptyKey);
    }

    let message = Message::new(payload)
        .with_header(CORRELATION_ID, key)
        .with_header(SEQUENCE_NUMBER, parse_number("sequence_number", number)?)
        .with_header(SEQUENCE_SIZE, parse_number("sequence_size", size)?);
    Ok(Some(message))
}

fn parse_number(field: &'static str, value: &str) -> Result<i64, RecordError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| RecordError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

/// Render a message back into record form
pub fn format_record(message: &Message) -> String {
    let key = match message.header.get(CORRELATION_ID) {
        Some(HeaderValue::Text(key)) => key.clone(),
        Some(HeaderValue::Integer(key)) => key.to_string(),
        _ => String::new(),
    };
    let number = message
        .header
        .sequence_number()
        .map(|n| n.to_string())
        .unwrap_or_default();
    let size = message
        .header
        .sequence_size()
        .map(|n| n.to_string())
        .unwrap_or_default();

    format!("{},{},{},{}", key, number, size, message.payload)
}
