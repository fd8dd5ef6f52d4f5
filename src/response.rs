//! Parser for the `key=value&key=value` response envelope.

use std::collections::HashMap;

use crate::constants::ADIF_MARKER;

/// Fields of one service response.
///
/// Values are stored verbatim; the typed accessors trim before interpreting.
/// Lookups return `None` for a missing key and `Some("")` for an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFields {
    fields: HashMap<String, String>,
}

impl ParsedFields {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Value for `key` if present and not blank.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// `RESULT`, trimmed; empty when absent.
    pub fn result(&self) -> &str {
        self.get("RESULT").map(str::trim).unwrap_or("")
    }

    pub fn reason(&self) -> Option<&str> {
        self.non_empty("REASON")
    }

    /// `COUNT` as a number, 0 when absent or not numeric.
    pub fn count(&self) -> u64 {
        self.number("COUNT")
    }

    /// Numeric field, 0 when absent or not numeric.
    pub fn number(&self, key: &str) -> u64 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Raw `ADIF` payload, still entity-escaped.
    pub fn adif(&self) -> Option<&str> {
        self.get("ADIF")
    }

    fn insert_pairs(&mut self, text: &str) {
        for pair in text.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                self.fields.insert(key.to_string(), value.to_string());
            }
        }
    }
}

/// Split a decoded response body into fields.
///
/// The `ADIF` field carries raw record text whose `&` and `=` are not escaped,
/// and it is always the last field. Everything after the first `ADIF=` is
/// therefore its value; only the text before the marker is split on `&`.
pub fn parse_response(text: &str) -> ParsedFields {
    let mut parsed = ParsedFields::default();
    match text.find(ADIF_MARKER) {
        Some(pos) => {
            parsed.insert_pairs(&text[..pos]);
            parsed
                .fields
                .insert("ADIF".to_string(), text[pos + ADIF_MARKER.len()..].to_string());
        }
        None => parsed.insert_pairs(text),
    }
    parsed
}
