//! ADIF payload decoding.
//!
//! Only the subset of ADI the logbook service emits is handled: records of
//! `<NAME:LEN[:TYPE]>value` fields terminated by `<eor>`. Everything else in a
//! record is skipped.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::models::FetchedQso;

/// Records decoded from one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdifBatch {
    pub qsos: Vec<FetchedQso>,
    /// Non-blank records dropped for lacking callsign, band or mode.
    pub dropped: usize,
}

fn field_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<(\w+):(\d+)(?::[^>]*)?>").expect("ADIF field header pattern")
    })
}

fn end_of_record() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<eor>").expect("ADIF end-of-record pattern"))
}

/// Undo the HTML entity escaping the service applies to the ADIF field.
pub fn unescape_entities(encoded: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(encoded)
}

/// Unescape and decode a raw `ADIF` field value.
pub fn parse_adif(encoded: &str) -> AdifBatch {
    let adif = unescape_entities(encoded);
    let mut batch = AdifBatch::default();

    for record in end_of_record().split(&adif) {
        let record = record.trim();
        if record.is_empty() {
            continue;
        }
        match record_to_qso(record) {
            Some(qso) => batch.qsos.push(qso),
            None => batch.dropped += 1,
        }
    }
    batch
}

/// Decode a payload, discarding the drop count.
pub fn parse_adif_records(encoded: &str) -> Vec<FetchedQso> {
    parse_adif(encoded).qsos
}

/// Collect the fields of a single record, keyed by upper-cased tag name.
///
/// A value is the declared number of characters after the header, clamped to
/// the end of the record. When a declared length overruns into the next field
/// header the value stops at that header instead.
pub fn scan_fields(record: &str) -> HashMap<String, String> {
    let re = field_header();
    let mut fields = HashMap::new();
    let mut pos = 0;

    while let Some(caps) = re.captures_at(record, pos) {
        let (Some(header), Some(name), Some(len)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            break;
        };
        let start = header.end();
        pos = start;
        let Ok(declared) = len.as_str().parse::<usize>() else {
            continue;
        };

        let rest = &record[start..];
        let mut end = rest
            .char_indices()
            .nth(declared)
            .map_or(rest.len(), |(i, _)| i);
        if let Some(next) = re.find(rest).filter(|m| m.start() < end) {
            end = next.start();
        }

        fields.insert(name.as_str().to_ascii_uppercase(), rest[..end].to_string());
        pos = start + end;
    }
    fields
}

fn record_to_qso(record: &str) -> Option<FetchedQso> {
    let fields = scan_fields(record);
    let required = |key: &str| {
        fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let callsign = required("CALL")?;
    let band = required("BAND")?;
    let mode = required("MODE")?;

    let timestamp = fields
        .get("QSO_DATE")
        .filter(|d| !d.is_empty())
        .and_then(|date| parse_timestamp(date, fields.get("TIME_ON").map(String::as_str)));

    Some(FetchedQso {
        callsign,
        band,
        mode,
        timestamp,
        log_id: fields.get("APP_QRZLOG_LOGID").and_then(|v| parse_log_id(v)),
        raw_adif: record.to_string(),
    })
}

/// Combine `QSO_DATE` (`YYYYMMDD`) and `TIME_ON` (`HHMM[SS]`) into a UTC instant.
///
/// Short times are right-padded with zeros, so `930` is 09:30:00. Without a
/// time the QSO is placed at midnight.
pub fn parse_timestamp(date: &str, time: Option<&str>) -> Option<DateTime<Utc>> {
    let date = parse_date(date.trim())?;
    let time = match time.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => parse_time(t)?,
        None => NaiveTime::from_hms_opt(0, 0, 0)?,
    };
    Some(date.and_time(time).and_utc())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = s[0..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let padded: String = format!("{s:0<6}").chars().take(6).collect();
    if !padded.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour = padded[0..2].parse().ok()?;
    let min = padded[2..4].parse().ok()?;
    let sec = padded[4..6].parse().ok()?;
    NaiveTime::from_hms_opt(hour, min, sec)
}

/// `APP_QRZLOG_LOGID` is only usable when it is all digits.
pub fn parse_log_id(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
