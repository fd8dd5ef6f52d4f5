//! Pure pieces of the FETCH paging loop.
//!
//! The service has no continuation token. Each page is requested with
//! `AFTERLOGID:<n>` where `n` is one past the largest `APP_QRZLOG_LOGID` seen
//! on the previous page, so the cursor comes out of the parsed ADIF.

use chrono::NaiveDate;

use crate::adif::{parse_adif, AdifBatch};
use crate::constants::{NO_ENTRIES_REASON, RESULT_AUTH, RESULT_FAIL, RESULT_OK};
use crate::error::{Error, Result};
use crate::models::FetchedQso;
use crate::response::ParsedFields;

/// Build the `OPTION` value for one FETCH request.
pub fn fetch_options(page_size: usize, after_log_id: u64, since: Option<NaiveDate>) -> String {
    let mut parts = vec![
        format!("MAX:{page_size}"),
        format!("AFTERLOGID:{after_log_id}"),
    ];
    if let Some(since) = since {
        parts.push(format!("MODSINCE:{}", since.format("%Y-%m-%d")));
    }
    parts.join(",")
}

/// Largest log id among `qsos`, 0 when none carry one.
pub fn max_log_id(qsos: &[FetchedQso]) -> u64 {
    qsos.iter().filter_map(|q| q.log_id).max().unwrap_or(0)
}

/// What a FETCH response means for the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageVerdict {
    /// The service has nothing (more) to return.
    Exhausted,
    /// `RESULT=OK` but no ADIF payload.
    EmptyPayload,
    Records(AdifBatch),
}

/// Classify a parsed FETCH response, failing on auth or service errors.
pub fn classify_page(fields: &ParsedFields) -> Result<PageVerdict> {
    let reason = fields.reason().unwrap_or("");
    if reason.to_lowercase().contains(NO_ENTRIES_REASON) {
        return Ok(PageVerdict::Exhausted);
    }

    let result = fields.result();
    // Some deployments answer FAIL/COUNT=0 instead of the reason above.
    if result == RESULT_FAIL && fields.count() == 0 {
        return Ok(PageVerdict::Exhausted);
    }

    if result != RESULT_OK {
        if result == RESULT_AUTH {
            return Err(Error::SessionExpired);
        }
        let reason = if reason.is_empty() {
            format!("unexpected RESULT={result}")
        } else {
            reason.to_string()
        };
        return Err(Error::Service { reason });
    }

    match fields.adif() {
        Some(adif) if !adif.trim().is_empty() => Ok(PageVerdict::Records(parse_adif(adif))),
        _ => Ok(PageVerdict::EmptyPayload),
    }
}

/// Next step after a page of records has been accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Short page: this was the last one.
    LastPage,
    /// Full page without any log id; no safe cursor exists.
    Stalled,
    /// Request the next page with this `AFTERLOGID`.
    Next(u64),
}

/// Decide whether to request another page after `qsos` came back for a
/// request made with `after_log_id`.
///
/// The cursor never moves backwards: a full page whose ids would not advance
/// it, or whose maximum id is `u64::MAX`, is treated like a page without ids.
pub fn continuation(qsos: &[FetchedQso], page_size: usize, after_log_id: u64) -> Continuation {
    if qsos.len() < page_size {
        return Continuation::LastPage;
    }
    match max_log_id(qsos) {
        0 => Continuation::Stalled,
        max if max < after_log_id => Continuation::Stalled,
        max => max
            .checked_add(1)
            .map_or(Continuation::Stalled, Continuation::Next),
    }
}
