//! Interpretation of `ACTION=STATUS` responses.

use crate::constants::{RESULT_AUTH, RESULT_OK};
use crate::error::{Error, Result};
use crate::models::AccountStatus;
use crate::response::ParsedFields;

/// Turn a parsed status response into an [`AccountStatus`].
pub fn interpret_status(fields: &ParsedFields) -> Result<AccountStatus> {
    let result = fields.result();
    if result != RESULT_OK {
        if result == RESULT_AUTH {
            return Err(Error::SubscriptionRequired);
        }
        let reason = fields
            .reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("unknown error, RESULT={result}"));
        return Err(Error::Service { reason });
    }

    let callsign = fields.non_empty("CALLSIGN").ok_or(Error::MissingCallsign)?;

    Ok(AccountStatus {
        callsign: callsign.to_string(),
        book_id: fields.non_empty("BOOKID").map(str::to_string),
        qso_count: fields.count(),
        confirmed_count: fields.number("CONFIRMED"),
    })
}
