use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

pub const BASE_URL: &str = "https://logbook.qrz.com/api";
pub const USER_AGENT: &str = concat!("QrzLogbookClient/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// Upper bound the service honours for MAX:<n>
pub const PAGE_SIZE: usize = 2000;
pub const PAGE_DELAY_MS: u64 = 200;

pub const ACTION_STATUS: &str = "STATUS";
pub const ACTION_FETCH: &str = "FETCH";

pub const RESULT_OK: &str = "OK";
pub const RESULT_FAIL: &str = "FAIL";
pub const RESULT_AUTH: &str = "AUTH";

pub const ADIF_MARKER: &str = "ADIF=";
pub const NO_ENTRIES_REASON: &str = "no log entries found";

pub const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("accept", "*/*"),
    ("content-type", "application/x-www-form-urlencoded"),
];

pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (k, v) in DEFAULT_HEADERS {
        let name = HeaderName::from_static(k);
        if let Ok(val) = HeaderValue::from_str(v) {
            headers.insert(name, val);
        }
    }
    headers
}
