//! Public data models returned by the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants::{
    BASE_URL, DEFAULT_TIMEOUT_SECS, PAGE_DELAY_MS, PAGE_SIZE, USER_AGENT,
};
use crate::error::Result;

/// Client configuration. Every field has a default, so a TOML file only
/// needs the keys it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Records requested per page (`MAX:<n>`).
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Pause between consecutive page requests.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    #[serde(default)]
    pub proxy_url: Option<String>,
}

fn default_base_url() -> String {
    BASE_URL.to_string()
}

fn default_user_agent() -> String {
    USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_page_size() -> usize {
    PAGE_SIZE
}

fn default_page_delay_ms() -> u64 {
    PAGE_DELAY_MS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
            page_delay_ms: default_page_delay_ms(),
            proxy_url: None,
        }
    }
}

impl ClientConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

/// Account summary returned by `ACTION=STATUS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountStatus {
    /// Callsign the API key belongs to.
    pub callsign: String,
    /// Logbook identifier, if the service sent one.
    pub book_id: Option<String>,
    /// Total QSOs in the logbook.
    pub qso_count: u64,
    /// Confirmed QSOs in the logbook.
    pub confirmed_count: u64,
}

/// One QSO decoded from the ADIF payload of a fetch page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchedQso {
    pub callsign: String,
    pub band: String,
    pub mode: String,
    /// `QSO_DATE` + `TIME_ON` in UTC; `None` when the date is missing or invalid.
    pub timestamp: Option<DateTime<Utc>>,
    /// `APP_QRZLOG_LOGID`, the service's sequence number for this record.
    pub log_id: Option<u64>,
    /// Trimmed record text, kept for diagnostics.
    pub raw_adif: String,
}

impl FetchedQso {
    /// Timestamp with the current time substituted when unknown.
    pub fn timestamp_or_now(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or_else(Utc::now)
    }
}

/// How a fetch-all run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Completion {
    /// The service signalled the end of the logbook.
    Complete,
    /// A full page carried no log ids, so no further cursor could be derived.
    /// Records up to and including `page` were kept.
    Stalled { page: u32, after_log_id: u64 },
}

/// Non-fatal irregularity observed while paging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchAnomaly {
    /// `COUNT` disagreed with the number of records parsed.
    CountMismatch { page: u32, declared: u64, parsed: usize },
    /// Records on the page without `APP_QRZLOG_LOGID`.
    MissingLogIds { page: u32, missing: usize },
    /// Records dropped for lacking callsign, band or mode.
    DroppedRecords { page: u32, dropped: usize },
    /// A page the service filled was short only after drops, so paging ended
    /// there and later pages were never requested.
    TruncatedByDrops { page: u32, dropped: usize },
    /// Response body was not valid UTF-8 and was read as Latin-1.
    DecodeFallback { page: u32 },
    /// `RESULT=OK` with no ADIF payload.
    EmptyPayload { page: u32 },
}

/// Aggregated result of [`crate::QrzLogbookClient::fetch_qsos`].
#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub qsos: Vec<FetchedQso>,
    pub completion: Completion,
    /// Number of FETCH requests issued.
    pub pages: u32,
    pub anomalies: Vec<FetchAnomaly>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Complete
    }
}
