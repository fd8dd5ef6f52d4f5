use crate::constants::{ACTION_FETCH, ACTION_STATUS};
use crate::decode::decode_body;
use crate::error::{Error, Result};
use crate::models::{AccountStatus, ClientConfig, Completion, FetchAnomaly, FetchOutcome};
use crate::pagination::{
    classify_page, continuation, fetch_options, max_log_id, Continuation, PageVerdict,
};
use crate::response::{parse_response, ParsedFields};
use crate::status::interpret_status;
use crate::transport::{HttpTransport, Transport};
use chrono::NaiveDate;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shorten an API key for logging: `ABCD...WXYZ`.
pub fn mask_api_key(api_key: &str) -> String {
    let chars: Vec<char> = api_key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Client for the QRZ Logbook API.
///
/// Requests are strictly sequential: every FETCH depends on the log ids parsed
/// from the page before it.
pub struct QrzLogbookClient<T = HttpTransport> {
    api_key: String,
    config: ClientConfig,
    transport: T,
    cancel: Option<CancellationToken>,
}

impl QrzLogbookClient<HttpTransport> {
    pub fn new(api_key: impl Into<String>, config: Option<ClientConfig>) -> Result<Self> {
        let cfg = config.unwrap_or_default();
        let transport = HttpTransport::new(&cfg)?;
        Ok(Self::with_transport(api_key, cfg, transport))
    }
}

impl<T: Transport> QrzLogbookClient<T> {
    pub fn with_transport(api_key: impl Into<String>, config: ClientConfig, transport: T) -> Self {
        Self {
            api_key: api_key.into(),
            config,
            transport,
            cancel: None,
        }
    }

    /// Abort between requests once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Check the key with `ACTION=STATUS` and return the account summary.
    pub async fn validate_api_key(&self) -> Result<AccountStatus> {
        info!("Validating API key {}", mask_api_key(&self.api_key));
        debug!("POST {} ACTION={}", self.config.base_url, ACTION_STATUS);

        let form = [("KEY", self.api_key.as_str()), ("ACTION", ACTION_STATUS)];
        let (fields, _) = self.exchange(&form).await?;
        debug!("Parsed keys: {:?}", fields.keys().collect::<Vec<_>>());

        let status = interpret_status(&fields)?;
        info!(
            "Authenticated as {} (book {}, {} QSOs, {} confirmed)",
            status.callsign,
            status.book_id.as_deref().unwrap_or("N/A"),
            status.qso_count,
            status.confirmed_count
        );
        Ok(status)
    }

    /// Download every QSO, optionally only those modified since `since`.
    ///
    /// A full page without usable log ids ends the run with
    /// [`Completion::Stalled`] instead of an error; the records fetched so far
    /// are returned.
    pub async fn fetch_qsos(&self, since: Option<NaiveDate>) -> Result<FetchOutcome> {
        let page_size = self.config.page_size.max(1);
        let mut qsos = Vec::new();
        let mut anomalies = Vec::new();
        let mut after_log_id = 0u64;
        let mut page = 1u32;

        let completion = loop {
            info!(
                "Fetching page {} (afterLogId={}, pageSize={})",
                page, after_log_id, page_size
            );
            let options = fetch_options(page_size, after_log_id, since);
            debug!("POST {} ACTION={} OPTION={}", self.config.base_url, ACTION_FETCH, options);

            let form = [
                ("KEY", self.api_key.as_str()),
                ("ACTION", ACTION_FETCH),
                ("OPTION", options.as_str()),
            ];
            let (fields, used_fallback) = self.exchange(&form).await?;
            if used_fallback {
                anomalies.push(FetchAnomaly::DecodeFallback { page });
            }

            let declared = fields.count();
            debug!(
                "RESULT={}, COUNT={}, REASON={}",
                fields.result(),
                declared,
                fields.reason().unwrap_or("N/A")
            );

            let batch = match classify_page(&fields)? {
                PageVerdict::Exhausted => {
                    info!("No (more) QSOs found");
                    break Completion::Complete;
                }
                PageVerdict::EmptyPayload => {
                    warn!("Page {}: RESULT=OK without ADIF payload", page);
                    anomalies.push(FetchAnomaly::EmptyPayload { page });
                    break Completion::Complete;
                }
                PageVerdict::Records(batch) => batch,
            };

            let parsed = batch.qsos.len();
            info!("Page {}: parsed {} QSOs (API COUNT={})", page, parsed, declared);
            if parsed as u64 != declared {
                warn!("Page {}: parsed {} QSOs but API COUNT={}", page, parsed, declared);
                anomalies.push(FetchAnomaly::CountMismatch { page, declared, parsed });
            }
            if batch.dropped > 0 {
                warn!(
                    "Page {}: dropped {} records without callsign, band or mode",
                    page, batch.dropped
                );
                anomalies.push(FetchAnomaly::DroppedRecords { page, dropped: batch.dropped });
            }
            let missing = batch.qsos.iter().filter(|q| q.log_id.is_none()).count();
            if missing > 0 {
                warn!("Page {}: {} QSOs missing APP_QRZLOG_LOGID", page, missing);
                anomalies.push(FetchAnomaly::MissingLogIds { page, missing });
            }
            debug!("Max log_id on page {}: {}", page, max_log_id(&batch.qsos));

            let dropped = batch.dropped;
            let next = continuation(&batch.qsos, page_size, after_log_id);
            qsos.extend(batch.qsos);

            match next {
                Continuation::LastPage => {
                    debug!("Last page (got {} < {})", parsed, page_size);
                    if dropped > 0 && parsed + dropped >= page_size {
                        warn!(
                            "Page {} held {} records before {} were dropped; later pages were not requested",
                            page,
                            parsed + dropped,
                            dropped
                        );
                        anomalies.push(FetchAnomaly::TruncatedByDrops { page, dropped });
                    }
                    break Completion::Complete;
                }
                Continuation::Stalled => {
                    error!("Cannot paginate past page {}: no usable log ids", page);
                    break Completion::Stalled { page, after_log_id };
                }
                Continuation::Next(cursor) => {
                    after_log_id = cursor;
                    page += 1;
                    self.pause().await?;
                }
            }
        };

        info!("Fetched {} QSOs in {} page(s)", qsos.len(), page);
        Ok(FetchOutcome {
            qsos,
            completion,
            pages: page,
            anomalies,
        })
    }

    /// Send one form, decode and split the reply. The flag reports a Latin-1 fallback.
    async fn exchange(&self, form: &[(&str, &str)]) -> Result<(ParsedFields, bool)> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let started = Instant::now();
        let bytes = self.transport.post_form(form).await?;
        debug!(
            "Response received in {:.2}s, {} bytes",
            started.elapsed().as_secs_f64(),
            bytes.len()
        );

        let decoded = decode_body(&bytes);
        if decoded.used_fallback {
            debug!("UTF-8 decode failed, falling back to Latin-1");
        }
        if bytes.len() < 500 {
            debug!("Full response: {}", decoded.text);
        }
        Ok((parse_response(&decoded.text), decoded.used_fallback))
    }

    async fn pause(&self) -> Result<()> {
        let delay = self.config.page_delay();
        debug!("Sleeping {}ms before next page", delay.as_millis());
        match &self.cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(Error::Cancelled),
                _ = tokio::time::sleep(delay) => Ok(()),
            },
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

pub async fn validate_api_key(api_key: &str, config: Option<ClientConfig>) -> Result<AccountStatus> {
    let client = QrzLogbookClient::new(api_key, config)?;
    client.validate_api_key().await
}

pub async fn fetch_all_qsos(
    api_key: &str,
    since: Option<NaiveDate>,
    config: Option<ClientConfig>,
) -> Result<FetchOutcome> {
    let client = QrzLogbookClient::new(api_key, config)?;
    client.fetch_qsos(since).await
}
