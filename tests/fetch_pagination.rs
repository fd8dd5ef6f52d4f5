use async_trait::async_trait;
use chrono::NaiveDate;
use qrz_logbook_client::{
    error::Result, ClientConfig, Completion, Error, FetchAnomaly, QrzLogbookClient, Transport,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Replays canned response bodies and records every form it was sent.
#[derive(Clone, Default)]
struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<Result<Vec<u8>>>>>,
    requests: Arc<Mutex<Vec<Vec<(String, String)>>>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<Result<Vec<u8>>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::default(),
        }
    }

    fn replies(bodies: Vec<String>) -> Self {
        Self::new(bodies.into_iter().map(|b| Ok(b.into_bytes())).collect())
    }

    fn requests(&self) -> Vec<Vec<(String, String)>> {
        self.requests.lock().unwrap().clone()
    }

    fn options(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|form| {
                form.iter()
                    .find(|(k, _)| k == "OPTION")
                    .map(|(_, v)| v.clone())
            })
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_form(&self, form: &[(&str, &str)]) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(
            form.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted response left")
    }
}

fn paced_client(
    page_size: usize,
    page_delay_ms: u64,
    transport: ScriptedTransport,
) -> QrzLogbookClient<ScriptedTransport> {
    let config = ClientConfig {
        page_size,
        page_delay_ms,
        ..ClientConfig::default()
    };
    QrzLogbookClient::with_transport("TEST-KEY-0000", config, transport)
}

fn config(page_size: usize) -> ClientConfig {
    ClientConfig {
        page_size,
        page_delay_ms: 0,
        ..ClientConfig::default()
    }
}

fn client(page_size: usize, transport: ScriptedTransport) -> QrzLogbookClient<ScriptedTransport> {
    QrzLogbookClient::with_transport("TEST-KEY-0000", config(page_size), transport)
}

fn field(name: &str, value: &str) -> String {
    format!("<{}:{}>{}", name, value.chars().count(), value)
}

fn record(call: &str, log_id: Option<u64>) -> String {
    let mut rec = [
        field("CALL", call),
        field("BAND", "20m"),
        field("MODE", "CW"),
        field("QSO_DATE", "20230615"),
        field("TIME_ON", "930"),
    ]
    .concat();
    if let Some(id) = log_id {
        rec.push_str(&field("APP_QRZLOG_LOGID", &id.to_string()));
    }
    rec.push_str("<eor>\n");
    rec
}

/// Escape the payload the way the service does inside the form envelope.
fn escape(adif: &str) -> String {
    adif.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn page(records: &[String]) -> String {
    format!(
        "RESULT=OK&COUNT={}&ADIF={}",
        records.len(),
        escape(&records.concat())
    )
}

fn page_with_ids(ids: impl IntoIterator<Item = u64>) -> String {
    let records: Vec<String> = ids
        .into_iter()
        .map(|id| record(&format!("K{id}"), Some(id)))
        .collect();
    page(&records)
}

#[tokio::test]
async fn two_pages_are_aggregated() {
    let transport = ScriptedTransport::replies(vec![
        page_with_ids(86342..=88341),
        page_with_ids(88342..=88478),
    ]);
    let client = client(2000, transport.clone());

    let outcome = client.fetch_qsos(None).await.unwrap();

    assert_eq!(outcome.qsos.len(), 2137);
    assert_eq!(outcome.pages, 2);
    assert_eq!(outcome.completion, Completion::Complete);
    assert!(outcome.anomalies.is_empty(), "{:?}", outcome.anomalies);
    assert_eq!(
        transport.options(),
        vec!["MAX:2000,AFTERLOGID:0", "MAX:2000,AFTERLOGID:88342"]
    );
    assert_eq!(outcome.qsos.first().unwrap().log_id, Some(86342));
    assert_eq!(outcome.qsos.last().unwrap().log_id, Some(88478));
}

#[tokio::test]
async fn every_fetch_carries_key_and_action() {
    let transport = ScriptedTransport::replies(vec![page_with_ids([1])]);
    let client = client(10, transport.clone());
    client.fetch_qsos(None).await.unwrap();

    let form = &transport.requests()[0];
    assert_eq!(form[0], ("KEY".to_string(), "TEST-KEY-0000".to_string()));
    assert_eq!(form[1], ("ACTION".to_string(), "FETCH".to_string()));
}

#[tokio::test]
async fn short_page_ends_the_loop() {
    let transport = ScriptedTransport::replies(vec![page_with_ids([500, 501])]);
    let client = client(3, transport.clone());

    let outcome = client.fetch_qsos(None).await.unwrap();

    assert_eq!(outcome.qsos.len(), 2);
    assert_eq!(outcome.completion, Completion::Complete);
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn cursor_advances_past_max_log_id() {
    let transport = ScriptedTransport::replies(vec![
        page_with_ids([10, 45, 7, 45]),
        "RESULT=FAIL&REASON=No log entries found&COUNT=0".to_string(),
    ]);
    let client = client(4, transport.clone());

    let outcome = client.fetch_qsos(None).await.unwrap();

    assert_eq!(
        transport.options(),
        vec!["MAX:4,AFTERLOGID:0", "MAX:4,AFTERLOGID:46"]
    );
    assert_eq!(outcome.qsos.len(), 4);
    assert_eq!(outcome.pages, 2);
    assert!(outcome.is_complete());
}

#[tokio::test]
async fn fail_with_zero_count_ends_the_loop() {
    let transport = ScriptedTransport::replies(vec![
        page_with_ids([1, 2]),
        "RESULT=FAIL&COUNT=0".to_string(),
    ]);
    let outcome = client(2, transport.clone()).fetch_qsos(None).await.unwrap();
    assert_eq!(outcome.qsos.len(), 2);
    assert!(outcome.is_complete());
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn full_page_without_log_ids_stalls() {
    let records = vec![record("W1AW", None), record("K1ABC", None)];
    let transport = ScriptedTransport::replies(vec![page(&records)]);
    let client = client(2, transport.clone());

    let outcome = client.fetch_qsos(None).await.unwrap();

    assert_eq!(transport.requests().len(), 1);
    assert_eq!(outcome.qsos.len(), 2);
    assert_eq!(
        outcome.completion,
        Completion::Stalled { page: 1, after_log_id: 0 }
    );
    assert!(!outcome.is_complete());
    assert!(outcome
        .anomalies
        .contains(&FetchAnomaly::MissingLogIds { page: 1, missing: 2 }));
}

#[tokio::test]
async fn since_date_is_sent_as_modsince() {
    let transport = ScriptedTransport::replies(vec![
        "RESULT=OK&REASON=no log entries found&COUNT=0".to_string(),
    ]);
    let since = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

    let outcome = client(2000, transport.clone())
        .fetch_qsos(Some(since))
        .await
        .unwrap();

    assert!(outcome.qsos.is_empty());
    assert_eq!(
        transport.options(),
        vec!["MAX:2000,AFTERLOGID:0,MODSINCE:2024-01-31"]
    );
}

#[tokio::test]
async fn auth_mid_fetch_is_session_expired() {
    let transport = ScriptedTransport::replies(vec![
        page_with_ids([1, 2]),
        "RESULT=AUTH&COUNT=0".to_string(),
    ]);
    let err = client(2, transport).fetch_qsos(None).await.unwrap_err();
    assert!(matches!(err, Error::SessionExpired));
}

#[tokio::test]
async fn service_failure_surfaces_reason() {
    let transport = ScriptedTransport::replies(vec!["RESULT=FAIL&COUNT=12&REASON=invalid option".to_string()]);
    match client(2000, transport).fetch_qsos(None).await {
        Err(Error::Service { reason }) => assert_eq!(reason, "invalid option"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn transport_failure_is_not_retried() {
    let transport = ScriptedTransport::new(vec![Err(Error::Status {
        status: reqwest::StatusCode::BAD_GATEWAY,
        body: "upstream".into(),
    })]);
    let err = client(2000, transport.clone()).fetch_qsos(None).await.unwrap_err();
    assert!(matches!(err, Error::Status { .. }));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn ok_without_adif_is_an_anomaly_not_an_error() {
    let transport = ScriptedTransport::replies(vec!["RESULT=OK&COUNT=0".to_string()]);
    let outcome = client(2000, transport).fetch_qsos(None).await.unwrap();
    assert!(outcome.qsos.is_empty());
    assert!(outcome.is_complete());
    assert_eq!(outcome.anomalies, vec![FetchAnomaly::EmptyPayload { page: 1 }]);
}

#[tokio::test]
async fn count_mismatch_and_dropped_records_are_reported() {
    let adif = [
        record("W1AW", Some(1)),
        // no MODE
        format!("{}{}<eor>", field("CALL", "K9X"), field("BAND", "40m")),
    ]
    .concat();
    let body = format!("RESULT=OK&COUNT=2&ADIF={}", escape(&adif));
    let transport = ScriptedTransport::replies(vec![body]);

    let outcome = client(2000, transport).fetch_qsos(None).await.unwrap();

    assert_eq!(outcome.qsos.len(), 1);
    assert_eq!(
        outcome.anomalies,
        vec![
            FetchAnomaly::CountMismatch { page: 1, declared: 2, parsed: 1 },
            FetchAnomaly::DroppedRecords { page: 1, dropped: 1 },
        ]
    );
}

#[tokio::test]
async fn full_page_shortened_by_drops_is_flagged() {
    let adif = [
        record("W1AW", Some(1)),
        record("K1ABC", Some(2)),
        // no MODE
        format!("{}{}<eor>", field("CALL", "K9X"), field("BAND", "40m")),
    ]
    .concat();
    let body = format!("RESULT=OK&COUNT=3&ADIF={}", escape(&adif));
    let transport = ScriptedTransport::replies(vec![body]);

    let outcome = client(3, transport.clone()).fetch_qsos(None).await.unwrap();

    assert_eq!(outcome.completion, Completion::Complete);
    assert_eq!(outcome.qsos.len(), 2);
    assert_eq!(transport.requests().len(), 1);
    assert!(outcome
        .anomalies
        .contains(&FetchAnomaly::TruncatedByDrops { page: 1, dropped: 1 }));
}

#[tokio::test]
async fn latin1_page_decodes_through_fallback() {
    let mut body = b"RESULT=OK&COUNT=1&ADIF=".to_vec();
    let fields = record("EA4XYZ", Some(3));
    let fields = fields.trim_end().trim_end_matches("<eor>");
    body.extend_from_slice(escape(fields).as_bytes());
    body.extend_from_slice(b"&lt;name:4&gt;Jos\xe9&lt;eor&gt;");
    let transport = ScriptedTransport::new(vec![Ok(body)]);

    let outcome = client(2000, transport).fetch_qsos(None).await.unwrap();

    assert_eq!(outcome.qsos.len(), 1);
    assert_eq!(outcome.qsos[0].callsign, "EA4XYZ");
    assert!(outcome.qsos[0].raw_adif.ends_with("<name:4>José"));
    assert_eq!(outcome.anomalies, vec![FetchAnomaly::DecodeFallback { page: 1 }]);
}

#[tokio::test]
async fn cancelled_token_stops_before_request() {
    let transport = ScriptedTransport::replies(vec![page_with_ids([1])]);
    let token = CancellationToken::new();
    token.cancel();
    let client = client(2000, transport.clone()).with_cancellation(token);

    let err = client.fetch_qsos(None).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(transport.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn pages_are_spaced_by_the_configured_delay() {
    let transport = ScriptedTransport::replies(vec![
        page_with_ids([1, 2]),
        page_with_ids([3, 4]),
        page_with_ids([5]),
    ]);
    let client = paced_client(2, 200, transport.clone());

    let started = tokio::time::Instant::now();
    let outcome = client.fetch_qsos(None).await.unwrap();

    assert_eq!(outcome.pages, 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(600), "{elapsed:?}");
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_page_delay_aborts_the_fetch() {
    let transport = ScriptedTransport::replies(vec![
        page_with_ids([1, 2]),
        page_with_ids([3]),
    ]);
    let token = CancellationToken::new();
    let client = paced_client(2, 200, transport.clone()).with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = client.fetch_qsos(None).await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn status_auth_requires_subscription() {
    let transport = ScriptedTransport::replies(vec!["RESULT=AUTH".to_string()]);
    let client = client(2000, transport.clone());

    let err = client.validate_api_key().await.unwrap_err();
    assert!(matches!(err, Error::SubscriptionRequired));

    let form = &transport.requests()[0];
    assert!(form.contains(&("ACTION".to_string(), "STATUS".to_string())));
}

#[tokio::test]
async fn status_ok_returns_account() {
    let transport = ScriptedTransport::replies(vec![
        "RESULT=OK&CALLSIGN=W1AW&BOOKID=77&COUNT=2137&CONFIRMED=12".to_string(),
    ]);
    let status = client(2000, transport).validate_api_key().await.unwrap();
    assert_eq!(status.callsign, "W1AW");
    assert_eq!(status.book_id.as_deref(), Some("77"));
    assert_eq!(status.qso_count, 2137);
    assert_eq!(status.confirmed_count, 12);
}
