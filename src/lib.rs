pub mod adif;
pub mod client;
pub mod constants;
pub mod decode;
pub mod error;
pub mod models;
pub mod pagination;
pub mod response;
pub mod status;
pub mod summary;
pub mod transport;

pub use adif::{parse_adif, parse_adif_records, AdifBatch};
pub use client::{fetch_all_qsos, mask_api_key, validate_api_key, QrzLogbookClient};
pub use constants::{default_headers, BASE_URL, DEFAULT_TIMEOUT_SECS, PAGE_SIZE};
pub use decode::{decode_body, DecodedBody};
pub use error::Error;
pub use models::{
    AccountStatus, ClientConfig, Completion, FetchAnomaly, FetchOutcome, FetchedQso,
};
pub use response::{parse_response, ParsedFields};
pub use summary::QsoSummary;
pub use tokio_util::sync::CancellationToken;
pub use transport::{HttpTransport, Transport};
