//! Form-POST transport to the logbook API.

use async_trait::async_trait;
use reqwest::{header::HeaderValue, Client, ClientBuilder};

use crate::constants::default_headers;
use crate::error::{Error, Result};
use crate::models::ClientConfig;

/// Sends one URL-encoded form and returns the raw response body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_form(&self, form: &[(&str, &str)]) -> Result<Vec<u8>>;
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = default_headers();
        if let Ok(agent) = HeaderValue::from_str(&config.user_agent) {
            headers.insert(reqwest::header::USER_AGENT, agent);
        }

        let mut builder = ClientBuilder::new()
            .timeout(config.timeout())
            .default_headers(headers);

        if let Some(proxy) = &config.proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy).map_err(Error::Http)?);
        }

        let client = builder.build().map_err(Error::Http)?;

        Ok(Self {
            client,
            url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_form(&self, form: &[(&str, &str)]) -> Result<Vec<u8>> {
        let resp = self.client.post(&self.url).form(form).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(Error::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(bytes.to_vec())
    }
}
