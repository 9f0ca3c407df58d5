//! HTTP client for the published spreadsheet endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use tracing::{debug, instrument};
use url::Url;

use super::error::FetchError;
use super::tsv::{Row, parse_tsv};
use super::{SheetId, SheetSource};
use crate::user_agent;

/// Connect timeout for sheet requests.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Total timeout for a single sheet request.
const READ_TIMEOUT_SECS: u64 = 30;

/// Fetches published sheets as TSV and parses them into rows.
///
/// Redirects are followed manually and only one level deep: the publishing
/// endpoint answers with a single redirect to the content host.
#[derive(Debug, Clone)]
pub struct SheetClient {
    client: Client,
    base_url: String,
}

impl SheetClient {
    /// Creates a client for the published sheet at `base_url`.
    ///
    /// `base_url` is the TSV publishing URL without the `gid` parameter.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] when the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let base_url = base_url.into();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .redirect(Policy::none())
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|e| FetchError::from_send(base_url.clone(), e))?;
        Ok(Self { client, base_url })
    }

    /// Builds the full URL of one sheet tab.
    #[must_use]
    pub fn sheet_url(&self, sheet: SheetId) -> String {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{separator}gid={}", self.base_url, sheet.gid())
    }

    /// Fetches the body at `url`, following at most one redirect.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure, non-success status, or a
    /// redirect that cannot be followed. Nothing is retried.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
        let mut response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_send(url, e))?;

        if response.status().is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| FetchError::redirect(url, "missing Location header"))?;
            let target = parsed
                .join(location)
                .map_err(|_| FetchError::redirect(url, format!("invalid Location '{location}'")))?;
            debug!(location = %target, "following sheet redirect");

            response = self
                .client
                .get(target.clone())
                .send()
                .await
                .map_err(|e| FetchError::from_send(target.as_str(), e))?;
            if response.status().is_redirection() {
                return Err(FetchError::redirect(url, "more than one redirect"));
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        response.text().await.map_err(|e| FetchError::body(url, e))
    }
}

#[async_trait]
impl SheetSource for SheetClient {
    async fn fetch(&self, sheet: SheetId) -> Result<Vec<Row>, FetchError> {
        let url = self.sheet_url(sheet);
        let body = self.fetch_text(&url).await?;
        let rows = parse_tsv(&body);
        debug!(sheet = %sheet, rows = rows.len(), "sheet parsed");
        Ok(rows)
    }
}
