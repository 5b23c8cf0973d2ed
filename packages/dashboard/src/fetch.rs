//! Data fetching from the dashboard backend.
//!
//! Every request is a single GET: no retries and no timeout override.
//! Callers classify the result into data, an empty result, or a failure
//! and render each differently; a failure never propagates past the
//! surface that issued it.

use crash_stats_dashboard_models::FilterSet;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Maximum length of the response body preview included in errors.
const BODY_PREVIEW_LEN: usize = 200;

/// Errors from fetching or decoding a backend response.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        /// Requested endpoint path.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// The body was not valid JSON.
    #[error("{endpoint} returned invalid JSON: {source} (body: {preview})")]
    Json {
        /// Requested endpoint path.
        endpoint: String,
        /// Underlying parse error.
        source: serde_json::Error,
        /// Start of the offending body.
        preview: String,
    },

    /// The JSON did not have the expected shape.
    #[error("Unexpected response shape from {endpoint}: {message}")]
    Shape {
        /// Requested endpoint path.
        endpoint: String,
        /// Description of the mismatch.
        message: String,
    },
}

/// A JSON-over-HTTP data source.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// Issues one GET to `endpoint` with `filters` as query parameters and
    /// returns the parsed JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure, a non-success status,
    /// or a body that is not JSON.
    async fn fetch_json(
        &self,
        endpoint: &str,
        filters: &FilterSet,
    ) -> Result<serde_json::Value, FetchError>;
}

#[async_trait::async_trait]
impl<T: DataSource + ?Sized> DataSource for std::sync::Arc<T> {
    async fn fetch_json(
        &self,
        endpoint: &str,
        filters: &FilterSet,
    ) -> Result<serde_json::Value, FetchError> {
        (**self).fetch_json(endpoint, filters).await
    }
}

/// [`DataSource`] backed by `reqwest`.
pub struct HttpDataSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDataSource {
    /// Creates a data source for the backend at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a data source using an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Returns the absolute URL for `endpoint`.
    #[must_use]
    pub fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl DataSource for HttpDataSource {
    async fn fetch_json(
        &self,
        endpoint: &str,
        filters: &FilterSet,
    ) -> Result<serde_json::Value, FetchError> {
        let url = self.url(endpoint);
        log::debug!("GET {url} {:?}", filters.to_query());

        let response = self
            .client
            .get(&url)
            .query(&filters.to_query())
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        parse_body(endpoint, status, &body)
    }
}

/// Classifies a raw response: non-2xx statuses and non-JSON bodies are
/// errors.
///
/// # Errors
///
/// Returns [`FetchError::Status`] or [`FetchError::Json`].
pub fn parse_body(endpoint: &str, status: u16, body: &str) -> Result<serde_json::Value, FetchError> {
    if !(200..300).contains(&status) {
        return Err(FetchError::Status {
            endpoint: endpoint.to_string(),
            status,
        });
    }

    serde_json::from_str(body).map_err(|source| FetchError::Json {
        endpoint: endpoint.to_string(),
        source,
        preview: body.chars().take(BODY_PREVIEW_LEN).collect(),
    })
}

/// Fetches `endpoint` and decodes the body into `T`.
///
/// # Errors
///
/// Returns [`FetchError`] if the request fails or the JSON does not match
/// `T`.
pub async fn fetch_typed<T: DeserializeOwned>(
    source: &dyn DataSource,
    endpoint: &str,
    filters: &FilterSet,
) -> Result<T, FetchError> {
    let value = source.fetch_json(endpoint, filters).await?;
    serde_json::from_value(value).map_err(|e| FetchError::Shape {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

/// Outcome of a list fetch.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    /// At least one row.
    Data(Vec<T>),
    /// A valid, zero-length result.
    Empty,
    /// The request failed. Already logged.
    Failed(FetchError),
}

/// Fetches a JSON array from `endpoint` and classifies the result.
///
/// Failures are logged here, at the call site, and returned as
/// [`FetchOutcome::Failed`] rather than propagated.
pub async fn fetch_list<T: DeserializeOwned>(
    source: &dyn DataSource,
    endpoint: &str,
    filters: &FilterSet,
) -> FetchOutcome<T> {
    match fetch_typed::<Vec<T>>(source, endpoint, filters).await {
        Ok(rows) if rows.is_empty() => FetchOutcome::Empty,
        Ok(rows) => FetchOutcome::Data(rows),
        Err(e) => {
            log::error!("Failed to load {endpoint}: {e}");
            FetchOutcome::Failed(e)
        }
    }
}
