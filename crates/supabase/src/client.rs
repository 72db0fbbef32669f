//! Shared HTTP plumbing for the Storage and PostgREST adapters.

use std::time::Duration;

use pipeline::{ApiKey, TableName};
use reqwest::{Client, RequestBuilder, Response, Url};

use crate::SupabaseError;

/// Connection settings for a Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://abcd.supabase.co`.
    pub base_url: Url,

    /// Service-role key; sent as both `apikey` and bearer token.
    pub service_key: ApiKey,

    /// Table captions are written to.
    pub caption_table: TableName,

    /// Per-request timeout for Storage and PostgREST calls.
    pub timeout: Duration,
}

/// Authenticated client for one Supabase project.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: Client,
    config: SupabaseConfig,
}

impl SupabaseClient {
    /// Builds a client with the configured timeout.
    ///
    /// # Errors
    ///
    /// [`SupabaseError::InvalidUrl`] if the base URL cannot be extended with
    /// path segments, [`SupabaseError::Http`] if the TLS backend fails to
    /// initialise.
    pub fn new(config: SupabaseConfig) -> Result<Self, SupabaseError> {
        if config.base_url.cannot_be_a_base() {
            return Err(SupabaseError::InvalidUrl(config.base_url.to_string()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("captioner/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    /// Returns the configuration this client was built with.
    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    /// Returns `base_url` with `segments` appended, each percent-encoded.
    pub(crate) fn endpoint<I>(&self, segments: I) -> Result<Url, SupabaseError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.config.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| SupabaseError::InvalidUrl(self.config.base_url.to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// Starts a POST request carrying the service-role credentials.
    pub(crate) fn post(&self, url: Url) -> RequestBuilder {
        self.http
            .post(url)
            .header("apikey", self.config.service_key.expose())
            .header(
                reqwest::header::AUTHORIZATION,
                self.config.service_key.bearer(),
            )
    }
}

/// Passes success responses through and turns anything else into
/// [`SupabaseError::Status`].
pub(crate) async fn check_status(response: Response) -> Result<Response, SupabaseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SupabaseError::from_status(status.as_u16(), &body))
}
