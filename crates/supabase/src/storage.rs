//! Supabase Storage: signed URL issuance.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{CaptionError, ObjectLocation, SignedUrl, SignedUrlProvider, Timestamp};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::client::check_status;
use crate::{SupabaseClient, SupabaseError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl SupabaseClient {
    /// Asks Storage to sign `location` for `expires_in`.
    ///
    /// Storage answers with a URL relative to `/storage/v1`; the returned URL
    /// is absolute.
    pub async fn sign_object(
        &self,
        location: &ObjectLocation,
        expires_in: Duration,
    ) -> Result<SignedUrl, SupabaseError> {
        let segments = ["storage", "v1", "object", "sign", location.bucket.as_str()]
            .into_iter()
            .chain(location.path.split('/').filter(|s| !s.is_empty()));
        let url = self.endpoint(segments)?;

        // Storage rejects a zero expiry.
        let request = SignRequest {
            expires_in: expires_in.as_secs().max(1),
        };
        let response = self.post(url).json(&request).send().await?;
        let body: SignResponse = check_status(response).await?.json().await?;

        let url = self.resolve_signed_url(&body.signed_url)?;
        let expires_at = Timestamp::now()
            .checked_add(Duration::from_secs(request.expires_in))
            .unwrap_or_else(Timestamp::now);

        Ok(SignedUrl {
            url: url.to_string(),
            expires_at,
        })
    }

    fn resolve_signed_url(&self, signed: &str) -> Result<Url, SupabaseError> {
        if signed.is_empty() {
            return Err(SupabaseError::InvalidSignedUrl("empty URL".to_string()));
        }
        if let Ok(absolute) = Url::parse(signed) {
            return Ok(absolute);
        }

        // The relative form already carries its percent-encoded path and token,
        // so it is appended verbatim rather than re-encoded segment by segment.
        let storage_root = self.endpoint(["storage", "v1"])?;
        let joined = format!(
            "{}/{}",
            storage_root.as_str().trim_end_matches('/'),
            signed.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| SupabaseError::InvalidSignedUrl(e.to_string()))
    }
}

#[async_trait]
impl SignedUrlProvider for SupabaseClient {
    #[instrument(skip(self), fields(object = %location))]
    async fn create_signed_url(
        &self,
        location: &ObjectLocation,
        expires_in: Duration,
    ) -> Result<SignedUrl, CaptionError> {
        let signed = self
            .sign_object(location, expires_in)
            .await
            .map_err(|e| CaptionError::SignedUrlUnavailable {
                object: location.to_string(),
                message: e.to_string(),
            })?;
        debug!(url = signed.redacted(), expires_at = %signed.expires_at, "Signed URL issued");
        Ok(signed)
    }
}
