//! PostgREST: caption persistence.

use async_trait::async_trait;
use pipeline::{Caption, CaptionError, CaptionStore};
use tracing::{debug, instrument};

use crate::client::check_status;
use crate::{SupabaseClient, SupabaseError};

/// Asks PostgREST to merge on primary-key conflict instead of failing, and to
/// skip echoing the row back.
const UPSERT_PREFER: &str = "resolution=merge-duplicates,return=minimal";

impl SupabaseClient {
    /// Inserts `caption` into the caption table, replacing any row with the
    /// same id.
    pub async fn upsert_caption(&self, caption: &Caption) -> Result<(), SupabaseError> {
        let url = self.endpoint(["rest", "v1", self.config().caption_table.as_str()])?;
        let response = self
            .post(url)
            .query(&[("on_conflict", "id")])
            .header("Prefer", UPSERT_PREFER)
            .json(caption)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl CaptionStore for SupabaseClient {
    #[instrument(skip(self, caption), fields(object_id = %caption.id, table = %self.config().caption_table))]
    async fn upsert(&self, caption: &Caption) -> Result<(), CaptionError> {
        self.upsert_caption(caption)
            .await
            .map_err(|e| CaptionError::StoreWriteFailed {
                object_id: caption.id.to_string(),
                message: e.to_string(),
            })?;
        debug!("Caption row written");
        Ok(())
    }
}
