//! Shared value types for the captioning domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. a storage object resolves to a
//! location only when both bucket and path are known) and participate in
//! domain computations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BucketId, CaptionError, ObjectId, TableName};

// ---------------------------------------------------------------------------
// Inbound event
// ---------------------------------------------------------------------------

/// The kind of row mutation a database webhook reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    /// A row was inserted (a new object was uploaded).
    Insert,
    /// An existing row was modified.
    Update,
    /// A row was removed.
    Delete,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// A row of the storage service's object table, as carried in a webhook.
///
/// Only the columns the pipeline needs are modelled; everything else in the
/// record is ignored on deserialisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageObject {
    /// Object identifier; becomes the caption's primary key.
    pub id: ObjectId,

    /// Bucket holding the object. Required to build a signed URL.
    #[serde(default)]
    pub bucket_id: Option<BucketId>,

    /// Object key split on `/`. Required to build a signed URL unless
    /// [`StorageObject::name`] is present.
    #[serde(default)]
    pub path_tokens: Option<Vec<String>>,

    /// Full object key as stored by the storage service.
    #[serde(default)]
    pub name: Option<String>,
}

impl StorageObject {
    /// Returns the object's key within its bucket.
    ///
    /// `path_tokens` joined with `/` takes precedence; `name` is used only
    /// when no tokens are present. Returns `None` when neither yields a
    /// non-empty path.
    pub fn object_path(&self) -> Option<String> {
        let from_tokens = self
            .path_tokens
            .as_ref()
            .filter(|tokens| !tokens.is_empty())
            .map(|tokens| tokens.join("/"));

        from_tokens
            .or_else(|| self.name.clone())
            .filter(|path| !path.is_empty())
    }

    /// Returns the bucket + path pair needed to address the object, or `None`
    /// if either half is missing.
    pub fn location(&self) -> Option<ObjectLocation> {
        let bucket = self.bucket_id.clone()?;
        let path = self.object_path()?;
        Some(ObjectLocation { bucket, path })
    }
}

/// Where an object lives in storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    /// Bucket holding the object.
    pub bucket: BucketId,
    /// Object key within the bucket (`/`-separated).
    pub path: String,
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.path)
    }
}

/// A database webhook payload describing one mutation of the object table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEvent {
    /// The mutation kind.
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Table the mutation happened on. Absent in hand-crafted payloads.
    #[serde(default)]
    pub table: Option<String>,

    /// Schema the table belongs to.
    #[serde(default)]
    pub schema: Option<String>,

    /// The row after the mutation (`null` for deletes).
    #[serde(default)]
    pub record: Option<StorageObject>,

    /// The row before the mutation (`null` for inserts).
    #[serde(default)]
    pub old_record: Option<StorageObject>,
}

impl StorageEvent {
    /// Decodes a webhook body.
    ///
    /// Only JSON decoding is performed; semantic checks (event type, table)
    /// are the caller's business.
    pub fn from_json(body: &[u8]) -> Result<Self, CaptionError> {
        serde_json::from_slice(body).map_err(|e| CaptionError::MalformedPayload {
            message: e.to_string(),
        })
    }

    /// Returns the inserted row.
    ///
    /// # Errors
    ///
    /// [`CaptionError::MalformedPayload`] if the event carries no `record`.
    pub fn inserted_object(&self) -> Result<&StorageObject, CaptionError> {
        self.record.as_ref().ok_or_else(|| CaptionError::MalformedPayload {
            message: format!("{} event has no record", self.event_type),
        })
    }

    /// Id of the affected row, taken from `record` or else `old_record`.
    pub fn object_id(&self) -> Option<&ObjectId> {
        self.record
            .as_ref()
            .or(self.old_record.as_ref())
            .map(|object| &object.id)
    }
}

// ---------------------------------------------------------------------------
// Pipeline intermediate values
// ---------------------------------------------------------------------------

/// A short-lived, pre-authenticated URL to an object's bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedUrl {
    /// Absolute URL including the access token.
    pub url: String,
    /// When the provider stops honouring the URL.
    pub expires_at: Timestamp,
}

impl SignedUrl {
    /// Returns the URL with its query string (which carries the token) removed,
    /// suitable for logging.
    pub fn redacted(&self) -> &str {
        self.url.split('?').next().unwrap_or_default()
    }
}

impl std::fmt::Debug for SignedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedUrl")
            .field("url", &self.redacted())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Raw object bytes downloaded through a [`SignedUrl`].
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    /// The object body.
    pub bytes: Vec<u8>,
    /// `Content-Type` reported by the storage service, if any.
    pub content_type: Option<String>,
}

impl ImageData {
    /// Number of bytes in the body.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the body is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// A persisted caption row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caption {
    /// The captioned object's id (primary key).
    pub id: ObjectId,
    /// Generated description text.
    pub caption: String,
}

// ---------------------------------------------------------------------------
// Pipeline progress and outcome
// ---------------------------------------------------------------------------

/// The linear states a delivery moves through.
///
/// Any failure leaves the sequence immediately; see
/// [`CaptionError::failed_stage`] for which state was not reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// The event was decoded and accepted by the filter.
    Received,
    /// A signed URL for the object was issued.
    UrlResolved,
    /// The object bytes were downloaded.
    BytesFetched,
    /// The inference model produced a caption.
    CaptionGenerated,
    /// The caption row was written.
    Stored,
    /// The delivery was acknowledged.
    Done,
}

impl PipelineStage {
    /// Returns the stage that follows this one, or `None` for [`Self::Done`].
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::UrlResolved),
            Self::UrlResolved => Some(Self::BytesFetched),
            Self::BytesFetched => Some(Self::CaptionGenerated),
            Self::CaptionGenerated => Some(Self::Stored),
            Self::Stored => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Stable snake_case name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::UrlResolved => "url_resolved",
            Self::BytesFetched => "bytes_fetched",
            Self::CaptionGenerated => "caption_generated",
            Self::Stored => "stored",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an accepted-but-irrelevant event produced no caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Only inserts trigger captioning.
    NotAnInsert(EventType),
    /// The event came from a table other than the configured one.
    UnexpectedTable {
        /// Table named in the event.
        actual: String,
        /// Table the pipeline is configured for.
        expected: TableName,
    },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnInsert(event_type) => write!(f, "{event_type} events are not captioned"),
            Self::UnexpectedTable { actual, expected } => {
                write!(f, "event table '{actual}' is not '{expected}'")
            }
        }
    }
}

/// Successful result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionOutcome {
    /// The pipeline ran to completion and this caption was written.
    Stored(Caption),
    /// The event was filtered out; no external call was made.
    Skipped(SkipReason),
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Returns this timestamp shifted forward by `duration`, or `None` on
    /// overflow.
    pub fn checked_add(self, duration: std::time::Duration) -> Option<Self> {
        let delta = chrono::Duration::from_std(duration).ok()?;
        self.0.checked_add_signed(delta).map(Self)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(tokens: Option<Vec<&str>>, name: Option<&str>) -> StorageObject {
        StorageObject {
            id: ObjectId::new("abc").unwrap(),
            bucket_id: BucketId::new("images"),
            path_tokens: tokens.map(|t| t.into_iter().map(String::from).collect()),
            name: name.map(String::from),
        }
    }

    #[test]
    fn path_tokens_are_joined_with_slashes() {
        let obj = object(Some(vec!["u1", "cat.png"]), Some("ignored.png"));
        assert_eq!(obj.object_path().as_deref(), Some("u1/cat.png"));
    }

    #[test]
    fn name_is_used_when_tokens_are_missing() {
        assert_eq!(
            object(None, Some("u1/dog.png")).object_path().as_deref(),
            Some("u1/dog.png")
        );
        assert_eq!(
            object(Some(vec![]), Some("u1/dog.png")).object_path().as_deref(),
            Some("u1/dog.png")
        );
    }

    #[test]
    fn location_requires_bucket_and_path() {
        assert!(object(None, None).location().is_none());

        let mut no_bucket = object(Some(vec!["a.png"]), None);
        no_bucket.bucket_id = None;
        assert!(no_bucket.location().is_none());

        let loc = object(Some(vec!["u1", "cat.png"]), None).location().unwrap();
        assert_eq!(loc.to_string(), "images/u1/cat.png");
    }

    #[test]
    fn decodes_a_database_webhook_payload() {
        let body = br#"{
            "type": "INSERT",
            "table": "objects",
            "schema": "storage",
            "record": {
                "id": "abc",
                "bucket_id": "images",
                "name": "u1/cat.png",
                "path_tokens": ["u1", "cat.png"],
                "owner": null,
                "metadata": {"size": 1024}
            },
            "old_record": null
        }"#;

        let event = StorageEvent::from_json(body).unwrap();
        assert_eq!(event.event_type, EventType::Insert);
        assert_eq!(event.table.as_deref(), Some("objects"));
        assert_eq!(event.inserted_object().unwrap().id.as_str(), "abc");
        assert!(event.old_record.is_none());
    }

    #[test]
    fn table_schema_and_old_record_are_optional() {
        let body = br#"{"type":"INSERT","record":{"id":"abc","bucket_id":"images","path_tokens":["u1","cat.png"]}}"#;
        let event = StorageEvent::from_json(body).unwrap();
        assert!(event.table.is_none());
        assert!(event.schema.is_none());
    }

    #[test]
    fn delete_events_carry_the_row_in_old_record() {
        let body = br#"{"type":"DELETE","table":"objects","schema":"storage","record":null,"old_record":{"id":"abc","bucket_id":"images","name":"u1/cat.png"}}"#;
        let event = StorageEvent::from_json(body).unwrap();
        assert_eq!(event.event_type, EventType::Delete);
        assert!(event.record.is_none());
        assert_eq!(event.object_id().map(ObjectId::as_str), Some("abc"));
        assert!(matches!(
            event.inserted_object(),
            Err(CaptionError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn malformed_json_is_a_malformed_payload() {
        let err = StorageEvent::from_json(b"{not json").unwrap_err();
        assert!(matches!(err, CaptionError::MalformedPayload { .. }));

        let err = StorageEvent::from_json(br#"{"type":"UPSERT","record":{"id":"a"}}"#).unwrap_err();
        assert!(matches!(err, CaptionError::MalformedPayload { .. }));

        let err = StorageEvent::from_json(br#"{"type":"INSERT","record":{"id":""}}"#).unwrap_err();
        assert!(matches!(err, CaptionError::MalformedPayload { .. }));
    }

    #[test]
    fn stages_advance_linearly_to_done() {
        let mut stage = PipelineStage::Received;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            seen.push(next);
            stage = next;
        }
        assert_eq!(
            seen,
            vec![
                PipelineStage::Received,
                PipelineStage::UrlResolved,
                PipelineStage::BytesFetched,
                PipelineStage::CaptionGenerated,
                PipelineStage::Stored,
                PipelineStage::Done,
            ]
        );
    }

    #[test]
    fn signed_url_debug_hides_the_token() {
        let url = SignedUrl {
            url: "https://x.supabase.co/storage/v1/object/sign/images/a.png?token=secret".into(),
            expires_at: Timestamp::now(),
        };
        let debug = format!("{url:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("/object/sign/images/a.png"));
    }

    #[test]
    fn timestamp_checked_add_moves_forward() {
        let now = Timestamp::now();
        let later = now.checked_add(std::time::Duration::from_secs(60)).unwrap();
        assert_eq!((later.as_datetime() - now.as_datetime()).num_seconds(), 60);
    }
}
