use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use captioner::CaptionPipeline;
use pipeline::{
    Caption, CaptionError, CaptionOutcome, CaptionStore, CaptioningConfig, DeliveryId, EventType,
    ImageData, InferenceClient, ModelId, ObjectFetcher, ObjectLocation, SignedUrl,
    SignedUrlProvider, SkipReason, StorageEventHandler, Timestamp,
};

// ---------------------------------------------------------------------------
// In-memory collaborators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Call {
    SignUrl {
        location: String,
        expires_in: Duration,
    },
    Fetch(String),
    Infer {
        model: String,
        len: usize,
    },
    Upsert(String),
}

/// Plays every external collaborator at once and records what was asked of it.
struct World {
    image: Vec<u8>,
    generated_text: String,
    url_error: Option<CaptionError>,
    fetch_error: Option<CaptionError>,
    inference_error: Option<CaptionError>,
    store_error: Option<CaptionError>,
    calls: Mutex<Vec<Call>>,
    rows: Mutex<HashMap<String, String>>,
}

impl Default for World {
    fn default() -> Self {
        Self {
            image: b"\x89PNG fake image bytes".to_vec(),
            generated_text: "a cat sitting on a windowsill".to_string(),
            url_error: None,
            fetch_error: None,
            inference_error: None,
            store_error: None,
            calls: Mutex::new(Vec::new()),
            rows: Mutex::new(HashMap::new()),
        }
    }
}

impl World {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn rows(&self) -> HashMap<String, String> {
        self.rows.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SignedUrlProvider for World {
    async fn create_signed_url(
        &self,
        location: &ObjectLocation,
        expires_in: Duration,
    ) -> Result<SignedUrl, CaptionError> {
        self.record(Call::SignUrl {
            location: location.to_string(),
            expires_in,
        });
        if let Some(e) = &self.url_error {
            return Err(e.clone());
        }
        Ok(SignedUrl {
            url: format!("https://storage.test/object/sign/{location}?token=t"),
            expires_at: Timestamp::now(),
        })
    }
}

#[async_trait]
impl ObjectFetcher for World {
    async fn fetch(&self, url: &SignedUrl) -> Result<ImageData, CaptionError> {
        self.record(Call::Fetch(url.url.clone()));
        if let Some(e) = &self.fetch_error {
            return Err(e.clone());
        }
        Ok(ImageData {
            bytes: self.image.clone(),
            content_type: Some("image/png".to_string()),
        })
    }
}

#[async_trait]
impl InferenceClient for World {
    async fn image_to_text(
        &self,
        image: &ImageData,
        model: &ModelId,
    ) -> Result<String, CaptionError> {
        self.record(Call::Infer {
            model: model.to_string(),
            len: image.len(),
        });
        if let Some(e) = &self.inference_error {
            return Err(e.clone());
        }
        Ok(self.generated_text.clone())
    }
}

#[async_trait]
impl CaptionStore for World {
    async fn upsert(&self, caption: &Caption) -> Result<(), CaptionError> {
        self.record(Call::Upsert(caption.id.to_string()));
        if let Some(e) = &self.store_error {
            return Err(e.clone());
        }
        self.rows
            .lock()
            .unwrap()
            .insert(caption.id.to_string(), caption.caption.clone());
        Ok(())
    }
}

fn pipeline_over(world: &Arc<World>, config: CaptioningConfig) -> CaptionPipeline {
    CaptionPipeline::new(
        world.clone(),
        world.clone(),
        world.clone(),
        world.clone(),
        config,
    )
}

const CAT_INSERT: &[u8] = br#"{
    "type": "INSERT",
    "table": "objects",
    "schema": "storage",
    "record": {"id": "abc", "bucket_id": "images", "path_tokens": ["u1", "cat.png"]},
    "old_record": null
}"#;

async fn deliver(pipeline: &CaptionPipeline, body: &[u8]) -> Result<CaptionOutcome, CaptionError> {
    pipeline.handle_payload(DeliveryId::new_random(), body).await
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn insert_event_produces_exactly_one_caption_row() {
    let world = Arc::new(World::default());
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    let outcome = deliver(&pipeline, CAT_INSERT).await.unwrap();

    let CaptionOutcome::Stored(caption) = outcome else {
        panic!("expected a stored caption");
    };
    assert_eq!(caption.id.as_str(), "abc");
    assert_eq!(caption.caption, "a cat sitting on a windowsill");

    let rows = world.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows["abc"], "a cat sitting on a windowsill");
}

#[tokio::test]
async fn steps_run_in_order_with_the_configured_inputs() {
    let world = Arc::new(World::default());
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    deliver(&pipeline, CAT_INSERT).await.unwrap();

    assert_eq!(
        world.calls(),
        vec![
            Call::SignUrl {
                location: "images/u1/cat.png".to_string(),
                expires_in: Duration::from_secs(60),
            },
            Call::Fetch("https://storage.test/object/sign/images/u1/cat.png?token=t".to_string()),
            Call::Infer {
                model: "nlpconnect/vit-gpt2-image-captioning".to_string(),
                len: world.image.len(),
            },
            Call::Upsert("abc".to_string()),
        ]
    );
}

#[tokio::test]
async fn event_without_table_or_schema_is_captioned() {
    let world = Arc::new(World::default());
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    let body = br#"{"type":"INSERT","record":{"id":"abc","bucket_id":"images","path_tokens":["u1","cat.png"]}}"#;
    let outcome = deliver(&pipeline, body).await.unwrap();

    assert!(matches!(outcome, CaptionOutcome::Stored(_)));
    assert_eq!(world.rows()["abc"], "a cat sitting on a windowsill");
}

#[tokio::test]
async fn configured_model_and_expiry_are_used() {
    let world = Arc::new(World::default());
    let config = CaptioningConfig {
        model: ModelId::new("Salesforce/blip-image-captioning-base").unwrap(),
        signed_url_expiry: Duration::from_secs(300),
        ..CaptioningConfig::default()
    };
    let pipeline = pipeline_over(&world, config);

    deliver(&pipeline, CAT_INSERT).await.unwrap();

    let calls = world.calls();
    assert!(matches!(
        &calls[0],
        Call::SignUrl { expires_in, .. } if *expires_in == Duration::from_secs(300)
    ));
    assert!(matches!(
        &calls[2],
        Call::Infer { model, .. } if model == "Salesforce/blip-image-captioning-base"
    ));
}

#[tokio::test]
async fn generated_text_is_trimmed() {
    let world = Arc::new(World {
        generated_text: "  a dog on a skateboard \n".to_string(),
        ..World::default()
    });
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    deliver(&pipeline, CAT_INSERT).await.unwrap();

    assert_eq!(world.rows()["abc"], "a dog on a skateboard");
}

#[tokio::test]
async fn redelivery_overwrites_the_existing_caption() {
    let world = Arc::new(World::default());
    let pipeline = pipeline_over(&world, CaptioningConfig::default());
    deliver(&pipeline, CAT_INSERT).await.unwrap();
    deliver(&pipeline, CAT_INSERT).await.unwrap();

    assert_eq!(world.rows().len(), 1);
    assert_eq!(
        world
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Upsert(_)))
            .count(),
        2
    );
}

// ---------------------------------------------------------------------------
// Failures abort without downstream side effects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn signed_url_failure_stops_before_inference_and_store() {
    let world = Arc::new(World {
        url_error: Some(CaptionError::SignedUrlUnavailable {
            object: "images/u1/cat.png".to_string(),
            message: "Object not found".to_string(),
        }),
        ..World::default()
    });
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    let err = deliver(&pipeline, CAT_INSERT).await.unwrap_err();

    assert_eq!(err.kind(), "signed_url_unavailable");
    assert_eq!(world.calls().len(), 1);
    assert!(world.rows().is_empty());
}

#[tokio::test]
async fn fetch_failure_stops_before_inference() {
    let world = Arc::new(World {
        fetch_error: Some(CaptionError::FetchFailed {
            status: Some(403),
            message: "expired".to_string(),
        }),
        ..World::default()
    });
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    let err = deliver(&pipeline, CAT_INSERT).await.unwrap_err();

    assert!(matches!(err, CaptionError::FetchFailed { status: Some(403), .. }));
    assert!(!world.calls().iter().any(|c| matches!(c, Call::Infer { .. })));
    assert!(world.rows().is_empty());
}

#[tokio::test]
async fn empty_object_body_is_a_fetch_failure() {
    let world = Arc::new(World {
        image: Vec::new(),
        ..World::default()
    });
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    let err = deliver(&pipeline, CAT_INSERT).await.unwrap_err();

    assert_eq!(err.kind(), "fetch_failed");
    assert_eq!(world.calls().len(), 2);
}

#[tokio::test]
async fn inference_failure_leaves_the_store_untouched() {
    let world = Arc::new(World {
        inference_error: Some(CaptionError::InferenceFailed {
            model: "nlpconnect/vit-gpt2-image-captioning".to_string(),
            message: "Model is currently loading".to_string(),
        }),
        ..World::default()
    });
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    let err = deliver(&pipeline, CAT_INSERT).await.unwrap_err();

    assert_eq!(err.kind(), "inference_failed");
    assert!(!world.calls().iter().any(|c| matches!(c, Call::Upsert(_))));
    assert!(world.rows().is_empty());
}

#[tokio::test]
async fn blank_generated_text_is_an_inference_failure() {
    let world = Arc::new(World {
        generated_text: "   ".to_string(),
        ..World::default()
    });
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    let err = deliver(&pipeline, CAT_INSERT).await.unwrap_err();

    assert_eq!(err.kind(), "inference_failed");
    assert!(world.rows().is_empty());
}

#[tokio::test]
async fn store_failure_is_propagated() {
    let world = Arc::new(World {
        store_error: Some(CaptionError::StoreWriteFailed {
            object_id: "abc".to_string(),
            message: "connection refused".to_string(),
        }),
        ..World::default()
    });
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    let err = deliver(&pipeline, CAT_INSERT).await.unwrap_err();

    assert_eq!(err.kind(), "store_write_failed");
    assert_eq!(world.calls().len(), 4);
}

#[tokio::test]
async fn record_without_location_fails_before_any_call() {
    let world = Arc::new(World::default());
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    let body = br#"{"type":"INSERT","table":"objects","record":{"id":"abc","bucket_id":null,"path_tokens":null}}"#;
    let err = deliver(&pipeline, body).await.unwrap_err();

    assert!(matches!(
        err,
        CaptionError::SignedUrlUnavailable { ref object, .. } if object == "abc"
    ));
    assert!(world.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Payload validation and filtering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_json_fails_before_any_external_call() {
    let world = Arc::new(World::default());
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    let err = deliver(&pipeline, b"{\"type\": \"INSERT\", \"record\":").await.unwrap_err();

    assert!(matches!(err, CaptionError::MalformedPayload { .. }));
    assert!(world.calls().is_empty());
}

#[tokio::test]
async fn update_and_delete_events_are_acknowledged_without_calls() {
    let world = Arc::new(World::default());
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    for (kind, expected) in [("UPDATE", EventType::Update), ("DELETE", EventType::Delete)] {
        let body = format!(
            r#"{{"type":"{kind}","table":"objects","record":{{"id":"abc","bucket_id":"images","path_tokens":["u1","cat.png"]}}}}"#
        );
        let outcome = deliver(&pipeline, body.as_bytes()).await.unwrap();
        assert_eq!(outcome, CaptionOutcome::Skipped(SkipReason::NotAnInsert(expected)));
    }

    assert!(world.calls().is_empty());
}

#[tokio::test]
async fn delete_with_null_record_is_acknowledged_without_calls() {
    let world = Arc::new(World::default());
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    let body = br#"{
        "type": "DELETE",
        "table": "objects",
        "schema": "storage",
        "record": null,
        "old_record": {"id": "abc", "bucket_id": "images", "name": "u1/cat.png", "path_tokens": ["u1", "cat.png"]}
    }"#;
    let outcome = deliver(&pipeline, body).await.unwrap();

    assert_eq!(outcome, CaptionOutcome::Skipped(SkipReason::NotAnInsert(EventType::Delete)));
    assert!(world.calls().is_empty());
    assert!(world.rows().is_empty());
}

#[tokio::test]
async fn insert_without_a_record_is_malformed() {
    let world = Arc::new(World::default());
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    for body in [
        &br#"{"type":"INSERT","table":"objects","record":null}"#[..],
        &br#"{"type":"INSERT","table":"objects"}"#[..],
    ] {
        let err = deliver(&pipeline, body).await.unwrap_err();
        assert!(matches!(err, CaptionError::MalformedPayload { .. }), "{err:?}");
    }
    assert!(world.calls().is_empty());
}

#[tokio::test]
async fn inserts_on_other_tables_are_skipped() {
    let world = Arc::new(World::default());
    let pipeline = pipeline_over(&world, CaptioningConfig::default());

    let body = br#"{"type":"INSERT","table":"buckets","record":{"id":"abc","bucket_id":"images","path_tokens":["x"]}}"#;
    let outcome = deliver(&pipeline, body).await.unwrap();

    assert!(matches!(
        outcome,
        CaptionOutcome::Skipped(SkipReason::UnexpectedTable { ref actual, .. }) if actual == "buckets"
    ));
    assert!(world.calls().is_empty());
}
