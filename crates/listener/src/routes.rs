//! warp filters for the webhook and health endpoints.

use std::convert::Infallible;
use std::sync::Arc;

use pipeline::{ApiKey, CaptionError, CaptionOutcome, DeliveryId, StorageEventHandler};
use serde::Serialize;
use tracing::{debug, info};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::{self, Response};
use warp::{Filter, Rejection, Reply};

use crate::ListenerConfig;

/// Acknowledgement body for every handled delivery.
const OK_BODY: &str = "ok";

/// Error payload. Carries the error kind only; details stay in the logs.
#[derive(Debug, Serialize)]
struct ApiError {
    error: &'static str,
}

/// The request's bearer token did not match the configured webhook token.
#[derive(Debug)]
pub struct Unauthorized;

impl warp::reject::Reject for Unauthorized {}

/// All routes, with rejections turned into JSON error replies.
pub fn routes(
    handler: Arc<dyn StorageEventHandler>,
    config: &ListenerConfig,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone + Send + Sync + 'static {
    webhook_route(handler, config.webhook_token.clone(), config.body_limit)
        .or(health_route())
        .recover(handle_rejection)
        .with(warp::trace::request())
}

/// POST /
pub fn webhook_route(
    handler: Arc<dyn StorageEventHandler>,
    token: Option<ApiKey>,
    body_limit: u64,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path::end()
        .and(warp::post())
        .and(authorized(token))
        .and(warp::body::content_length_limit(body_limit))
        .and(warp::body::bytes())
        .and_then(move |body: Bytes| {
            let handler = handler.clone();
            async move { Ok::<_, Rejection>(handle_delivery(handler.as_ref(), &body).await) }
        })
}

/// GET /healthz
pub fn health_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("healthz")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| OK_BODY)
}

/// Passes when no token is configured or the `Authorization` header carries it.
fn authorized(token: Option<ApiKey>) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and_then(move |header: Option<String>| {
            let expected = token.as_ref().map(ApiKey::bearer);
            async move {
                match expected {
                    None => Ok(()),
                    Some(expected) if header.as_deref() == Some(expected.as_str()) => Ok(()),
                    Some(_) => Err(warp::reject::custom(Unauthorized)),
                }
            }
        })
        .untuple_one()
}

async fn handle_delivery(handler: &dyn StorageEventHandler, body: &[u8]) -> Response {
    let delivery = DeliveryId::new_random();
    match handler.handle_payload(delivery, body).await {
        Ok(CaptionOutcome::Stored(caption)) => {
            debug!(delivery_id = %delivery, object_id = %caption.id, "Delivery acknowledged");
            reply::with_status(OK_BODY, StatusCode::OK).into_response()
        }
        Ok(CaptionOutcome::Skipped(reason)) => {
            debug!(delivery_id = %delivery, reason = %reason, "Delivery acknowledged without captioning");
            reply::with_status(OK_BODY, StatusCode::OK).into_response()
        }
        Err(e) => {
            info!(delivery_id = %delivery, kind = e.kind(), "Delivery failed");
            error_reply(&e)
        }
    }
}

/// Maps a pipeline error to its HTTP reply.
///
/// Payload problems are the caller's and get `400`; every collaborator
/// failure is an opaque `500`.
pub fn error_reply(error: &CaptionError) -> Response {
    let status = if error.is_caller_fault() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    json_error(error.kind(), status)
}

fn json_error(kind: &'static str, status: StatusCode) -> Response {
    reply::with_status(reply::json(&ApiError { error: kind }), status).into_response()
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (kind, status) = if err.find::<Unauthorized>().is_some() {
        ("unauthorized", StatusCode::UNAUTHORIZED)
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        ("payload_too_large", StatusCode::PAYLOAD_TOO_LARGE)
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        ("length_required", StatusCode::LENGTH_REQUIRED)
    } else if err.is_not_found() {
        ("not_found", StatusCode::NOT_FOUND)
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ("method_not_allowed", StatusCode::METHOD_NOT_ALLOWED)
    } else {
        debug!(rejection = ?err, "Unhandled rejection");
        ("bad_request", StatusCode::BAD_REQUEST)
    };
    Ok(json_error(kind, status))
}
