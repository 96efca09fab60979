//! Handlers for the document routes.

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use futures::TryStreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::filters::TransactionId;
use super::AppState;
use crate::codec::{CodecError, DEFAULT_CONTENT_TYPE};
use crate::gateway::{self, GatewayError, HashCheck, Payload};
use crate::models::Resource;

const ORIGIN_SYSTEM_HEADER: &str = "origin-system-id";
const NATIVE_HASH_HEADER: &str = "x-native-hash";

#[derive(Serialize)]
struct Message {
    message: String,
}

fn message(status: StatusCode, msg: impl Into<String>) -> Response {
    (
        status,
        Json(Message {
            message: msg.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            GatewayError::Unavailable(_) => message(
                StatusCode::SERVICE_UNAVAILABLE,
                "Failed to connect to the database!",
            ),
            GatewayError::InvalidAccess { .. }
            | GatewayError::PatchRequiresJson
            | GatewayError::Codec(CodecError::UnsupportedContentType(_))
            | GatewayError::Codec(CodecError::Decode(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            GatewayError::Codec(CodecError::ContentMismatch { .. }) | GatewayError::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
}

/// Renders a stored resource in its own content type.
fn content_response(tid: &TransactionId, resource: &Resource) -> Response {
    let body = match gateway::encode(resource) {
        Ok(body) => body,
        Err(CodecError::UnsupportedContentType(ct)) => {
            tracing::warn!(%tid, uuid = %resource.id, content_type = %ct, "Unable to handle stored content type");
            return (
                StatusCode::NOT_IMPLEMENTED,
                format!("Unable to handle resource of type {}", ct),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(%tid, uuid = %resource.id, error = %e, "Unable to extract native content");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!(
                    "Unable to extract native content from resource with id {}. {}",
                    resource.id, e
                ),
            )
                .into_response();
        }
    };

    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&resource.content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Some(origin) = resource
        .origin_system_id
        .as_deref()
        .and_then(|o| HeaderValue::from_str(o).ok())
    {
        headers.insert(ORIGIN_SYSTEM_HEADER, origin);
    }
    response
}

fn log_failure(tid: &TransactionId, collection: &str, id: &str, err: &GatewayError, msg: &str) {
    match err {
        GatewayError::Store(_) | GatewayError::Unavailable(_) => {
            tracing::error!(%tid, uuid = id, collection, error = %err, "{}", msg)
        }
        _ => tracing::warn!(%tid, uuid = id, collection, error = %err, "{}", msg),
    }
}

/// GET /{collection}/{resource}
pub(super) async fn read_content(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Extension(tid): Extension<TransactionId>,
) -> Response {
    match state.gateway.read(&collection, &id).await {
        Ok(Some(resource)) => {
            let response = content_response(&tid, &resource);
            if response.status().is_success() {
                tracing::info!(%tid, uuid = %id, collection = %collection, "Read native content successfully");
            }
            response
        }
        Ok(None) => {
            let msg = format!(
                "Resource not found. collection: {}, id: {}",
                collection, id
            );
            tracing::info!(%tid, uuid = %id, collection = %collection, "{}", msg);
            message(StatusCode::NOT_FOUND, msg)
        }
        Err(e) => {
            log_failure(&tid, &collection, &id, &e, "Reading native content failed");
            e.into_response()
        }
    }
}

/// PUT /{collection}/{resource}
///
/// With an `X-Native-Hash` header the write only happens through the hash
/// check: a match answers 200 without writing, anything else 409.
pub(super) async fn write_content(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Extension(tid): Extension<TransactionId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(hash) = header_str(&headers, NATIVE_HASH_HEADER) {
        return match state.gateway.check_native_hash(&collection, &id, hash).await {
            Ok(HashCheck::Matches) => message(
                StatusCode::OK,
                "Hash matches existing content, no need to overwrite existing native data.",
            ),
            Ok(HashCheck::Mismatch) => {
                tracing::warn!(%tid, uuid = %id, collection = %collection, "Native hash does not match the stored content");
                (
                    StatusCode::CONFLICT,
                    "The native hash provided with this request does not match the native content in the store.",
                )
                    .into_response()
            }
            Err(e) => {
                log_failure(&tid, &collection, &id, &e, "Checking the native hash failed");
                e.into_response()
            }
        };
    }

    let content_type = header_str(&headers, header::CONTENT_TYPE.as_str());
    if content_type.is_none() {
        tracing::info!(
            %tid,
            uuid = %id,
            "Content-Type header missing. Default value ('{}') is used.",
            DEFAULT_CONTENT_TYPE
        );
    }

    let payload = Payload {
        content_type,
        origin_system_id: header_str(&headers, ORIGIN_SYSTEM_HEADER),
        body: &body,
    };

    match state.gateway.write(&collection, &id, payload).await {
        Ok(resource) => {
            tracing::info!(
                %tid,
                uuid = %id,
                collection = %collection,
                event = "SaveToNative",
                content_type = %resource.content_type,
                origin_system_id = resource.origin_system_id.as_deref().unwrap_or(""),
                "Successfully saved"
            );
            StatusCode::OK.into_response()
        }
        Err(e) => {
            log_failure(&tid, &collection, &id, &e, "Writing native content failed");
            e.into_response()
        }
    }
}

/// PATCH /{collection}/{resource}
pub(super) async fn patch_content(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Extension(tid): Extension<TransactionId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload = Payload {
        content_type: header_str(&headers, header::CONTENT_TYPE.as_str()),
        origin_system_id: header_str(&headers, ORIGIN_SYSTEM_HEADER),
        body: &body,
    };

    match state.gateway.patch(&collection, &id, payload).await {
        Ok(Some(resource)) => {
            tracing::info!(
                %tid,
                uuid = %id,
                collection = %collection,
                event = "UpdatedToNative",
                "Successfully updated"
            );
            content_response(&tid, &resource)
        }
        Ok(None) => {
            let msg = format!(
                "Could not update resource, not found. collection: {}, id: {}",
                collection, id
            );
            tracing::info!(%tid, uuid = %id, "{}", msg);
            message(StatusCode::NOT_FOUND, msg)
        }
        Err(e) => {
            log_failure(&tid, &collection, &id, &e, "Patching native content failed");
            e.into_response()
        }
    }
}

/// DELETE /{collection}/{resource}
pub(super) async fn delete_content(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Extension(tid): Extension<TransactionId>,
) -> Response {
    match state.gateway.delete(&collection, &id).await {
        Ok(()) => {
            tracing::info!(
                %tid,
                uuid = %id,
                collection = %collection,
                event = "NativeDelete",
                "Successfully deleted"
            );
            StatusCode::OK.into_response()
        }
        Err(e) => {
            log_failure(&tid, &collection, &id, &e, "Deleting native content failed");
            e.into_response()
        }
    }
}

#[derive(Serialize)]
struct IdLine<'a> {
    id: &'a str,
}

/// GET /{collection}/__ids
///
/// Streams one `{"id":"..."}` line per document. The stream is cut off when
/// the configured deadline passes.
pub(super) async fn read_ids(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Extension(tid): Extension<TransactionId>,
) -> Response {
    let token = CancellationToken::new();

    let ids = match state.gateway.ids(&collection, token.clone()).await {
        Ok(ids) => ids,
        Err(e @ GatewayError::InvalidAccess { .. }) => {
            tracing::warn!(%tid, collection = %collection, error = %e, "Invalid collection");
            return e.into_response();
        }
        Err(e) => {
            tracing::error!(%tid, collection = %collection, error = %e, "Failed to read ids");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Failed to read IDs for {}! \"{}\"", collection, e),
            )
                .into_response();
        }
    };

    let timeout = state.ids_timeout;
    let stream_token = ids.cancellation_token();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => token.cancel(),
            _ = stream_token.cancelled() => {}
        }
    });

    let lines = ids
        .map_ok(|id| {
            let mut line = serde_json::to_string(&IdLine { id: &id }).unwrap_or_default();
            line.push('\n');
            line
        })
        .inspect_err(move |e| {
            tracing::error!(%tid, collection = %collection, error = %e, "Reading ids failed mid-stream")
        });

    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response()
}
