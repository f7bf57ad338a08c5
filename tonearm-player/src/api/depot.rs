//! Depot protocol handlers
//!
//! Serves registered resources by identifier and accepts new registrations.
//! A malformed identifier is a 400 before any lookup happens (the `Uuid`
//! path extractor rejects it); an unknown identifier is a 404.

use crate::api::handlers::{error_response, StatusResponse};
use crate::api::server::AppContext;
use crate::error::Error;
use crate::resolver::ResolvedBody;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RegisterPathRequest {
    path: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    resource_id: Uuid,
}

/// GET /depot/:resource_id - Serve a registered resource's bytes
pub async fn fetch_resource(
    State(ctx): State<AppContext>,
    Path(resource_id): Path<Uuid>,
) -> Response {
    let resolved = match ctx.resolver.resolve(resource_id) {
        Ok(resolved) => resolved,
        Err(e) => {
            debug!("Depot fetch of {} refused: {}", resource_id, e);
            return error_response(&e).into_response();
        }
    };

    match resolved.body {
        ResolvedBody::File(path) => match tokio::fs::read(&path).await {
            Ok(bytes) => (
                [(header::CONTENT_TYPE, resolved.content_type)],
                bytes,
            )
                .into_response(),
            Err(e) => {
                error!("Depot read of {} failed: {}", path.display(), e);
                error_response(&Error::Fetch(format!(
                    "Failed to read resource {}",
                    resource_id
                )))
                .into_response()
            }
        },
        ResolvedBody::Bytes(bytes) => (
            [(header::CONTENT_TYPE, resolved.content_type)],
            bytes.as_ref().clone(),
        )
            .into_response(),
    }
}

/// POST /resources - Register a file path; returns the new identifier.
/// Registering the same path twice yields two distinct identifiers.
pub async fn register_path_resource(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterPathRequest>,
) -> (StatusCode, Json<RegisterResponse>) {
    let resource_id = ctx.store.register_path(PathBuf::from(req.path));
    (StatusCode::CREATED, Json(RegisterResponse { resource_id }))
}

/// POST /resources/blob - Register raw bytes under the request content type
pub async fn register_blob_resource(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<RegisterResponse>), (StatusCode, Json<StatusResponse>)> {
    if body.is_empty() {
        return Err(error_response(&Error::BadRequest(
            "Empty blob body".to_string(),
        )));
    }
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let resource_id = ctx.store.register_blob(body.to_vec(), mime);
    Ok((StatusCode::CREATED, Json(RegisterResponse { resource_id })))
}
