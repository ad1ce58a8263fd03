use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use openraft::raft::{AppendEntriesRequest, InstallSnapshotRequest, VoteRequest};
use std::sync::Arc;
use tracing::error;

use crate::api::types::*;
use crate::cluster::FORWARDED_HEADER;
use crate::consensus::{NodeId, QuarryRaft, TypeConfig};
use crate::error::QuarryError;
use crate::models::*;

use super::router::AppState;

/// Error wrapper for API handlers
pub struct ApiError(pub QuarryError);

impl From<QuarryError> for ApiError {
    fn from(e: QuarryError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            QuarryError::IndexNotFound(_)
            | QuarryError::DocumentNotFound { .. }
            | QuarryError::TermNotFound => StatusCode::NOT_FOUND,
            QuarryError::IndexAlreadyExists(_) | QuarryError::StaleDocumentId { .. } => {
                StatusCode::CONFLICT
            }
            QuarryError::EmptyDocument
            | QuarryError::InvalidDocument(_)
            | QuarryError::InvalidRequest(_)
            | QuarryError::Json(_) => StatusCode::BAD_REQUEST,
            QuarryError::NotLeader | QuarryError::NoLeaderDetected => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            QuarryError::ApplyTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            QuarryError::Forward(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.0.code(), "Request failed: {}", self.0);
        }
        let body = ErrorResponse::from(&self.0);
        (status, Json(body)).into_response()
    }
}

fn is_forwarded(headers: &HeaderMap) -> bool {
    headers.contains_key(FORWARDED_HEADER)
}

/// Create a new index
pub async fn create_index(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateIndexRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state
        .service
        .create_index(req, is_forwarded(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

pub async fn list_indices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.service.list_indices())
}

/// Add a document to an index
pub async fn add_document(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    headers: HeaderMap,
    Json(body): Json<DocumentBody>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state
        .service
        .add_document(&index, body, is_forwarded(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// Full-text search against one field of an index
pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    Ok(Json(state.service.search_full_text(&index, req).await?))
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    Json(req): Json<GetDocumentRequest>,
) -> Result<Json<GetDocumentResponse>, ApiError> {
    Ok(Json(state.service.get_document(&index, req.doc_id).await?))
}

/// Add the calling node to the cluster
pub async fn join(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, ApiError> {
    Ok(Json(state.service.join(req, is_forwarded(&headers)).await?))
}

/// Get cluster status
pub async fn cluster_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(state.service.status())
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
    })
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    state.service.refresh_gauges();
    let buffer = state
        .service
        .metrics()
        .encode()
        .map_err(|e| QuarryError::Internal(format!("failed to encode metrics: {}", e)))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        buffer,
    ))
}

pub async fn raft_append(
    State(raft): State<QuarryRaft>,
    Json(req): Json<AppendEntriesRequest<TypeConfig>>,
) -> impl IntoResponse {
    Json(raft.append_entries(req).await)
}

pub async fn raft_vote(
    State(raft): State<QuarryRaft>,
    Json(req): Json<VoteRequest<NodeId>>,
) -> impl IntoResponse {
    Json(raft.vote(req).await)
}

pub async fn raft_snapshot(
    State(raft): State<QuarryRaft>,
    Json(req): Json<InstallSnapshotRequest<TypeConfig>>,
) -> impl IntoResponse {
    Json(raft.install_snapshot(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let not_found = ApiError(QuarryError::IndexNotFound("books".into()));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let exists = ApiError(QuarryError::IndexAlreadyExists("books".into()));
        assert_eq!(exists.status(), StatusCode::CONFLICT);

        assert_eq!(
            ApiError(QuarryError::NoLeaderDetected).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError(QuarryError::ApplyTimeout(500)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError(QuarryError::EmptyDocument).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_relayed_error_keeps_leader_status() {
        let leader_errors = vec![
            QuarryError::StaleDocumentId { doc_id: 4, next: 5 },
            QuarryError::ApplyTimeout(5000),
            QuarryError::Json(serde_json::from_str::<serde_json::Value>("{").unwrap_err()),
            QuarryError::DocumentNotFound {
                index: "books".into(),
                doc_id: 9,
            },
            QuarryError::IndexAlreadyExists("books".into()),
            QuarryError::EmptyDocument,
        ];
        for err in leader_errors {
            let wire = ErrorResponse::from(&err);
            let relayed = QuarryError::from_wire(&wire.error, &wire.message, wire.details.as_ref());
            assert_eq!(
                ApiError(relayed).status(),
                ApiError(err).status(),
                "status changed for {}",
                wire.error
            );
        }
    }
}
