use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::cluster::ClusterService;
use crate::consensus::{QuarryRaft, RAFT_APPEND_PATH, RAFT_SNAPSHOT_PATH, RAFT_VOTE_PATH};

use super::handlers::*;

/// Application state shared across all handlers
pub struct AppState {
    pub service: Arc<ClusterService>,
}

/// Client-facing HTTP API
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Indices
        .route("/create_index", post(create_index))
        .route("/indices", get(list_indices))
        // Documents and search
        .route("/:index/add_document", post(add_document))
        .route("/:index/search", post(search))
        .route("/:index/get_document", post(get_document))
        // Cluster management
        .route("/join", post(join))
        .route("/status", get(cluster_status))
        // Health and metrics
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Inter-node Raft RPC, served on the Raft address
pub fn raft_router(raft: QuarryRaft) -> Router {
    Router::new()
        .route(RAFT_APPEND_PATH, post(raft_append))
        .route(RAFT_VOTE_PATH, post(raft_vote))
        .route(RAFT_SNAPSHOT_PATH, post(raft_snapshot))
        .with_state(raft)
}
