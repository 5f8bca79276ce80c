//! # REST API
//!
//! Route table and handlers for the gateway surface: single-operation
//! endpoints under `/v0/*` plus the transactional batch endpoint.

pub mod errors;
pub mod handlers;
pub mod response;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::store::Store;

/// Shared state injected into every handler: the process-wide store handle.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
}

/// Build the route table.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/v0/find", post(handlers::find))
        .route("/v0/find-one", post(handlers::find_one))
        .route("/v0/insert-one", post(handlers::insert_one))
        .route("/v0/insert-many", post(handlers::insert_many))
        .route("/v0/update-one", post(handlers::update_one))
        .route("/v0/update-many", post(handlers::update_many))
        .route("/v0/delete-one", post(handlers::delete_one))
        .route("/v0/delete-many", post(handlers::delete_many))
        .route("/v0/count", post(handlers::count))
        .route("/v0/collections", get(handlers::collections))
        .route("/v0/create-index", post(handlers::create_index))
        .route("/v0/drop-index", post(handlers::drop_index))
        .route("/v0/transaction", post(handlers::transaction))
        .with_state(state)
}
