//! Endpoint handlers
//!
//! Each handler is the same thin pipeline: validate the body, call the
//! store, shape the response envelope. Validation happens in full before
//! the first store access.

use axum::extract::{FromRequest, Request, State};
use axum::Json;
use mongodb::bson::{doc, Bson, Document};
use serde_json::Value;

use crate::store::document_to_json;
use crate::txn::{execute_batch, TransactionBatch};
use crate::validate::{self, ValidationError};

use super::errors::{ApiError, ApiResult};
use super::response::{
    Acknowledged, CountResponse, DeleteResponse, IndexName, ListResponse, ModifiedResponse,
    RootInfo, SingleResponse, TransactionResponse,
};
use super::AppState;

/// JSON request body that rejects with the `{error}` envelope instead of
/// axum's plain-text rejection.
pub struct JsonBody(pub Value);

#[axum::async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<Value>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::Validation(ValidationError::new(format!(
                "Invalid JSON body: {}",
                rejection.body_text()
            )))),
        }
    }
}

/// GET /
pub async fn root() -> Json<SingleResponse<RootInfo>> {
    Json(SingleResponse::new(RootInfo {
        message: "docgate is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// POST /v0/find
pub async fn find(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<ListResponse<Value>>> {
    let collection = validate::required_string(&body, "collection")?;
    let filter = validate::optional_document(&body, "filter")?;
    let options = validate::optional_document(&body, "options")?;

    let docs = state.store.find(&collection, filter, options).await?;
    Ok(Json(ListResponse::new(
        docs.into_iter().map(document_to_json).collect(),
    )))
}

/// POST /v0/find-one
pub async fn find_one(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<SingleResponse<Option<Value>>>> {
    let collection = validate::required_string(&body, "collection")?;
    let filter = validate::optional_document(&body, "filter")?;
    let options = validate::optional_document(&body, "options")?;

    let doc = state.store.find_one(&collection, filter, options).await?;
    Ok(Json(SingleResponse::new(doc.map(document_to_json))))
}

/// POST /v0/insert-one
pub async fn insert_one(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<SingleResponse<Value>>> {
    validate::require_fields(&body, &["collection", "document"])?;
    let collection = validate::required_string(&body, "collection")?;
    let document = validate::required_document(&body, "document")?;

    let stored = state.store.insert_one(&collection, document).await?;
    Ok(Json(SingleResponse::new(document_to_json(stored))))
}

/// POST /v0/insert-many
pub async fn insert_many(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<ListResponse<Value>>> {
    validate::require_fields(&body, &["collection", "documents"])?;
    let collection = validate::required_string(&body, "collection")?;
    let documents = validate::required_document_array(&body, "documents")?;

    let stored = state.store.insert_many(&collection, documents).await?;
    Ok(Json(ListResponse::new(
        stored.into_iter().map(document_to_json).collect(),
    )))
}

/// POST /v0/update-one
pub async fn update_one(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<SingleResponse<Option<Value>>>> {
    validate::require_fields(&body, &["collection", "filter", "update"])?;
    let collection = validate::required_string(&body, "collection")?;
    let filter = validate::required_document(&body, "filter")?;
    let update = validate::required_document(&body, "update")?;
    let options = validate::optional_document(&body, "options")?;

    let post_image = state
        .store
        .find_one_and_update(&collection, filter, update, options)
        .await?;
    Ok(Json(SingleResponse::new(post_image.map(document_to_json))))
}

/// POST /v0/update-many
///
/// Known limitation: the matching set is read before the update to know
/// which ids to re-fetch afterwards. This is not transactional — under
/// concurrent writers the returned documents may not exactly match the set
/// that was modified.
pub async fn update_many(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<ModifiedResponse<Value>>> {
    validate::require_fields(&body, &["collection", "filter", "update"])?;
    let collection = validate::required_string(&body, "collection")?;
    let filter = validate::required_document(&body, "filter")?;
    let update = validate::required_document(&body, "update")?;
    let options = validate::optional_document(&body, "options")?;

    let matched = state
        .store
        .find(
            &collection,
            filter.clone(),
            doc! {"projection": {"_id": 1}},
        )
        .await?;
    let ids: Vec<Bson> = matched.iter().filter_map(|d| d.get("_id").cloned()).collect();

    let modified_count = state
        .store
        .update_many(&collection, filter, update, options)
        .await?;

    let data = if ids.is_empty() {
        Vec::new()
    } else {
        state
            .store
            .find(&collection, doc! {"_id": {"$in": ids}}, Document::new())
            .await?
    };

    Ok(Json(ModifiedResponse {
        data: data.into_iter().map(document_to_json).collect(),
        modified_count,
    }))
}

/// POST /v0/delete-one
pub async fn delete_one(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<DeleteResponse>> {
    validate::require_fields(&body, &["collection", "filter"])?;
    let collection = validate::required_string(&body, "collection")?;
    let filter = validate::required_document(&body, "filter")?;
    let options = validate::optional_document(&body, "options")?;

    let deleted_count = state.store.delete_one(&collection, filter, options).await?;
    Ok(Json(DeleteResponse { deleted_count }))
}

/// POST /v0/delete-many
pub async fn delete_many(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<DeleteResponse>> {
    validate::require_fields(&body, &["collection", "filter"])?;
    let collection = validate::required_string(&body, "collection")?;
    let filter = validate::required_document(&body, "filter")?;
    let options = validate::optional_document(&body, "options")?;

    let deleted_count = state
        .store
        .delete_many(&collection, filter, options)
        .await?;
    Ok(Json(DeleteResponse { deleted_count }))
}

/// POST /v0/count
pub async fn count(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<CountResponse>> {
    let collection = validate::required_string(&body, "collection")?;
    let filter = validate::optional_document(&body, "filter")?;
    let options = validate::optional_document(&body, "options")?;

    let count = state.store.count(&collection, filter, options).await?;
    Ok(Json(CountResponse { count }))
}

/// GET /v0/collections
pub async fn collections(
    State(state): State<AppState>,
) -> ApiResult<Json<SingleResponse<Vec<String>>>> {
    let names = state.store.list_collections().await?;
    Ok(Json(SingleResponse::new(names)))
}

/// POST /v0/create-index
pub async fn create_index(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<SingleResponse<IndexName>>> {
    validate::require_fields(&body, &["collection", "keys"])?;
    let collection = validate::required_string(&body, "collection")?;
    let keys = validate::required_document(&body, "keys")?;
    if keys.is_empty() {
        return Err(
            validate::ValidationError::new("Field 'keys' must be a non-empty object").into(),
        );
    }
    let options = validate::optional_document(&body, "options")?;

    let index_name = state.store.create_index(&collection, keys, options).await?;
    Ok(Json(SingleResponse::new(IndexName { index_name })))
}

/// POST /v0/drop-index
pub async fn drop_index(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<SingleResponse<Acknowledged>>> {
    validate::require_fields(&body, &["collection", "index"])?;
    let collection = validate::required_string(&body, "collection")?;
    let index = validate::required_string(&body, "index")?;
    let options = validate::optional_document(&body, "options")?;

    let acknowledged = state.store.drop_index(&collection, &index, options).await?;
    Ok(Json(SingleResponse::new(Acknowledged { acknowledged })))
}

/// POST /v0/transaction
///
/// The whole body is validated before the store is touched; a batch with
/// any malformed descriptor never begins executing.
pub async fn transaction(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<TransactionResponse>> {
    let batch = TransactionBatch::from_request(&body)?;
    let outcome = execute_batch(state.store.as_ref(), batch).await?;
    Ok(Json(TransactionResponse {
        data: outcome.results,
        operation_count: outcome.operation_count,
    }))
}
