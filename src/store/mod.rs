//! # Store Abstraction
//!
//! The gateway never talks to the document database directly from its
//! handlers; everything goes through the [`Store`] trait. The process owns
//! one store handle for its lifetime and injects it into every request
//! handler. Transactions run on a [`StoreSession`], which is request-scoped
//! and exclusively owned by the batch that opened it.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use serde::Deserialize;
use thiserror::Error;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the external store.
///
/// Transaction aborts land here too: from the caller's side a rolled-back
/// batch is a single store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection / topology failure
    #[error("store connection failed: {0}")]
    Connection(String),

    /// A read or write rejected by the store
    #[error("store operation failed: {0}")]
    Operation(String),

    /// Transaction begin/commit/abort failure
    #[error("transaction failed: {0}")]
    Transaction(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Operation(err.to_string())
    }
}

/// Transaction-level tuning, parsed from the request's `transactionOptions`.
///
/// Read preference is deliberately absent: transactions always read from the
/// primary so that later operations in a batch observe earlier writes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransactionTuning {
    /// Read concern level: "local", "majority", "snapshot", ...
    pub read_concern: Option<String>,

    /// Write concern map, e.g. `{"w": "majority", "j": true}`
    pub write_concern: Option<serde_json::Value>,

    /// Commit-time bound in milliseconds
    #[serde(rename = "maxCommitTimeMS")]
    pub max_commit_time_ms: Option<u64>,
}

/// Process-wide handle to the document store.
///
/// Filters, updates, and option bags are opaque [`Document`] values — they
/// are store query language, not application data, and are passed through
/// unparsed beyond what the concrete backend needs for its option structs.
#[async_trait]
pub trait Store: Send + Sync {
    /// Find every document matching `filter`.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
    ) -> StoreResult<Vec<Document>>;

    /// Find at most one document matching `filter`.
    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
    ) -> StoreResult<Option<Document>>;

    /// Insert one document and read it back by its generated id, so the
    /// caller receives the durable representation rather than an echo.
    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<Document>;

    /// Insert many documents; returns them with generated ids attached,
    /// preserving input order.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> StoreResult<Vec<Document>>;

    /// Atomically update the first document matching `filter` and return the
    /// post-image, or `None` when nothing matched.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: Document,
    ) -> StoreResult<Option<Document>>;

    /// Update every document matching `filter`; returns the modified count.
    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: Document,
    ) -> StoreResult<u64>;

    /// Delete the first document matching `filter`; returns the count (0 or 1).
    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
    ) -> StoreResult<u64>;

    /// Delete every document matching `filter`; returns the count.
    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
    ) -> StoreResult<u64>;

    /// Count documents matching `filter`.
    async fn count(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
    ) -> StoreResult<u64>;

    /// List collection names in the database.
    async fn list_collections(&self) -> StoreResult<Vec<String>>;

    /// Create an index; returns its name. Creating the same index twice with
    /// identical keys and options succeeds and returns the same name.
    async fn create_index(
        &self,
        collection: &str,
        keys: Document,
        options: Document,
    ) -> StoreResult<String>;

    /// Drop an index by name.
    async fn drop_index(
        &self,
        collection: &str,
        index: &str,
        options: Document,
    ) -> StoreResult<bool>;

    /// Open one session-scoped transaction context for a whole batch.
    async fn begin_transaction(
        &self,
        tuning: TransactionTuning,
    ) -> StoreResult<Box<dyn StoreSession>>;
}

/// A session-scoped transaction context.
///
/// All operations issued through a session are atomic as a group: either the
/// session commits and every effect is durable, or it aborts and none are.
#[async_trait]
pub trait StoreSession: Send {
    /// Insert one document inside the transaction and read it back by its
    /// generated id, within the same transaction context.
    async fn insert_one(&mut self, collection: &str, document: Document) -> StoreResult<Document>;

    /// Atomic find-and-modify inside the transaction; returns the post-image.
    async fn find_one_and_update(
        &mut self,
        collection: &str,
        filter: Document,
        update: Document,
        options: Document,
    ) -> StoreResult<Option<Document>>;

    /// Delete the first matching document inside the transaction.
    async fn delete_one(&mut self, collection: &str, filter: Document) -> StoreResult<u64>;

    /// Commit the transaction, making every effect durable.
    async fn commit(&mut self) -> StoreResult<()>;

    /// Abort the transaction, discarding every effect.
    async fn abort(&mut self) -> StoreResult<()>;
}

/// Render a BSON document as relaxed extended JSON for response bodies.
pub fn document_to_json(doc: Document) -> serde_json::Value {
    Bson::Document(doc).into_relaxed_extjson()
}

/// Render a single BSON value as relaxed extended JSON.
pub fn bson_to_json(value: Bson) -> serde_json::Value {
    value.into_relaxed_extjson()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_document_to_json_renders_plain_numbers() {
        let json = document_to_json(doc! {"name": "A", "value": 15_i64});
        assert_eq!(json["name"], "A");
        assert_eq!(json["value"], 15);
    }

    #[test]
    fn test_transaction_tuning_parses_known_fields() {
        let tuning: TransactionTuning = serde_json::from_value(serde_json::json!({
            "readConcern": "majority",
            "writeConcern": {"w": "majority"},
            "maxCommitTimeMS": 5000u64,
        }))
        .unwrap();
        assert_eq!(tuning.read_concern.as_deref(), Some("majority"));
        assert!(tuning.write_concern.is_some());
        assert_eq!(tuning.max_commit_time_ms, Some(5000));
    }
}
