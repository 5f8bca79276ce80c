//! Atomic batch executor
//!
//! Runs a validated batch against the store inside one session-scoped
//! transaction: acquire the session, execute descriptors strictly in input
//! order, accumulate one result per descriptor, then commit. Any failure
//! aborts the session and surfaces as a single error — no partial result
//! list ever leaves this module.
//!
//! Single-attempt semantics: transient transaction conflicts are not
//! retried here; each batch gets one success or one failure.

use mongodb::bson::Bson;

use crate::observability::{Logger, Severity};
use crate::store::{bson_to_json, document_to_json, Store, StoreResult, StoreSession};

use super::batch::{Operation, OperationResult, TransactionBatch};

/// The outcome of a committed batch: one result per input descriptor, in
/// input order, plus the operation count for the caller's bookkeeping.
#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<OperationResult>,
    pub operation_count: usize,
}

/// Execute a validated batch atomically.
pub async fn execute_batch(store: &dyn Store, batch: TransactionBatch) -> StoreResult<BatchOutcome> {
    let operation_count = batch.operations.len();
    let mut session = store.begin_transaction(batch.tuning).await?;

    let mut results = Vec::with_capacity(operation_count);
    for operation in batch.operations {
        match execute_operation(session.as_mut(), operation).await {
            Ok(result) => results.push(result),
            Err(err) => {
                if let Err(abort_err) = session.abort().await {
                    // The store will reclaim the session; the client still
                    // sees the original failure.
                    Logger::log(
                        Severity::Warn,
                        "transaction_abort_failed",
                        &[("error", abort_err.to_string())],
                    );
                }
                return Err(err);
            }
        }
    }

    session.commit().await?;
    Ok(BatchOutcome {
        results,
        operation_count,
    })
}

async fn execute_operation(
    session: &mut dyn StoreSession,
    operation: Operation,
) -> StoreResult<OperationResult> {
    match operation {
        Operation::InsertOne {
            collection,
            document,
            options: _,
        } => {
            let stored = session.insert_one(&collection, document).await?;
            let inserted_id = stored.get("_id").cloned().unwrap_or(Bson::Null);
            Ok(OperationResult::InsertOne {
                collection,
                inserted_id: bson_to_json(inserted_id),
                document: document_to_json(stored),
            })
        }
        Operation::FindOneAndUpdate {
            collection,
            filter,
            update,
            options,
        } => {
            let post_image = session
                .find_one_and_update(&collection, filter, update, options)
                .await?;
            Ok(OperationResult::FindOneAndUpdate {
                collection,
                document: post_image
                    .map(document_to_json)
                    .unwrap_or(serde_json::Value::Null),
            })
        }
        Operation::DeleteOne {
            collection,
            filter,
            options: _,
        } => {
            let deleted_count = session.delete_one(&collection, filter).await?;
            Ok(OperationResult::DeleteOne {
                collection,
                deleted_count,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use mongodb::bson::{doc, Document};
    use serde_json::json;

    fn batch(body: serde_json::Value) -> TransactionBatch {
        TransactionBatch::from_request(&body).unwrap()
    }

    #[tokio::test]
    async fn test_committed_batch_returns_one_result_per_op() {
        let store = MemoryStore::new();
        let outcome = execute_batch(
            &store,
            batch(json!({
                "operations": [
                    {"type": "insertOne", "collection": "a", "document": {"n": 1}},
                    {"type": "insertOne", "collection": "b", "document": {"n": 2}},
                    {"type": "deleteOne", "collection": "a", "filter": {"n": 1}},
                ]
            })),
        )
        .await
        .unwrap();

        assert_eq!(outcome.operation_count, 3);
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.results[0].type_name(), "insertOne");
        assert_eq!(outcome.results[2].type_name(), "deleteOne");
        assert_eq!(outcome.results[2].collection(), "a");
    }

    #[tokio::test]
    async fn test_later_op_sees_earlier_write_in_same_batch() {
        let store = MemoryStore::new();
        let outcome = execute_batch(
            &store,
            batch(json!({
                "operations": [
                    {"type": "insertOne", "collection": "items",
                     "document": {"name": "X", "value": 10}},
                    {"type": "findOneAndUpdate", "collection": "items",
                     "filter": {"name": "X"}, "update": {"$inc": {"value": 5}}},
                ]
            })),
        )
        .await
        .unwrap();

        let OperationResult::FindOneAndUpdate { document, .. } = &outcome.results[1] else {
            panic!("wrong variant");
        };
        assert_eq!(document["value"], 15);
    }

    #[tokio::test]
    async fn test_failed_op_rolls_back_everything() {
        let store = MemoryStore::new();
        // The second op uses a filter operator the store rejects.
        let err = execute_batch(
            &store,
            batch(json!({
                "operations": [
                    {"type": "insertOne", "collection": "x", "document": {"name": "A"}},
                    {"type": "deleteOne", "collection": "y",
                     "filter": {"n": {"$nearSphere": [0, 0]}}},
                ]
            })),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("unsupported filter operator"));

        // The first insert must not be durable.
        let count = store
            .count("x", Document::new(), Document::new())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_delete_one_reports_zero_on_no_match() {
        let store = MemoryStore::new();
        let outcome = execute_batch(
            &store,
            batch(json!({
                "operations": [
                    {"type": "deleteOne", "collection": "empty", "filter": {"n": 1}},
                ]
            })),
        )
        .await
        .unwrap();
        let OperationResult::DeleteOne { deleted_count, .. } = &outcome.results[0] else {
            panic!("wrong variant");
        };
        assert_eq!(*deleted_count, 0);
    }

    #[tokio::test]
    async fn test_insert_result_carries_generated_id() {
        let store = MemoryStore::new();
        let outcome = execute_batch(
            &store,
            batch(json!({
                "operations": [
                    {"type": "insertOne", "collection": "a", "document": {"name": "A"}},
                ]
            })),
        )
        .await
        .unwrap();
        let OperationResult::InsertOne {
            inserted_id,
            document,
            ..
        } = &outcome.results[0]
        else {
            panic!("wrong variant");
        };
        assert!(!inserted_id.is_null());
        assert_eq!(document["name"], "A");

        // Durable after commit.
        let found = store
            .find("a", doc! {"name": "A"}, Document::new())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
