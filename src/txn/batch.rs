//! Batch data model and per-operation validation
//!
//! An operation descriptor is a closed tagged union: the tag fully
//! determines its required fields. The batch is validated in full before
//! the executor is invoked — a malformed third operation must stop the
//! first one from ever reaching the store — and every failing descriptor
//! is reported, comma-joined, in one error.

use mongodb::bson::Document;
use serde::Serialize;
use serde_json::Value;

use crate::store::TransactionTuning;
use crate::validate::{is_truthy, to_document, ValidationError, ValidationResult};

/// One unit of work inside a transaction batch.
///
/// `document`, `filter`, and `update` stay opaque BSON documents: they are
/// store query language, not application data.
#[derive(Debug, Clone)]
pub enum Operation {
    InsertOne {
        collection: String,
        document: Document,
        options: Document,
    },
    FindOneAndUpdate {
        collection: String,
        filter: Document,
        update: Document,
        options: Document,
    },
    DeleteOne {
        collection: String,
        filter: Document,
        options: Document,
    },
}

impl Operation {
    pub fn type_name(&self) -> &'static str {
        match self {
            Operation::InsertOne { .. } => "insertOne",
            Operation::FindOneAndUpdate { .. } => "findOneAndUpdate",
            Operation::DeleteOne { .. } => "deleteOne",
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            Operation::InsertOne { collection, .. }
            | Operation::FindOneAndUpdate { collection, .. }
            | Operation::DeleteOne { collection, .. } => collection,
        }
    }
}

/// The validated, ordered, non-empty batch submitted to the transaction
/// endpoint. Request-scoped; consumed exactly once by the executor.
#[derive(Debug, Clone)]
pub struct TransactionBatch {
    pub operations: Vec<Operation>,
    pub tuning: TransactionTuning,
}

impl TransactionBatch {
    /// Parse and validate a raw request body into a batch.
    ///
    /// Fail-fast contract: every descriptor is checked here, before any
    /// store access, and all failures are reported together.
    pub fn from_request(body: &Value) -> ValidationResult<Self> {
        let Some(obj) = body.as_object() else {
            return Err(ValidationError::new("Request body must be a JSON object"));
        };

        let entries = match obj.get("operations") {
            Some(Value::Array(entries)) => entries,
            Some(Value::Null) | None => {
                return Err(ValidationError::new("Missing required field: operations"))
            }
            Some(_) => return Err(ValidationError::new("Field 'operations' must be an array")),
        };

        if entries.is_empty() {
            return Err(ValidationError::new("At least one operation is required"));
        }

        let tuning = match obj.get("transactionOptions") {
            None | Some(Value::Null) => TransactionTuning::default(),
            Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())
                .map_err(|e| ValidationError::new(format!("Invalid transactionOptions: {}", e)))?,
            Some(_) => {
                return Err(ValidationError::new(
                    "Field 'transactionOptions' must be an object",
                ))
            }
        };

        let mut operations = Vec::with_capacity(entries.len());
        let mut failures = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            match parse_operation(entry) {
                Ok(op) => operations.push(op),
                Err(ValidationError(reason)) => {
                    failures.push(format!("operations[{}]: {}", i, reason))
                }
            }
        }

        if !failures.is_empty() {
            return Err(ValidationError::new(failures.join(", ")));
        }

        Ok(Self { operations, tuning })
    }
}

fn parse_operation(entry: &Value) -> ValidationResult<Operation> {
    let Some(obj) = entry.as_object() else {
        return Err(ValidationError::new("must be an object"));
    };

    let op_type = match obj.get("type") {
        Some(Value::String(s)) if !s.is_empty() => s.as_str(),
        _ => return Err(ValidationError::new("missing required field 'type'")),
    };

    let collection = match obj.get("collection") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => {
            return Err(ValidationError::new(format!(
                "missing required field 'collection' for type '{}'",
                op_type
            )))
        }
    };

    let options = match obj.get("options") {
        None | Some(Value::Null) => Document::new(),
        Some(value @ Value::Object(_)) => to_document("options", value)?,
        Some(_) => return Err(ValidationError::new("field 'options' must be an object")),
    };

    let field = |name: &str| -> ValidationResult<Document> {
        let value = obj.get(name);
        if !is_truthy(value) {
            return Err(ValidationError::new(format!(
                "missing required field '{}' for type '{}'",
                name, op_type
            )));
        }
        match value {
            Some(v @ Value::Object(_)) => to_document(name, v),
            _ => Err(ValidationError::new(format!(
                "field '{}' must be an object",
                name
            ))),
        }
    };

    match op_type {
        "insertOne" => Ok(Operation::InsertOne {
            document: field("document")?,
            collection,
            options,
        }),
        "findOneAndUpdate" => Ok(Operation::FindOneAndUpdate {
            filter: field("filter")?,
            update: field("update")?,
            collection,
            options,
        }),
        "deleteOne" => Ok(Operation::DeleteOne {
            filter: field("filter")?,
            collection,
            options,
        }),
        other => Err(ValidationError::new(format!(
            "unknown operation type '{}'",
            other
        ))),
    }
}

/// One output record per input descriptor, in input order.
///
/// The tag and collection echo the descriptor; the payload is
/// type-specific. `findOneAndUpdate` carries the post-image (`null` when
/// the filter matched nothing); `deleteOne` carries only the count.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OperationResult {
    #[serde(rename_all = "camelCase")]
    InsertOne {
        collection: String,
        inserted_id: Value,
        document: Value,
    },
    #[serde(rename_all = "camelCase")]
    FindOneAndUpdate { collection: String, document: Value },
    #[serde(rename_all = "camelCase")]
    DeleteOne { collection: String, deleted_count: u64 },
}

impl OperationResult {
    pub fn type_name(&self) -> &'static str {
        match self {
            OperationResult::InsertOne { .. } => "insertOne",
            OperationResult::FindOneAndUpdate { .. } => "findOneAndUpdate",
            OperationResult::DeleteOne { .. } => "deleteOne",
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            OperationResult::InsertOne { collection, .. }
            | OperationResult::FindOneAndUpdate { collection, .. }
            | OperationResult::DeleteOne { collection, .. } => collection,
        }
    }
}
