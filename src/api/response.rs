//! # Response Envelopes
//!
//! Success body shapes for the gateway endpoints.

use serde::Serialize;

use crate::txn::OperationResult;

/// `{data}` envelope for single values (documents, name lists, ...)
#[derive(Debug, Clone, Serialize)]
pub struct SingleResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> SingleResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// `{data, count}` envelope for document lists
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub data: Vec<T>,
    pub count: usize,
}

impl<T: Serialize> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        let count = data.len();
        Self { data, count }
    }
}

/// `{data, modifiedCount}` envelope for update-many
#[derive(Debug, Clone, Serialize)]
pub struct ModifiedResponse<T: Serialize> {
    pub data: Vec<T>,
    #[serde(rename = "modifiedCount")]
    pub modified_count: u64,
}

/// `{deletedCount}` envelope for deletes
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    #[serde(rename = "deletedCount")]
    pub deleted_count: u64,
}

/// `{count}` envelope
#[derive(Debug, Clone, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

/// `{data: {indexName}}` envelope for create-index
#[derive(Debug, Clone, Serialize)]
pub struct IndexName {
    #[serde(rename = "indexName")]
    pub index_name: String,
}

/// `{data: {acknowledged}}` envelope for drop-index
#[derive(Debug, Clone, Serialize)]
pub struct Acknowledged {
    pub acknowledged: bool,
}

/// Root endpoint payload
#[derive(Debug, Clone, Serialize)]
pub struct RootInfo {
    pub message: String,
    pub version: String,
}

/// `{data, operationCount}` envelope for committed batches
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub data: Vec<OperationResult>,
    #[serde(rename = "operationCount")]
    pub operation_count: usize,
}
