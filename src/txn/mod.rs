//! # Transaction Batches
//!
//! Data model and atomic executor for the multi-operation transactional
//! endpoint: a validated, ordered, non-empty sequence of heterogeneous
//! operations runs inside one session-scoped transaction, producing one
//! result per operation or rolling the whole batch back.

pub mod batch;
pub mod executor;

pub use batch::{Operation, OperationResult, TransactionBatch};
pub use executor::{execute_batch, BatchOutcome};
