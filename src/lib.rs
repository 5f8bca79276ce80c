//! docgate - a thin REST gateway for a MongoDB-compatible document store
//!
//! Translates REST requests into driver calls: find, insert, update,
//! delete, count, index management, and atomic multi-operation
//! transactions.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod observability;
pub mod server;
pub mod store;
pub mod txn;
pub mod validate;
