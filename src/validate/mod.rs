//! # Request Validation
//!
//! Field-level checks over parsed JSON bodies, applied before any store
//! access. A field is "present" when it exists and is truthy in the sense
//! the upstream clients expect: `null`, `false`, `0`, and `""` all count as
//! missing. Empty objects and arrays pass — the store enforces deeper shape
//! constraints on its own query language.
//!
//! Validation performs no I/O and always names the offending field(s).

use mongodb::bson::{Bson, Document};
use serde_json::Value;
use thiserror::Error;

/// A client-caused validation failure. The message is the full
/// client-visible detail; callers surface it verbatim with status 400.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result type for validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Is this JSON value truthy?
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Require the body to be a JSON object with every named field present and
/// truthy. Reports all missing fields at once.
pub fn require_fields(body: &Value, fields: &[&str]) -> ValidationResult<()> {
    let Some(obj) = body.as_object() else {
        return Err(ValidationError::new("Request body must be a JSON object"));
    };

    let missing: Vec<&str> = fields
        .iter()
        .filter(|field| !is_truthy(obj.get(**field)))
        .copied()
        .collect();

    match missing.len() {
        0 => Ok(()),
        1 => Err(ValidationError::new(format!(
            "Missing required field: {}",
            missing[0]
        ))),
        _ => Err(ValidationError::new(format!(
            "Missing required fields: {}",
            missing.join(", ")
        ))),
    }
}

/// Require `field` to be a non-empty string.
pub fn required_string(body: &Value, field: &str) -> ValidationResult<String> {
    match body.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Null) | None => Err(ValidationError::new(format!(
            "Missing required field: {}",
            field
        ))),
        Some(_) => Err(ValidationError::new(format!(
            "Field '{}' must be a string",
            field
        ))),
    }
}

/// Require `field` to be a JSON object and convert it to a BSON document.
/// Extended-JSON values (`$oid`, `$date`, ...) are interpreted.
pub fn required_document(body: &Value, field: &str) -> ValidationResult<Document> {
    match body.get(field) {
        Some(value @ Value::Object(_)) => to_document(field, value),
        Some(Value::Null) | None => Err(ValidationError::new(format!(
            "Missing required field: {}",
            field
        ))),
        Some(_) => Err(ValidationError::new(format!(
            "Field '{}' must be an object",
            field
        ))),
    }
}

/// Read `field` as a BSON document, defaulting to an empty document when
/// the field is absent or null. Never returns a partially-defaulted value.
pub fn optional_document(body: &Value, field: &str) -> ValidationResult<Document> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(Document::new()),
        Some(value @ Value::Object(_)) => to_document(field, value),
        Some(_) => Err(ValidationError::new(format!(
            "Field '{}' must be an object",
            field
        ))),
    }
}

/// Convert a JSON object into a BSON document.
pub fn to_document(field: &str, value: &Value) -> ValidationResult<Document> {
    match Bson::try_from(value.clone()) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(_) => Err(ValidationError::new(format!(
            "Field '{}' must be an object",
            field
        ))),
        Err(e) => Err(ValidationError::new(format!(
            "Field '{}' is not a valid document: {}",
            field, e
        ))),
    }
}

/// Require `field` to be a non-empty array of objects; converts each entry.
pub fn required_document_array(body: &Value, field: &str) -> ValidationResult<Vec<Document>> {
    let entries = match body.get(field) {
        Some(Value::Array(entries)) => entries,
        Some(Value::Null) | None => {
            return Err(ValidationError::new(format!(
                "Missing required field: {}",
                field
            )))
        }
        Some(_) => {
            return Err(ValidationError::new(format!(
                "Field '{}' must be an array",
                field
            )))
        }
    };

    if entries.is_empty() {
        return Err(ValidationError::new(format!(
            "Field '{}' must be a non-empty array",
            field
        )));
    }

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| to_document(&format!("{}[{}]", field, i), entry))
        .collect()
}
