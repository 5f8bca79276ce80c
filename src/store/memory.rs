//! In-memory store
//!
//! A [`Store`] implementation backed by process memory, used by the test
//! suites so the validator, handlers, and orchestrator can be exercised
//! without a running database. Transactions take a snapshot of the whole
//! keyspace on begin and swap it back in on commit; abort drops the working
//! copy.
//!
//! Filter support covers equality plus `$eq`/`$ne`/`$in`/`$exists` and the
//! numeric comparisons; updates cover `$set`/`$inc`/`$unset`. Anything else
//! is rejected as a store operation error, which the transaction tests use
//! as their failure injection point.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};

use super::{Store, StoreError, StoreResult, StoreSession, TransactionTuning};

type Collections = HashMap<String, Vec<Document>>;

#[derive(Debug, Clone)]
struct IndexSpec {
    name: String,
    keys: Document,
    options: Document,
}

/// In-memory document store for testing
#[derive(Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
    indexes: Arc<RwLock<HashMap<String, Vec<IndexSpec>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|_| StoreError::Operation("lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|_| StoreError::Operation("lock poisoned".to_string()))
    }
}

/// Derive a MongoDB-style index name from its key spec, e.g. `name_1_age_-1`.
fn index_name(keys: &Document) -> String {
    keys.iter()
        .map(|(field, direction)| {
            let dir = match direction {
                Bson::Int32(v) => v.to_string(),
                Bson::Int64(v) => v.to_string(),
                Bson::Double(v) => (*v as i64).to_string(),
                Bson::String(s) => s.clone(),
                _ => "1".to_string(),
            };
            format!("{}_{}", field, dir)
        })
        .collect::<Vec<_>>()
        .join("_")
}

fn numeric(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn is_operator_doc(doc: &Document) -> bool {
    doc.keys().any(|k| k.starts_with('$'))
}

/// Match one document against a filter.
fn matches(doc: &Document, filter: &Document) -> StoreResult<bool> {
    for (field, condition) in filter {
        let actual = doc.get(field);
        match condition {
            Bson::Document(ops) if is_operator_doc(ops) => {
                for (op, operand) in ops {
                    if !matches_operator(actual, op, operand)? {
                        return Ok(false);
                    }
                }
            }
            expected => {
                if actual != Some(expected) {
                    return Ok(false);
                }
            }
        }
    }
    Ok(true)
}

fn matches_operator(actual: Option<&Bson>, op: &str, operand: &Bson) -> StoreResult<bool> {
    let result = match op {
        "$eq" => actual == Some(operand),
        "$ne" => actual != Some(operand),
        "$in" => match operand {
            Bson::Array(candidates) => actual.is_some_and(|a| candidates.contains(a)),
            _ => {
                return Err(StoreError::Operation(
                    "$in requires an array operand".to_string(),
                ))
            }
        },
        "$exists" => {
            let want = matches!(operand, Bson::Boolean(true));
            actual.is_some() == want
        }
        "$gt" | "$gte" | "$lt" | "$lte" => {
            let (Some(a), Some(b)) = (actual.and_then(numeric), numeric(operand)) else {
                return Ok(false);
            };
            match op {
                "$gt" => a > b,
                "$gte" => a >= b,
                "$lt" => a < b,
                _ => a <= b,
            }
        }
        other => {
            return Err(StoreError::Operation(format!(
                "unsupported filter operator: {}",
                other
            )))
        }
    };
    Ok(result)
}

/// Apply an update spec to a document in place.
fn apply_update(doc: &mut Document, update: &Document) -> StoreResult<()> {
    for (op, spec) in update {
        let spec = spec.as_document().ok_or_else(|| {
            StoreError::Operation(format!("update operator {} requires a document", op))
        })?;
        match op.as_str() {
            "$set" => {
                for (field, value) in spec {
                    doc.insert(field, value.clone());
                }
            }
            "$unset" => {
                for (field, _) in spec {
                    doc.remove(field);
                }
            }
            "$inc" => {
                for (field, delta) in spec {
                    let delta = numeric(delta).ok_or_else(|| {
                        StoreError::Operation("$inc requires a numeric operand".to_string())
                    })?;
                    let current = doc.get(field).and_then(numeric).unwrap_or(0.0);
                    let next = current + delta;
                    // Stay integral when the result is a whole number.
                    if next.fract() == 0.0 {
                        doc.insert(field, Bson::Int64(next as i64));
                    } else {
                        doc.insert(field, Bson::Double(next));
                    }
                }
            }
            other => {
                return Err(StoreError::Operation(format!(
                    "unsupported update operator: {}",
                    other
                )))
            }
        }
    }
    Ok(())
}

fn with_id(document: Document) -> Document {
    if document.contains_key("_id") {
        return document;
    }
    // _id leads, as the server would store it.
    let mut fresh = doc! {"_id": ObjectId::new()};
    fresh.extend(document);
    fresh
}

fn get_i64(options: &Document, key: &str) -> Option<i64> {
    options.get(key).and_then(numeric).map(|v| v as i64)
}

fn apply_find_options(mut docs: Vec<Document>, options: &Document) -> Vec<Document> {
    if let Some(Bson::Document(sort)) = options.get("sort") {
        docs.sort_by(|a, b| {
            for (field, direction) in sort {
                let ord = match (a.get(field).and_then(numeric), b.get(field).and_then(numeric)) {
                    (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                    _ => {
                        let x = a.get(field).map(|v| v.to_string()).unwrap_or_default();
                        let y = b.get(field).map(|v| v.to_string()).unwrap_or_default();
                        x.cmp(&y)
                    }
                };
                let descending = numeric(direction).map(|d| d < 0.0).unwrap_or(false);
                let ord = if descending { ord.reverse() } else { ord };
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });
    }

    let skip = get_i64(options, "skip").unwrap_or(0).max(0) as usize;
    let limit = get_i64(options, "limit")
        .filter(|l| *l > 0)
        .map(|l| l as usize)
        .unwrap_or(usize::MAX);
    docs.into_iter().skip(skip).take(limit).collect()
}

fn filtered(
    collections: &Collections,
    collection: &str,
    filter: &Document,
) -> StoreResult<Vec<Document>> {
    let docs = collections.get(collection).cloned().unwrap_or_default();
    let mut out = Vec::new();
    for doc in docs {
        if matches(&doc, filter)? {
            out.push(doc);
        }
    }
    Ok(out)
}

#[async_trait]
impl Store for MemoryStore {
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
    ) -> StoreResult<Vec<Document>> {
        let guard = self.read()?;
        let docs = filtered(&guard, collection, &filter)?;
        Ok(apply_find_options(docs, &options))
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
    ) -> StoreResult<Option<Document>> {
        let guard = self.read()?;
        let docs = filtered(&guard, collection, &filter)?;
        Ok(apply_find_options(docs, &options).into_iter().next())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<Document> {
        let document = with_id(document);
        let mut guard = self.write()?;
        guard
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());
        Ok(document)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> StoreResult<Vec<Document>> {
        let documents: Vec<Document> = documents.into_iter().map(with_id).collect();
        let mut guard = self.write()?;
        guard
            .entry(collection.to_string())
            .or_default()
            .extend(documents.clone());
        Ok(documents)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        _options: Document,
    ) -> StoreResult<Option<Document>> {
        let mut guard = self.write()?;
        let docs = guard.entry(collection.to_string()).or_default();
        for doc in docs.iter_mut() {
            if matches(doc, &filter)? {
                apply_update(doc, &update)?;
                return Ok(Some(doc.clone()));
            }
        }
        Ok(None)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        _options: Document,
    ) -> StoreResult<u64> {
        let mut guard = self.write()?;
        let docs = guard.entry(collection.to_string()).or_default();
        let mut modified = 0;
        for doc in docs.iter_mut() {
            if matches(doc, &filter)? {
                apply_update(doc, &update)?;
                modified += 1;
            }
        }
        Ok(modified)
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        _options: Document,
    ) -> StoreResult<u64> {
        let mut guard = self.write()?;
        let docs = guard.entry(collection.to_string()).or_default();
        let mut position = None;
        for (i, doc) in docs.iter().enumerate() {
            if matches(doc, &filter)? {
                position = Some(i);
                break;
            }
        }
        match position {
            Some(i) => {
                docs.remove(i);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        _options: Document,
    ) -> StoreResult<u64> {
        let mut guard = self.write()?;
        let docs = guard.entry(collection.to_string()).or_default();
        let mut deleted = 0;
        let mut kept = Vec::with_capacity(docs.len());
        for doc in docs.iter() {
            if matches(doc, &filter)? {
                deleted += 1;
            } else {
                kept.push(doc.clone());
            }
        }
        *docs = kept;
        Ok(deleted)
    }

    async fn count(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
    ) -> StoreResult<u64> {
        let guard = self.read()?;
        let docs = filtered(&guard, collection, &filter)?;
        Ok(apply_find_options(docs, &options).len() as u64)
    }

    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        let guard = self.read()?;
        let mut names: Vec<String> = guard.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_index(
        &self,
        collection: &str,
        keys: Document,
        options: Document,
    ) -> StoreResult<String> {
        let name = options
            .get_str("name")
            .map(str::to_string)
            .unwrap_or_else(|_| index_name(&keys));

        let mut guard = self
            .indexes
            .write()
            .map_err(|_| StoreError::Operation("lock poisoned".to_string()))?;
        let specs = guard.entry(collection.to_string()).or_default();

        if let Some(existing) = specs.iter().find(|s| s.name == name) {
            // Same spec again is a no-op; a conflicting spec under the same
            // name is an error, as the server would report.
            if existing.keys == keys && existing.options == options {
                return Ok(name);
            }
            return Err(StoreError::Operation(format!(
                "index {} already exists with a different specification",
                name
            )));
        }

        specs.push(IndexSpec {
            name: name.clone(),
            keys,
            options,
        });
        Ok(name)
    }

    async fn drop_index(
        &self,
        collection: &str,
        index: &str,
        _options: Document,
    ) -> StoreResult<bool> {
        let mut guard = self
            .indexes
            .write()
            .map_err(|_| StoreError::Operation("lock poisoned".to_string()))?;
        let specs = guard.entry(collection.to_string()).or_default();
        let before = specs.len();
        specs.retain(|s| s.name != index);
        if specs.len() == before {
            return Err(StoreError::Operation(format!(
                "index not found: {}",
                index
            )));
        }
        Ok(true)
    }

    async fn begin_transaction(
        &self,
        _tuning: TransactionTuning,
    ) -> StoreResult<Box<dyn StoreSession>> {
        let working = self.read()?.clone();
        Ok(Box::new(MemorySession {
            shared: Arc::clone(&self.collections),
            working,
            finished: false,
        }))
    }
}

/// Snapshot-based transaction context over [`MemoryStore`].
struct MemorySession {
    shared: Arc<RwLock<Collections>>,
    working: Collections,
    finished: bool,
}

impl MemorySession {
    fn check_open(&self) -> StoreResult<()> {
        if self.finished {
            return Err(StoreError::Transaction(
                "session already finished".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn insert_one(&mut self, collection: &str, document: Document) -> StoreResult<Document> {
        self.check_open()?;
        let document = with_id(document);
        self.working
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());
        Ok(document)
    }

    async fn find_one_and_update(
        &mut self,
        collection: &str,
        filter: Document,
        update: Document,
        _options: Document,
    ) -> StoreResult<Option<Document>> {
        self.check_open()?;
        let docs = self.working.entry(collection.to_string()).or_default();
        for doc in docs.iter_mut() {
            if matches(doc, &filter)? {
                apply_update(doc, &update)?;
                return Ok(Some(doc.clone()));
            }
        }
        Ok(None)
    }

    async fn delete_one(&mut self, collection: &str, filter: Document) -> StoreResult<u64> {
        self.check_open()?;
        let docs = self.working.entry(collection.to_string()).or_default();
        let mut position = None;
        for (i, doc) in docs.iter().enumerate() {
            if matches(doc, &filter)? {
                position = Some(i);
                break;
            }
        }
        match position {
            Some(i) => {
                docs.remove(i);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn commit(&mut self) -> StoreResult<()> {
        self.check_open()?;
        self.finished = true;
        let mut guard = self
            .shared
            .write()
            .map_err(|_| StoreError::Transaction("lock poisoned".to_string()))?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }

    async fn abort(&mut self) -> StoreResult<()> {
        self.check_open()?;
        self.finished = true;
        self.working.clear();
        Ok(())
    }
}
