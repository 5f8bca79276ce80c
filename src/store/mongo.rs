//! MongoDB-backed store
//!
//! Thin translation from the [`Store`] trait onto the driver. Option bags
//! arrive as opaque documents; only the keys the driver needs as typed
//! option structs are lifted out (find: `limit`, `skip`, `sort`,
//! `projection`; update: `upsert`; index: `name`, `unique`,
//! `expireAfterSeconds`), everything else is ignored.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{
    Acknowledgment, ClientOptions, CountOptions, FindOneAndUpdateOptions, FindOneOptions,
    FindOptions, IndexOptions, ReadConcern, ReadPreference, ReturnDocument, SelectionCriteria,
    TransactionOptions, WriteConcern,
};
use mongodb::{Client, ClientSession, Collection, Database, IndexModel};

use super::{Store, StoreError, StoreResult, StoreSession, TransactionTuning};

/// Driver-backed document store, one per process.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect to the store and verify reachability before serving anything.
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        options.app_name = Some("docgate".to_string());

        let client =
            Client::with_options(options).map_err(|e| StoreError::Connection(e.to_string()))?;
        let db = client.database(database);

        db.run_command(doc! {"ping": 1}, None)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { client, db })
    }

    fn coll(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

fn get_i64(options: &Document, key: &str) -> Option<i64> {
    match options.get(key) {
        Some(Bson::Int32(v)) => Some(*v as i64),
        Some(Bson::Int64(v)) => Some(*v),
        Some(Bson::Double(v)) => Some(*v as i64),
        _ => None,
    }
}

fn get_bool(options: &Document, key: &str) -> Option<bool> {
    options.get_bool(key).ok()
}

fn get_doc(options: &Document, key: &str) -> Option<Document> {
    options.get_document(key).ok().cloned()
}

fn find_options(options: &Document) -> FindOptions {
    let mut out = FindOptions::default();
    out.limit = get_i64(options, "limit");
    out.skip = get_i64(options, "skip").map(|v| v.max(0) as u64);
    out.sort = get_doc(options, "sort");
    out.projection = get_doc(options, "projection");
    out
}

fn find_one_options(options: &Document) -> FindOneOptions {
    let mut out = FindOneOptions::default();
    out.skip = get_i64(options, "skip").map(|v| v.max(0) as u64);
    out.sort = get_doc(options, "sort");
    out.projection = get_doc(options, "projection");
    out
}

fn find_one_and_update_options(options: &Document) -> FindOneAndUpdateOptions {
    let mut out = FindOneAndUpdateOptions::default();
    // Post-image semantics for every update path.
    out.return_document = Some(ReturnDocument::After);
    out.upsert = get_bool(options, "upsert");
    out.sort = get_doc(options, "sort");
    out.projection = get_doc(options, "projection");
    out
}

fn count_options(options: &Document) -> CountOptions {
    let mut out = CountOptions::default();
    out.limit = get_i64(options, "limit").map(|v| v.max(0) as u64);
    out.skip = get_i64(options, "skip").map(|v| v.max(0) as u64);
    out
}

fn index_options(options: &Document) -> IndexOptions {
    let mut out = IndexOptions::default();
    out.name = options.get_str("name").ok().map(str::to_string);
    out.unique = get_bool(options, "unique");
    out.expire_after = get_i64(options, "expireAfterSeconds")
        .filter(|v| *v >= 0)
        .map(|v| Duration::from_secs(v as u64));
    out
}

fn transaction_options(tuning: &TransactionTuning) -> TransactionOptions {
    let mut out = TransactionOptions::default();

    // Transactions must observe their own writes: always read from primary,
    // overriding whatever read-scaling preference plain reads use.
    out.selection_criteria = Some(SelectionCriteria::ReadPreference(ReadPreference::Primary));

    if let Some(level) = tuning.read_concern.as_deref() {
        out.read_concern = Some(match level {
            "majority" => ReadConcern::majority(),
            "linearizable" => ReadConcern::linearizable(),
            "available" => ReadConcern::available(),
            "snapshot" => ReadConcern::snapshot(),
            _ => ReadConcern::local(),
        });
    }

    if let Some(spec) = tuning.write_concern.as_ref() {
        let mut wc = WriteConcern::default();
        match spec.get("w") {
            Some(serde_json::Value::String(s)) if s == "majority" => {
                wc.w = Some(Acknowledgment::Majority);
            }
            Some(serde_json::Value::String(s)) => {
                wc.w = Some(Acknowledgment::Custom(s.clone()));
            }
            Some(serde_json::Value::Number(n)) => {
                wc.w = Some(Acknowledgment::Nodes(n.as_u64().unwrap_or(1) as u32));
            }
            _ => {}
        }
        if let Some(journal) = spec.get("j").and_then(|v| v.as_bool()) {
            wc.journal = Some(journal);
        }
        out.write_concern = Some(wc);
    }

    if let Some(ms) = tuning.max_commit_time_ms {
        out.max_commit_time = Some(Duration::from_millis(ms));
    }

    out
}

#[async_trait]
impl Store for MongoStore {
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
    ) -> StoreResult<Vec<Document>> {
        let cursor = self
            .coll(collection)
            .find(filter, find_options(&options))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
    ) -> StoreResult<Option<Document>> {
        Ok(self
            .coll(collection)
            .find_one(filter, find_one_options(&options))
            .await?)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<Document> {
        let coll = self.coll(collection);
        let result = coll.insert_one(document.clone(), None).await?;
        match coll
            .find_one(doc! {"_id": result.inserted_id.clone()}, None)
            .await?
        {
            Some(stored) => Ok(stored),
            None => {
                // Deleted between the insert and the read-back; fall back to
                // echoing the input with its generated id.
                let mut document = document;
                document.insert("_id", result.inserted_id);
                Ok(document)
            }
        }
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> StoreResult<Vec<Document>> {
        let result = self
            .coll(collection)
            .insert_many(documents.clone(), None)
            .await?;
        let mut documents = documents;
        for (i, doc) in documents.iter_mut().enumerate() {
            if let Some(id) = result.inserted_ids.get(&i) {
                doc.insert("_id", id.clone());
            }
        }
        Ok(documents)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: Document,
    ) -> StoreResult<Option<Document>> {
        Ok(self
            .coll(collection)
            .find_one_and_update(filter, update, find_one_and_update_options(&options))
            .await?)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        _options: Document,
    ) -> StoreResult<u64> {
        let result = self
            .coll(collection)
            .update_many(filter, update, None)
            .await?;
        Ok(result.modified_count)
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        _options: Document,
    ) -> StoreResult<u64> {
        let result = self.coll(collection).delete_one(filter, None).await?;
        Ok(result.deleted_count)
    }

    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        _options: Document,
    ) -> StoreResult<u64> {
        let result = self.coll(collection).delete_many(filter, None).await?;
        Ok(result.deleted_count)
    }

    async fn count(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
    ) -> StoreResult<u64> {
        Ok(self
            .coll(collection)
            .count_documents(filter, count_options(&options))
            .await?)
    }

    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        Ok(self.db.list_collection_names(None).await?)
    }

    async fn create_index(
        &self,
        collection: &str,
        keys: Document,
        options: Document,
    ) -> StoreResult<String> {
        let model = IndexModel::builder()
            .keys(keys)
            .options(index_options(&options))
            .build();
        let result = self.coll(collection).create_index(model, None).await?;
        Ok(result.index_name)
    }

    async fn drop_index(
        &self,
        collection: &str,
        index: &str,
        _options: Document,
    ) -> StoreResult<bool> {
        self.coll(collection).drop_index(index, None).await?;
        Ok(true)
    }

    async fn begin_transaction(
        &self,
        tuning: TransactionTuning,
    ) -> StoreResult<Box<dyn StoreSession>> {
        let mut session = self
            .client
            .start_session(None)
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        session
            .start_transaction(transaction_options(&tuning))
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        Ok(Box::new(MongoSession {
            db: self.db.clone(),
            session,
        }))
    }
}

/// Driver session wrapper; exclusively owned by one batch.
struct MongoSession {
    db: Database,
    session: ClientSession,
}

impl MongoSession {
    fn coll(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

#[async_trait]
impl StoreSession for MongoSession {
    async fn insert_one(&mut self, collection: &str, document: Document) -> StoreResult<Document> {
        let coll = self.coll(collection);
        let result = coll
            .insert_one_with_session(document.clone(), None, &mut self.session)
            .await?;
        // Read back within the same transaction so the caller sees the
        // durable post-insert representation.
        match coll
            .find_one_with_session(
                doc! {"_id": result.inserted_id.clone()},
                None,
                &mut self.session,
            )
            .await?
        {
            Some(stored) => Ok(stored),
            None => {
                let mut document = document;
                document.insert("_id", result.inserted_id);
                Ok(document)
            }
        }
    }

    async fn find_one_and_update(
        &mut self,
        collection: &str,
        filter: Document,
        update: Document,
        options: Document,
    ) -> StoreResult<Option<Document>> {
        Ok(self
            .coll(collection)
            .find_one_and_update_with_session(
                filter,
                update,
                find_one_and_update_options(&options),
                &mut self.session,
            )
            .await?)
    }

    async fn delete_one(&mut self, collection: &str, filter: Document) -> StoreResult<u64> {
        let result = self
            .coll(collection)
            .delete_one_with_session(filter, None, &mut self.session)
            .await?;
        Ok(result.deleted_count)
    }

    async fn commit(&mut self) -> StoreResult<()> {
        self.session
            .commit_transaction()
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    async fn abort(&mut self) -> StoreResult<()> {
        self.session
            .abort_transaction()
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }
}
