//! # medi-mongo
//!
//! MongoDB implementation of [`DocumentStore`].
//!
//! Documents cross the boundary as JSON objects. Ids written by this store
//! are strings; lookups by `_id` also match a legacy `ObjectId` with the same
//! hex value. `transactionDate` is stored as a BSON date and read back as an
//! RFC 3339 string, as are dates written by other clients.
//!
//! ```rust,ignore
//! use medi_mongo::MongoStore;
//!
//! let store = MongoStore::connect("mongodb+srv://...", "MediTrustDB").await?;
//! // share as Arc<dyn DocumentStore>, call store.close() on shutdown
//! ```

use async_trait::async_trait;
use futures::TryStreamExt;
use medi_core::store::ensure_id;
use medi_core::{
    Collection, DeleteOutcome, Document, DocumentStore, Filter, InsertOutcome, MarketError,
    MarketResult, Patch, UpdateOutcome,
};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Bson, DateTime as BsonDateTime, Document as BsonDocument};
use mongodb::{Client, Database};
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Top-level fields written as BSON dates
const DATE_FIELDS: &[&str] = &["transactionDate"];

/// MongoDB-backed document store
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    /// Connect and verify the deployment answers a ping
    #[instrument(skip(uri))]
    pub async fn connect(uri: &str, database: &str) -> MarketResult<Self> {
        let client = Client::with_uri_str(uri).await.map_err(store_error)?;
        let store = Self {
            database: client.database(database),
            client,
        };
        store.ping().await?;
        info!("Connected to MongoDB database {}", database);
        Ok(store)
    }

    pub async fn ping(&self) -> MarketResult<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(store_error)
    }

    fn collection(&self, collection: Collection) -> mongodb::Collection<BsonDocument> {
        self.database.collection::<BsonDocument>(collection.as_str())
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
        many: bool,
    ) -> MarketResult<UpdateOutcome> {
        let coll = self.collection(collection);
        let query = filter_to_bson(filter)?;

        // The server rejects an empty update document; report the match only.
        if patch.is_empty() {
            let matched = if many {
                coll.count_documents(query).await.map_err(store_error)?
            } else {
                u64::from(coll.find_one(query).await.map_err(store_error)?.is_some())
            };
            return Ok(UpdateOutcome::new(matched, 0));
        }

        let update = doc! { "$set": document_to_bson(patch.fields())? };
        let result = if many {
            coll.update_many(query, update).await
        } else {
            coll.update_one(query, update).await
        }
        .map_err(store_error)?;

        Ok(UpdateOutcome::new(result.matched_count, result.modified_count))
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> MarketResult<Option<Document>> {
        let found = self
            .collection(collection)
            .find_one(filter_to_bson(filter)?)
            .await
            .map_err(store_error)?;
        found.map(bson_to_document).transpose()
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> MarketResult<Vec<Document>> {
        let cursor = self
            .collection(collection)
            .find(filter_to_bson(filter)?)
            .await
            .map_err(store_error)?;
        let docs: Vec<BsonDocument> = cursor.try_collect().await.map_err(store_error)?;
        debug!("{}: {} documents", collection, docs.len());
        docs.into_iter().map(bson_to_document).collect()
    }

    async fn insert_one(
        &self,
        collection: Collection,
        mut doc: Document,
    ) -> MarketResult<InsertOutcome> {
        let id = ensure_id(&mut doc);
        self.collection(collection)
            .insert_one(document_to_bson(&doc)?)
            .await
            .map_err(store_error)?;
        Ok(InsertOutcome::new(id))
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
    ) -> MarketResult<UpdateOutcome> {
        self.update(collection, filter, patch, false).await
    }

    async fn update_many(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
    ) -> MarketResult<UpdateOutcome> {
        self.update(collection, filter, patch, true).await
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> MarketResult<DeleteOutcome> {
        let result = self
            .collection(collection)
            .delete_one(filter_to_bson(filter)?)
            .await
            .map_err(store_error)?;
        Ok(DeleteOutcome::new(result.deleted_count))
    }

    async fn delete_many(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> MarketResult<DeleteOutcome> {
        let result = self
            .collection(collection)
            .delete_many(filter_to_bson(filter)?)
            .await
            .map_err(store_error)?;
        Ok(DeleteOutcome::new(result.deleted_count))
    }

    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    async fn close(&self) -> MarketResult<()> {
        self.client.clone().shutdown().await;
        info!("MongoDB client shut down");
        Ok(())
    }
}

fn store_error(err: mongodb::error::Error) -> MarketError {
    MarketError::Store(err.to_string())
}

/// Translate a [`Filter`] into a query document
pub fn filter_to_bson(filter: &Filter) -> MarketResult<BsonDocument> {
    match filter {
        Filter::All => Ok(BsonDocument::new()),
        Filter::Eq { path, value } if path == "_id" => {
            let id = json_to_bson(value)?;
            let legacy = value.as_str().and_then(|s| ObjectId::parse_str(s).ok());
            Ok(match legacy {
                Some(oid) => doc! { "_id": { "$in": [id, oid] } },
                None => doc! { "_id": id },
            })
        }
        Filter::Eq { path, value } => {
            let mut query = BsonDocument::new();
            query.insert(path.clone(), json_to_bson(value)?);
            Ok(query)
        }
        Filter::And(parts) if parts.is_empty() => Ok(BsonDocument::new()),
        Filter::And(parts) => {
            let clauses = parts
                .iter()
                .map(|p| filter_to_bson(p).map(Bson::Document))
                .collect::<MarketResult<Vec<_>>>()?;
            Ok(doc! { "$and": clauses })
        }
    }
}

fn json_to_bson(value: &Value) -> MarketResult<Bson> {
    mongodb::bson::to_bson(value).map_err(|e| MarketError::Serialization(e.to_string()))
}

fn document_to_bson(doc: &Document) -> MarketResult<BsonDocument> {
    let mut bson =
        mongodb::bson::to_document(doc).map_err(|e| MarketError::Serialization(e.to_string()))?;
    for field in DATE_FIELDS {
        let date = match bson.get(*field) {
            Some(Bson::String(s)) => BsonDateTime::parse_rfc3339_str(s).ok(),
            _ => None,
        };
        if let Some(date) = date {
            bson.insert(*field, Bson::DateTime(date));
        }
    }
    Ok(bson)
}

/// Convert a stored document to JSON. `ObjectId`s become hex strings and
/// dates become RFC 3339 strings, at any depth.
pub fn bson_to_document(doc: BsonDocument) -> MarketResult<Document> {
    match plain_bson(Bson::Document(doc)).into_relaxed_extjson() {
        Value::Object(map) => Ok(map),
        other => Err(MarketError::Serialization(format!(
            "expected a document, got {}",
            other
        ))),
    }
}

fn plain_bson(value: Bson) -> Bson {
    match value {
        Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
        Bson::DateTime(date) => match date.try_to_rfc3339_string() {
            Ok(s) => Bson::String(s),
            Err(_) => Bson::DateTime(date),
        },
        Bson::Document(doc) => Bson::Document(
            doc.into_iter()
                .map(|(key, value)| (key, plain_bson(value)))
                .collect(),
        ),
        Bson::Array(items) => Bson::Array(items.into_iter().map(plain_bson).collect()),
        other => other,
    }
}
