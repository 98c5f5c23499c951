//! # Document Store Trait
//!
//! The seam between the marketplace services and the document database.
//! Implementations: [`MemoryStore`](crate::memory::MemoryStore) in this crate,
//! `MongoStore` in `medi-mongo`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  DocumentStore (trait)                      │
//! │  ├── find_one() / find()                                    │
//! │  ├── insert_one()                                           │
//! │  ├── update_one() / update_many()                           │
//! │  └── delete_one() / delete_many()                           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                 ┌──────────┴──────────┐
//!         ┌───────┴───────┐     ┌───────┴───────┐
//!         │  MemoryStore  │     │  MongoStore   │
//!         └───────────────┘     └───────────────┘
//! ```
//!
//! There are no transactions. Every call is one independent round trip, so a
//! read followed by a write can interleave with other requests.

use crate::error::{MarketError, MarketResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// A schema-free document: a JSON object
pub type Document = serde_json::Map<String, Value>;

/// Primary key field of every document
pub const ID_FIELD: &str = "_id";

/// The collections the marketplace uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Medicines,
    Carts,
    Users,
    Orders,
    Categories,
}

impl Collection {
    /// Collection name in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Medicines => "medicines",
            Collection::Carts => "carts",
            Collection::Users => "users",
            Collection::Orders => "orders",
            Collection::Categories => "categories",
        }
    }

    pub fn all() -> [Collection; 5] {
        [
            Collection::Medicines,
            Collection::Carts,
            Collection::Users,
            Collection::Orders,
            Collection::Categories,
        ]
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query filter.
///
/// Paths are dotted (`order.items.medicineName`). When a path step lands on
/// an array, the filter matches if any element matches, the way document
/// databases treat arrays. An `Eq` against `null` also matches a missing
/// field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document
    All,
    /// Field at `path` equals `value`
    Eq { path: String, value: Value },
    /// Every sub-filter matches
    And(Vec<Filter>),
}

impl Filter {
    pub fn all() -> Self {
        Filter::All
    }

    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Filter on the primary key
    pub fn by_id(id: impl Into<String>) -> Self {
        Filter::eq(ID_FIELD, id.into())
    }

    /// Builder: conjunction with another filter
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::All => other,
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    /// Evaluate the filter against a document
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { path, value } => {
                let segments: Vec<&str> = path.split('.').collect();
                object_matches(doc, &segments, value)
            }
            Filter::And(parts) => parts.iter().all(|f| f.matches(doc)),
        }
    }
}

fn object_matches(map: &Document, segments: &[&str], expected: &Value) -> bool {
    let Some((head, rest)) = segments.split_first() else {
        return false;
    };
    match map.get(*head) {
        Some(value) => value_matches(value, rest, expected),
        None => rest.is_empty() && expected.is_null(),
    }
}

fn value_matches(value: &Value, rest: &[&str], expected: &Value) -> bool {
    if rest.is_empty() {
        return value == expected
            || matches!(value, Value::Array(items) if items.iter().any(|item| item == expected));
    }
    match value {
        Value::Object(map) => object_matches(map, rest, expected),
        Value::Array(items) => items.iter().any(|item| value_matches(item, rest, expected)),
        _ => false,
    }
}

/// A partial update: top-level fields to set.
///
/// An empty patch is legal and modifies nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    set: Document,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set a field
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Fields this patch writes
    pub fn fields(&self) -> &Document {
        &self.set
    }

    /// Apply to a document, returning whether anything changed
    pub fn apply(&self, doc: &mut Document) -> bool {
        let mut modified = false;
        for (field, value) in &self.set {
            if doc.get(field) != Some(value) {
                doc.insert(field.clone(), value.clone());
                modified = true;
            }
        }
        modified
    }
}

/// Result of `insert_one`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOutcome {
    pub acknowledged: bool,
    pub inserted_id: String,
}

impl InsertOutcome {
    pub fn new(inserted_id: impl Into<String>) -> Self {
        Self {
            acknowledged: true,
            inserted_id: inserted_id.into(),
        }
    }
}

/// Result of `update_one` / `update_many`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
}

impl UpdateOutcome {
    pub fn new(matched_count: u64, modified_count: u64) -> Self {
        Self {
            acknowledged: true,
            matched_count,
            modified_count,
        }
    }
}

/// Result of `delete_one` / `delete_many`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl DeleteOutcome {
    pub fn new(deleted_count: u64) -> Self {
        Self {
            acknowledged: true,
            deleted_count,
        }
    }
}

/// Generic document collection access.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> MarketResult<Option<Document>>;

    async fn find(&self, collection: Collection, filter: &Filter) -> MarketResult<Vec<Document>>;

    /// Insert a document. An `_id` is assigned when the document has none.
    async fn insert_one(&self, collection: Collection, doc: Document)
        -> MarketResult<InsertOutcome>;

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
    ) -> MarketResult<UpdateOutcome>;

    async fn update_many(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
    ) -> MarketResult<UpdateOutcome>;

    async fn delete_one(&self, collection: Collection, filter: &Filter)
        -> MarketResult<DeleteOutcome>;

    async fn delete_many(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> MarketResult<DeleteOutcome>;

    /// Backend name (for logging)
    fn backend_name(&self) -> &'static str;

    /// Release the underlying connection. Called once on shutdown.
    async fn close(&self) -> MarketResult<()> {
        Ok(())
    }
}

/// Type alias for a shared store handle (dynamic dispatch)
pub type BoxedStore = Arc<dyn DocumentStore>;

/// Mint a fresh document id
pub fn new_document_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Make sure `doc` has a string `_id`, returning it.
pub fn ensure_id(doc: &mut Document) -> String {
    match doc.get(ID_FIELD) {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Null) | None => {
            let id = new_document_id();
            doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            id
        }
        Some(other) => {
            let id = other.to_string();
            doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            id
        }
    }
}

/// Read a stored value as a number. Numeric strings count, since the
/// storefront sends form fields either way.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Serialize a typed entity into a document
pub fn to_document<T: Serialize>(value: &T) -> MarketResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(MarketError::Serialization(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Deserialize a document into a typed entity
pub fn from_document<T: DeserializeOwned>(doc: Document) -> MarketResult<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}
