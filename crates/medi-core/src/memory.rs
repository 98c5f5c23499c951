//! # In-Memory Document Store
//!
//! Process-local [`DocumentStore`] used by the development server and by
//! tests. Each call takes the lock once, so like the real database the
//! individual operations are atomic while sequences of them are not.

use crate::error::{MarketError, MarketResult};
use crate::store::{
    ensure_id, Collection, DeleteOutcome, Document, DocumentStore, Filter, InsertOutcome, Patch,
    UpdateOutcome, ID_FIELD,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Collections = HashMap<Collection, Vec<Document>>;

/// In-memory store keyed by collection, documents kept in insertion order
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: Collection) -> usize {
        self.read()
            .map(|c| c.get(&collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn read(&self) -> MarketResult<RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|_| MarketError::Internal("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> MarketResult<RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|_| MarketError::Internal("memory store lock poisoned".to_string()))
    }

    fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
        limit: Option<usize>,
    ) -> MarketResult<UpdateOutcome> {
        let mut guard = self.write()?;
        let docs = guard.entry(collection).or_default();
        let mut matched = 0;
        let mut modified = 0;
        for doc in docs.iter_mut().filter(|d| filter.matches(d)) {
            if limit.is_some_and(|l| matched >= l) {
                break;
            }
            matched += 1;
            if patch.apply(doc) {
                modified += 1;
            }
        }
        Ok(UpdateOutcome::new(matched as u64, modified as u64))
    }

    fn delete(
        &self,
        collection: Collection,
        filter: &Filter,
        limit: Option<usize>,
    ) -> MarketResult<DeleteOutcome> {
        let mut guard = self.write()?;
        let docs = guard.entry(collection).or_default();
        let mut deleted = 0;
        docs.retain(|doc| {
            if limit.is_some_and(|l| deleted >= l) || !filter.matches(doc) {
                return true;
            }
            deleted += 1;
            false
        });
        Ok(DeleteOutcome::new(deleted as u64))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> MarketResult<Option<Document>> {
        let guard = self.read()?;
        Ok(guard
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)).cloned()))
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> MarketResult<Vec<Document>> {
        let guard = self.read()?;
        Ok(guard
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_one(
        &self,
        collection: Collection,
        mut doc: Document,
    ) -> MarketResult<InsertOutcome> {
        let id = ensure_id(&mut doc);
        let mut guard = self.write()?;
        let docs = guard.entry(collection).or_default();

        let key = Value::String(id.clone());
        if docs.iter().any(|d| d.get(ID_FIELD) == Some(&key)) {
            return Err(MarketError::Store(format!(
                "duplicate key in {}: _id {}",
                collection, id
            )));
        }

        docs.push(doc);
        Ok(InsertOutcome::new(id))
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
    ) -> MarketResult<UpdateOutcome> {
        self.update(collection, filter, patch, Some(1))
    }

    async fn update_many(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
    ) -> MarketResult<UpdateOutcome> {
        self.update(collection, filter, patch, None)
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> MarketResult<DeleteOutcome> {
        self.delete(collection, filter, Some(1))
    }

    async fn delete_many(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> MarketResult<DeleteOutcome> {
        self.delete(collection, filter, None)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let outcome = store
            .insert_one(Collection::Categories, doc(json!({ "name": "Tablet" })))
            .await
            .unwrap();
        assert!(outcome.acknowledged);

        let found = store
            .find_one(Collection::Categories, &Filter::by_id(&outcome.inserted_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["name"], "Tablet");

        let dup = store
            .insert_one(
                Collection::Categories,
                doc(json!({ "_id": outcome.inserted_id, "name": "Syrup" })),
            )
            .await;
        assert!(matches!(dup, Err(MarketError::Store(_))));
    }

    #[tokio::test]
    async fn test_update_one_touches_a_single_document() {
        let store = MemoryStore::new();
        for _ in 0..2 {
            store
                .insert_one(Collection::Carts, doc(json!({ "buyerEmail": "a@b.c" })))
                .await
                .unwrap();
        }
        let filter = Filter::eq("buyerEmail", "a@b.c");
        let patch = Patch::new().set("subTotal", 10);

        let one = store.update_one(Collection::Carts, &filter, &patch).await.unwrap();
        assert_eq!((one.matched_count, one.modified_count), (1, 1));

        let many = store.update_many(Collection::Carts, &filter, &patch).await.unwrap();
        assert_eq!((many.matched_count, many.modified_count), (2, 1));
    }

    #[tokio::test]
    async fn test_delete_one_and_many() {
        let store = MemoryStore::new();
        for name in ["a", "b", "c"] {
            store
                .insert_one(
                    Collection::Carts,
                    doc(json!({ "buyerEmail": "a@b.c", "medicineName": name })),
                )
                .await
                .unwrap();
        }
        let filter = Filter::eq("buyerEmail", "a@b.c");

        let one = store.delete_one(Collection::Carts, &filter).await.unwrap();
        assert_eq!(one.deleted_count, 1);
        assert_eq!(store.count(Collection::Carts), 2);

        let rest = store.delete_many(Collection::Carts, &filter).await.unwrap();
        assert_eq!(rest.deleted_count, 2);
        assert_eq!(store.count(Collection::Carts), 0);
    }

    #[tokio::test]
    async fn test_empty_collection_reads() {
        let store = MemoryStore::new();
        assert!(store
            .find(Collection::Orders, &Filter::all())
            .await
            .unwrap()
            .is_empty());
        let outcome = store
            .update_one(Collection::Orders, &Filter::by_id("nope"), &Patch::new())
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::new(0, 0));
    }
}
