//! # Catalog
//!
//! Medicines and categories. Payloads are stored as submitted; only the
//! fields the marketplace queries on are typed.

use crate::error::MarketResult;
use crate::store::{
    from_document, number, to_document, BoxedStore, Collection, DeleteOutcome, Document, Filter,
    InsertOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

/// A medicine listed by a seller.
///
/// The body is kept as submitted. `name`, `category` and `price` are read
/// through accessors so a listing with an odd field shape still loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medicine {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Everything the seller sent (name, category, price, company, image, ...)
    #[serde(flatten)]
    pub fields: Document,
}

impl Medicine {
    pub fn new(name: impl Into<String>, category: impl Into<String>, price: f64) -> Self {
        let mut fields = Document::new();
        fields.insert("name".to_string(), Value::String(name.into()));
        fields.insert("category".to_string(), Value::String(category.into()));
        fields.insert("price".to_string(), Value::from(price));
        Self { id: None, fields }
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    pub fn category(&self) -> Option<&str> {
        self.fields.get("category").and_then(Value::as_str)
    }

    /// Unit price in BDT, if the stored value reads as a number
    pub fn price(&self) -> Option<f64> {
        self.fields.get("price").and_then(number)
    }
}

/// A medicine category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(flatten)]
    pub fields: Document,
}

impl Category {
    pub fn named(name: impl Into<String>) -> Self {
        let mut fields = Document::new();
        fields.insert("name".to_string(), Value::String(name.into()));
        Self { id: None, fields }
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }
}

/// Seed data for a fresh store, loaded from TOML
///
/// ```toml
/// [[categories]]
/// name = "Tablet"
///
/// [[medicines]]
/// name = "Napa"
/// category = "Tablet"
/// price = 12.0
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
}

impl CatalogSeed {
    /// Load seed from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.medicines.is_empty()
    }
}

/// Catalog service over the `medicines` and `categories` collections
#[derive(Clone)]
pub struct CatalogService {
    store: BoxedStore,
}

impl CatalogService {
    pub fn new(store: BoxedStore) -> Self {
        Self { store }
    }

    pub async fn list_medicines(&self) -> MarketResult<Vec<Medicine>> {
        self.medicines(&Filter::all()).await
    }

    #[instrument(skip(self, medicine), fields(name = medicine.name().unwrap_or_default()))]
    pub async fn add_medicine(&self, medicine: Medicine) -> MarketResult<InsertOutcome> {
        self.store
            .insert_one(Collection::Medicines, to_document(&medicine)?)
            .await
    }

    pub async fn list_medicines_by_category(&self, category: &str) -> MarketResult<Vec<Medicine>> {
        self.medicines(&Filter::eq("category", category)).await
    }

    pub async fn add_category(&self, category: Category) -> MarketResult<InsertOutcome> {
        self.store
            .insert_one(Collection::Categories, to_document(&category)?)
            .await
    }

    pub async fn list_categories(&self) -> MarketResult<Vec<Category>> {
        self.store
            .find(Collection::Categories, &Filter::all())
            .await?
            .into_iter()
            .map(from_document::<Category>)
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: &str) -> MarketResult<DeleteOutcome> {
        self.store
            .delete_one(Collection::Categories, &Filter::by_id(id))
            .await
    }

    /// Insert every seed entry, returning how many documents were written
    pub async fn load_seed(&self, seed: CatalogSeed) -> MarketResult<usize> {
        let mut written = 0;
        for category in seed.categories {
            self.add_category(category).await?;
            written += 1;
        }
        for medicine in seed.medicines {
            self.add_medicine(medicine).await?;
            written += 1;
        }
        info!("Seeded catalog with {} documents", written);
        Ok(written)
    }

    async fn medicines(&self, filter: &Filter) -> MarketResult<Vec<Medicine>> {
        self.store
            .find(Collection::Medicines, filter)
            .await?
            .into_iter()
            .map(from_document::<Medicine>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::DocumentStore;
    use serde_json::json;
    use std::sync::Arc;

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_medicines_by_category() {
        let catalog = service();
        catalog
            .add_medicine(Medicine::new("Napa", "Tablet", 12.0))
            .await
            .unwrap();
        catalog
            .add_medicine(Medicine::new("Ace Syrup", "Syrup", 45.0))
            .await
            .unwrap();

        assert_eq!(catalog.list_medicines().await.unwrap().len(), 2);

        let tablets = catalog.list_medicines_by_category("Tablet").await.unwrap();
        assert_eq!(tablets.len(), 1);
        assert_eq!(tablets[0].name(), Some("Napa"));
        assert!(catalog
            .list_medicines_by_category("Injection")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_category_names_are_allowed() {
        let catalog = service();
        catalog.add_category(Category::named("Tablet")).await.unwrap();
        catalog.add_category(Category::named("Tablet")).await.unwrap();
        assert_eq!(catalog.list_categories().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_category_by_id() {
        let catalog = service();
        let outcome = catalog.add_category(Category::named("Tablet")).await.unwrap();

        let deleted = catalog.delete_category(&outcome.inserted_id).await.unwrap();
        assert_eq!(deleted.deleted_count, 1);
        let again = catalog.delete_category(&outcome.inserted_id).await.unwrap();
        assert_eq!(again.deleted_count, 0);
        assert!(catalog.list_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_seed_from_toml() {
        let seed = CatalogSeed::from_toml(
            r#"
[[categories]]
name = "Tablet"
image = "https://img.example/tablet.png"

[[medicines]]
name = "Napa"
category = "Tablet"
price = 12.0
company = "Beximco"
"#,
        )
        .unwrap();
        assert_eq!(seed.categories[0].name(), Some("Tablet"));

        let catalog = service();
        assert_eq!(catalog.load_seed(seed).await.unwrap(), 2);

        let medicines = catalog.list_medicines().await.unwrap();
        assert_eq!(medicines[0].fields["company"], "Beximco");
        assert_eq!(medicines[0].price(), Some(12.0));
    }

    #[tokio::test]
    async fn test_medicine_body_is_kept_as_submitted() {
        let catalog = service();
        let medicine: Medicine = serde_json::from_value(json!({
            "name": "Napa",
            "category": "Tablet",
            "price": "12",
            "discount": "5%"
        }))
        .unwrap();
        catalog.add_medicine(medicine).await.unwrap();

        let stored = catalog.list_medicines().await.unwrap();
        assert_eq!(stored[0].fields["price"], "12");
        assert_eq!(stored[0].price(), Some(12.0));
        assert_eq!(stored[0].fields["discount"], "5%");
    }

    #[tokio::test]
    async fn test_listing_survives_unusual_documents() {
        let store = Arc::new(MemoryStore::new());
        let catalog = CatalogService::new(store.clone());
        store
            .insert_one(
                Collection::Medicines,
                json!({ "name": 42, "price": { "amount": 12 } })
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();
        catalog
            .add_medicine(Medicine::new("Napa", "Tablet", 12.0))
            .await
            .unwrap();

        let medicines = catalog.list_medicines().await.unwrap();
        assert_eq!(medicines.len(), 2);
        assert_eq!(medicines[0].name(), None);
        assert_eq!(medicines[0].price(), None);
    }
}
