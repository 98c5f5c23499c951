//! # Shopping Cart
//!
//! One cart line per `(buyerEmail, medicineName)`. Every successful add
//! rewrites the buyer's running `subTotal` onto all of their cart lines.
//!
//! Neither the duplicate check nor the subtotal fan-out is atomic: two
//! concurrent adds of the same medicine can both pass the check, and a
//! concurrent add can leave a stale subtotal behind.

use crate::error::{MarketError, MarketResult};
use crate::store::{
    from_document, number, to_document, BoxedStore, Collection, DeleteOutcome, Document, Filter,
    InsertOutcome, Patch, UpdateOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, info, instrument};

/// A line in a buyer's cart.
///
/// Numeric fields are kept as sent (numbers or numeric strings) and read
/// through [`number`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub buyer_email: String,

    pub medicine_name: String,

    #[serde(default = "default_quantity")]
    pub medicine_quantity: Value,

    /// Unit price
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub price: Value,

    /// Line total as last written
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub total_price: Value,

    /// Buyer's cart total, denormalized onto every line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_total: Option<Value>,

    /// Everything else the storefront sends along (image, company, seller)
    #[serde(flatten)]
    pub extra: Document,
}

fn default_quantity() -> Value {
    Value::from(1)
}

impl CartItem {
    pub fn new(
        buyer_email: impl Into<String>,
        medicine_name: impl Into<String>,
        quantity: u32,
        price: f64,
    ) -> Self {
        Self {
            id: None,
            buyer_email: buyer_email.into(),
            medicine_name: medicine_name.into(),
            medicine_quantity: Value::from(quantity),
            price: Value::from(price),
            total_price: Value::from(line_total(quantity, price)),
            sub_total: None,
            extra: Document::new(),
        }
    }

    /// Quantity as a whole, non-negative number
    pub fn quantity(&self) -> Option<u32> {
        number(&self.medicine_quantity)
            .filter(|q| *q >= 0.0 && *q <= f64::from(u32::MAX))
            .map(|q| q.trunc() as u32)
    }

    pub fn unit_price(&self) -> Option<f64> {
        number(&self.price)
    }

    /// Line total; unreadable totals count as zero
    pub fn total(&self) -> f64 {
        number(&self.total_price).unwrap_or(0.0)
    }

    pub fn sub_total_amount(&self) -> Option<f64> {
        self.sub_total.as_ref().and_then(number)
    }
}

/// `quantity * price`, truncated to a whole amount
pub fn line_total(quantity: u32, price: f64) -> f64 {
    (f64::from(quantity) * price).trunc()
}

/// Direction of a quantity change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityChange {
    Increase,
    Decrease,
}

impl QuantityChange {
    /// Apply to a quantity. A decrease never goes below one.
    pub fn apply(self, quantity: u32) -> MarketResult<u32> {
        match self {
            QuantityChange::Increase => Ok(quantity.saturating_add(1)),
            QuantityChange::Decrease if quantity > 1 => Ok(quantity - 1),
            QuantityChange::Decrease => Err(MarketError::InvalidQuantityUpdate),
        }
    }
}

impl FromStr for QuantityChange {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "increase" => Ok(QuantityChange::Increase),
            "decrease" => Ok(QuantityChange::Decrease),
            _ => Err(MarketError::InvalidQuantityUpdate),
        }
    }
}

/// Cart service over the `carts` collection
#[derive(Clone)]
pub struct CartService {
    store: BoxedStore,
}

impl CartService {
    pub fn new(store: BoxedStore) -> Self {
        Self { store }
    }

    /// Cart lines of a buyer. A missing email matches lines without one.
    pub async fn list_cart_for_buyer(&self, email: Option<&str>) -> MarketResult<Vec<CartItem>> {
        self.find(&Filter::eq("buyerEmail", email)).await
    }

    /// Add a line, rejecting a medicine the buyer already has in the cart,
    /// then fan the new subtotal out to every line of the buyer.
    #[instrument(skip(self, item), fields(buyer = %item.buyer_email, medicine = %item.medicine_name))]
    pub async fn add_to_cart(&self, item: CartItem) -> MarketResult<InsertOutcome> {
        let key = Filter::eq("buyerEmail", item.buyer_email.as_str())
            .and(Filter::eq("medicineName", item.medicine_name.as_str()));
        if self.store.find_one(Collection::Carts, &key).await?.is_some() {
            return Err(MarketError::DuplicateCartItem {
                buyer_email: item.buyer_email,
                medicine_name: item.medicine_name,
            });
        }

        let outcome = self
            .store
            .insert_one(Collection::Carts, to_document(&item)?)
            .await?;

        let sub_total = self.refresh_sub_total(&item.buyer_email).await?;
        info!(
            "Added {} to cart of {}, subtotal={}",
            item.medicine_name, item.buyer_email, sub_total
        );
        Ok(outcome)
    }

    /// Step a line's quantity and rewrite its total. The buyer's subtotal is
    /// left as it was.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        id: &str,
        change: QuantityChange,
    ) -> MarketResult<UpdateOutcome> {
        let filter = Filter::by_id(id);
        let item = self
            .store
            .find_one(Collection::Carts, &filter)
            .await?
            .map(from_document::<CartItem>)
            .transpose()?
            .ok_or_else(|| MarketError::NotFound {
                entity: "cart item",
                id: id.to_string(),
            })?;

        let current = item.quantity().ok_or_else(|| {
            MarketError::InvalidRequest(format!("cart item {} has no readable quantity", id))
        })?;
        let price = item.unit_price().ok_or_else(|| {
            MarketError::InvalidRequest(format!("cart item {} has no readable price", id))
        })?;

        let quantity = change.apply(current)?;
        let total = line_total(quantity, price);
        debug!(
            "Cart item {}: quantity {} -> {}, total={}",
            id, current, quantity, total
        );

        let patch = Patch::new()
            .set("medicineQuantity", quantity)
            .set("totalPrice", total);
        self.store.update_one(Collection::Carts, &filter, &patch).await
    }

    pub async fn get_cart_item(&self, id: &str) -> MarketResult<Option<CartItem>> {
        self.store
            .find_one(Collection::Carts, &Filter::by_id(id))
            .await?
            .map(from_document::<CartItem>)
            .transpose()
    }

    pub async fn remove_cart_item(&self, id: &str) -> MarketResult<DeleteOutcome> {
        self.store
            .delete_one(Collection::Carts, &Filter::by_id(id))
            .await
    }

    #[instrument(skip(self))]
    pub async fn remove_all_for_buyer(&self, email: Option<&str>) -> MarketResult<DeleteOutcome> {
        self.store
            .delete_many(Collection::Carts, &Filter::eq("buyerEmail", email))
            .await
    }

    /// Sum `totalPrice` over the buyer's lines and write it onto each of them
    async fn refresh_sub_total(&self, buyer_email: &str) -> MarketResult<f64> {
        let filter = Filter::eq("buyerEmail", buyer_email);
        let sub_total: f64 = self
            .find(&filter)
            .await?
            .iter()
            .map(CartItem::total)
            .sum();
        self.store
            .update_many(
                Collection::Carts,
                &filter,
                &Patch::new().set("subTotal", sub_total),
            )
            .await?;
        Ok(sub_total)
    }

    async fn find(&self, filter: &Filter) -> MarketResult<Vec<CartItem>> {
        self.store
            .find(Collection::Carts, filter)
            .await?
            .into_iter()
            .map(from_document::<CartItem>)
            .collect()
    }
}
