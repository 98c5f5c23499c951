//! # Orders and the Payment Lifecycle
//!
//! ```text
//!   create_order ──► gateway init ──► redirect URL to buyer
//!                                  └► Order { paymentStatus: pending } persisted
//!
//!   POST /payment/success/{tranId} ──► pending ──► paid
//!   POST /payment/fail/{tranId}    ──► order deleted
//! ```
//!
//! There is no idempotency key and no transition guard: a failure callback
//! that arrives after a success callback deletes the paid order.

use crate::error::{MarketError, MarketResult};
use crate::gateway::{BoxedGateway, CallbackUrls, PaymentRequest, CURRENCY};
use crate::store::{
    from_document, number, to_document, BoxedStore, Collection, Document, Filter, InsertOutcome, Patch,
    UpdateOutcome,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Payment state of an order. A failed payment has no state: the order is
/// deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }
}

/// A line of the submitted order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub medicine_name: String,

    #[serde(flatten)]
    pub extra: Document,
}

impl OrderItem {
    pub fn new(medicine_name: impl Into<String>) -> Self {
        Self {
            medicine_name: medicine_name.into(),
            extra: Document::new(),
        }
    }
}

/// Checkout payload as submitted by the storefront
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    #[serde(default)]
    pub items: Vec<OrderItem>,

    /// Amount to charge, a number or a numeric string
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub total_bill: Value,

    #[serde(default)]
    pub buyer_name: String,

    #[serde(default)]
    pub buyer_email: String,

    #[serde(default)]
    pub buyer_address: String,

    /// Sent as a number or a string depending on the form
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub post_code: Value,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub contact_number: Value,

    /// Item names joined with ", ", filled in at checkout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,

    #[serde(flatten)]
    pub extra: Document,
}

impl OrderPayload {
    /// Human-readable summary of the item names
    pub fn product_summary(&self) -> String {
        self.items
            .iter()
            .map(|item| item.medicine_name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A stored order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub order: OrderPayload,

    #[serde(rename = "transactionID")]
    pub transaction_id: String,

    pub payment_status: PaymentStatus,

    pub transaction_date: DateTime<Utc>,
}

impl Order {
    /// A new order awaiting its gateway callback
    pub fn pending(order: OrderPayload, transaction_id: impl Into<String>) -> Self {
        Self {
            id: None,
            order,
            transaction_id: transaction_id.into(),
            payment_status: PaymentStatus::Pending,
            transaction_date: Utc::now(),
        }
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// Mint a transaction id for one checkout
pub fn new_transaction_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Result of `create_order`: the page to send the buyer to, and the pending
/// order still to be persisted.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub url: String,
    pub order: Order,
}

/// What a gateway callback resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Send the buyer to this storefront page
    Redirect(String),
    /// Nothing matched; no redirect
    Ignored,
}

/// Order lifecycle manager over the `orders` collection
#[derive(Clone)]
pub struct OrderService {
    store: BoxedStore,
    gateway: BoxedGateway,
    urls: CallbackUrls,
}

impl OrderService {
    pub fn new(store: BoxedStore, gateway: BoxedGateway, urls: CallbackUrls) -> Self {
        Self {
            store,
            gateway,
            urls,
        }
    }

    pub fn urls(&self) -> &CallbackUrls {
        &self.urls
    }

    /// Register the payment with the gateway.
    ///
    /// Nothing is written here. The caller answers the buyer with
    /// [`Checkout::url`] and then persists [`Checkout::order`] with
    /// [`record_pending`](Self::record_pending); an order lost between the two
    /// leaves the buyer with a gateway page and no order behind it.
    #[instrument(skip(self, payload), fields(buyer = %payload.buyer_email, items = payload.items.len()))]
    pub async fn create_order(&self, mut payload: OrderPayload) -> MarketResult<Checkout> {
        if payload.items.is_empty() {
            return Err(MarketError::InvalidRequest(
                "Order has no items".to_string(),
            ));
        }

        let amount = number(&payload.total_bill).ok_or_else(|| {
            MarketError::InvalidRequest(format!(
                "totalBill is not a number: {}",
                payload.total_bill
            ))
        })?;

        payload.product_name = Some(payload.product_summary());
        let tran_id = new_transaction_id();
        let request = self.payment_request(&payload, &tran_id, amount);

        let session = self.gateway.init(&request).await?;
        info!(
            "Initiated {} payment: tran_id={}, amount={} {}",
            self.gateway.gateway_name(),
            tran_id,
            request.total_amount,
            request.currency
        );

        Ok(Checkout {
            url: session.redirect_url,
            order: Order::pending(payload, tran_id),
        })
    }

    /// Persist a pending order produced by `create_order`
    #[instrument(skip(self, order), fields(tran_id = %order.transaction_id))]
    pub async fn record_pending(&self, order: &Order) -> MarketResult<InsertOutcome> {
        let outcome = self
            .store
            .insert_one(Collection::Orders, to_document(order)?)
            .await?;
        info!("Recorded pending order {}", order.transaction_id);
        Ok(outcome)
    }

    /// Gateway reported success: mark the order paid.
    #[instrument(skip(self))]
    pub async fn confirm_success(&self, tran_id: &str) -> MarketResult<CallbackOutcome> {
        let outcome = self
            .store
            .update_one(
                Collection::Orders,
                &Filter::eq("transactionID", tran_id),
                &Patch::new().set("paymentStatus", PaymentStatus::Paid.as_str()),
            )
            .await?;

        if outcome.modified_count > 0 {
            info!("Order {} paid", tran_id);
            Ok(CallbackOutcome::Redirect(self.urls.success_redirect(tran_id)))
        } else {
            warn!(
                "Success callback for {} modified nothing (matched {})",
                tran_id, outcome.matched_count
            );
            Ok(CallbackOutcome::Ignored)
        }
    }

    /// Gateway reported failure: delete the order, whatever its state.
    #[instrument(skip(self))]
    pub async fn confirm_failure(&self, tran_id: &str) -> MarketResult<CallbackOutcome> {
        let filter = Filter::eq("transactionID", tran_id);

        let existing = self.store.find_one(Collection::Orders, &filter).await?;
        let paid = Value::from(PaymentStatus::Paid.as_str());
        if existing.is_some_and(|doc| doc.get("paymentStatus") == Some(&paid)) {
            warn!("Failure callback deletes already paid order {}", tran_id);
        }

        let outcome = self.store.delete_one(Collection::Orders, &filter).await?;
        if outcome.deleted_count > 0 {
            info!("Order {} discarded after failed payment", tran_id);
            Ok(CallbackOutcome::Redirect(self.urls.fail_redirect(tran_id)))
        } else {
            warn!("Failure callback for unknown transaction {}", tran_id);
            Ok(CallbackOutcome::Ignored)
        }
    }

    pub async fn get_order_by_transaction(&self, tran_id: &str) -> MarketResult<Option<Order>> {
        self.store
            .find_one(Collection::Orders, &Filter::eq("transactionID", tran_id))
            .await?
            .map(from_document::<Order>)
            .transpose()
    }

    pub async fn list_orders_by_buyer(&self, email: &str) -> MarketResult<Vec<Order>> {
        self.find(&Filter::eq("order.buyerEmail", email)).await
    }

    pub async fn list_all_orders(&self) -> MarketResult<Vec<Order>> {
        self.find(&Filter::all()).await
    }

    /// Orders containing at least one line of this medicine
    pub async fn list_orders_by_medicine_name(&self, name: &str) -> MarketResult<Vec<Order>> {
        self.find(&Filter::eq("order.items.medicineName", name))
            .await
    }

    /// Mark an order paid by its `_id`, bypassing the gateway
    #[instrument(skip(self))]
    pub async fn manually_mark_paid(&self, order_id: &str) -> MarketResult<UpdateOutcome> {
        let outcome = self
            .store
            .update_one(
                Collection::Orders,
                &Filter::by_id(order_id),
                &Patch::new().set("paymentStatus", PaymentStatus::Paid.as_str()),
            )
            .await?;
        info!(
            "Manual payment acceptance for order {}: modified {}",
            order_id, outcome.modified_count
        );
        Ok(outcome)
    }

    fn payment_request(&self, payload: &OrderPayload, tran_id: &str, amount: f64) -> PaymentRequest {
        PaymentRequest {
            total_amount: amount,
            currency: CURRENCY.to_string(),
            tran_id: tran_id.to_string(),
            success_url: self.urls.success_callback(tran_id),
            fail_url: self.urls.fail_callback(tran_id),
            cancel_url: self.urls.cancel_url.clone(),
            ipn_url: self.urls.ipn_url.clone(),
            shipping_method: "Courier".to_string(),
            product_name: payload.product_name.clone().unwrap_or_default(),
            product_category: "Medicine".to_string(),
            product_profile: "general".to_string(),
            cus_name: payload.buyer_name.clone(),
            cus_email: payload.buyer_email.clone(),
            cus_add1: payload.buyer_address.clone(),
            cus_add2: "Dhaka".to_string(),
            cus_city: "Dhaka".to_string(),
            cus_state: "Dhaka".to_string(),
            cus_postcode: scalar_text(&payload.post_code),
            cus_country: "Bangladesh".to_string(),
            cus_phone: scalar_text(&payload.contact_number),
            cus_fax: "01711111111".to_string(),
            ship_name: "Customer Name".to_string(),
            ship_add1: "Dhaka".to_string(),
            ship_add2: "Dhaka".to_string(),
            ship_city: "Dhaka".to_string(),
            ship_state: "Dhaka".to_string(),
            ship_postcode: 1000,
            ship_country: "Bangladesh".to_string(),
        }
    }

    async fn find(&self, filter: &Filter) -> MarketResult<Vec<Order>> {
        self.store
            .find(Collection::Orders, filter)
            .await?
            .into_iter()
            .map(from_document::<Order>)
            .collect()
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewaySession, PaymentGateway};
    use crate::memory::MemoryStore;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Gateway double that records what it was asked to charge
    #[derive(Default)]
    struct RecordingGateway {
        requests: Mutex<Vec<PaymentRequest>>,
    }

    #[async_trait]
    impl PaymentGateway for RecordingGateway {
        async fn init(&self, request: &PaymentRequest) -> MarketResult<GatewaySession> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(GatewaySession::new(format!(
                "https://sandbox.gateway.test/pay/{}",
                request.tran_id
            )))
        }

        fn gateway_name(&self) -> &'static str {
            "recording"
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        gateway: Arc<RecordingGateway>,
        orders: OrderService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::default());
        let orders = OrderService::new(
            store.clone(),
            gateway.clone(),
            CallbackUrls::new("https://api.test", "https://shop.test"),
        );
        Fixture {
            store,
            gateway,
            orders,
        }
    }

    fn payload() -> OrderPayload {
        OrderPayload {
            items: vec![OrderItem::new("Napa"), OrderItem::new("Seclo")],
            total_bill: serde_json::json!(74),
            buyer_name: "Rahim".to_string(),
            buyer_email: "rahim@example.com".to_string(),
            buyer_address: "Mirpur 10".to_string(),
            post_code: serde_json::json!(1216),
            contact_number: serde_json::json!("01700000000"),
            ..Default::default()
        }
    }

    async fn checkout(f: &Fixture) -> Order {
        let checkout = f.orders.create_order(payload()).await.unwrap();
        f.orders.record_pending(&checkout.order).await.unwrap();
        checkout.order
    }

    #[tokio::test]
    async fn test_create_order_builds_gateway_request() {
        let f = fixture();
        let checkout = f.orders.create_order(payload()).await.unwrap();
        let tran_id = &checkout.order.transaction_id;

        assert_eq!(checkout.url, format!("https://sandbox.gateway.test/pay/{}", tran_id));
        assert_eq!(checkout.order.payment_status, PaymentStatus::Pending);
        assert_eq!(checkout.order.order.product_name.as_deref(), Some("Napa, Seclo"));

        let requests = f.gateway.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.total_amount, 74.0);
        assert_eq!(request.currency, "BDT");
        assert_eq!(request.success_url, format!("https://api.test/payment/success/{}", tran_id));
        assert_eq!(request.fail_url, format!("https://api.test/payment/fail/{}", tran_id));
        assert_eq!(request.cus_postcode, "1216");
        assert_eq!(request.cus_phone, "01700000000");
        assert_eq!(request.ship_postcode, 1000);

        // Nothing is stored until the caller records the order
        assert_eq!(f.store.count(Collection::Orders), 0);
    }

    #[tokio::test]
    async fn test_empty_order_is_rejected_before_the_gateway() {
        let f = fixture();
        let err = f
            .orders
            .create_order(OrderPayload::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(f.gateway.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_total_bill_as_numeric_string() {
        let f = fixture();
        let mut order = payload();
        order.total_bill = serde_json::json!("74.50");
        let checkout = f.orders.create_order(order).await.unwrap();

        assert_eq!(f.gateway.requests.lock().unwrap()[0].total_amount, 74.5);
        // Stored as submitted
        assert_eq!(checkout.order.order.total_bill, serde_json::json!("74.50"));
    }

    #[tokio::test]
    async fn test_unreadable_total_bill_is_rejected() {
        let f = fixture();
        let mut order = payload();
        order.total_bill = serde_json::json!("seventy");
        let err = f.orders.create_order(order).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(f.gateway.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_callback_marks_paid() {
        let f = fixture();
        let order = checkout(&f).await;

        let outcome = f.orders.confirm_success(&order.transaction_id).await.unwrap();
        assert_eq!(
            outcome,
            CallbackOutcome::Redirect(format!(
                "https://shop.test/payment/success/{}",
                order.transaction_id
            ))
        );

        let stored = f
            .orders
            .get_order_by_transaction(&order.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);

        // A repeated success modifies nothing, so no second redirect
        let again = f.orders.confirm_success(&order.transaction_id).await.unwrap();
        assert_eq!(again, CallbackOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_failure_after_success_deletes_paid_order() {
        let f = fixture();
        let order = checkout(&f).await;
        f.orders.confirm_success(&order.transaction_id).await.unwrap();

        // Unsafe transition: the paid order is discarded
        let outcome = f.orders.confirm_failure(&order.transaction_id).await.unwrap();
        assert!(matches!(outcome, CallbackOutcome::Redirect(_)));
        assert!(f
            .orders
            .get_order_by_transaction(&order.transaction_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_failure_for_unknown_transaction() {
        let f = fixture();
        checkout(&f).await;

        let outcome = f.orders.confirm_failure("no-such-tran").await.unwrap();
        assert_eq!(outcome, CallbackOutcome::Ignored);
        assert_eq!(f.store.count(Collection::Orders), 1);
    }

    #[tokio::test]
    async fn test_order_queries() {
        let f = fixture();
        let first = checkout(&f).await;

        let mut other = payload();
        other.buyer_email = "karim@example.com".to_string();
        other.items = vec![OrderItem::new("Ace")];
        let second = f.orders.create_order(other).await.unwrap();
        f.orders.record_pending(&second.order).await.unwrap();

        assert_eq!(f.orders.list_all_orders().await.unwrap().len(), 2);

        let rahim = f.orders.list_orders_by_buyer("rahim@example.com").await.unwrap();
        assert_eq!(rahim.len(), 1);
        assert_eq!(rahim[0].transaction_id, first.transaction_id);

        let seclo = f.orders.list_orders_by_medicine_name("Seclo").await.unwrap();
        assert_eq!(seclo.len(), 1);
        let ace = f.orders.list_orders_by_medicine_name("Ace").await.unwrap();
        assert_eq!(ace[0].order.buyer_email, "karim@example.com");
    }

    #[tokio::test]
    async fn test_manual_mark_paid_by_id() {
        let f = fixture();
        let order = checkout(&f).await;
        let stored = f
            .orders
            .get_order_by_transaction(&order.transaction_id)
            .await
            .unwrap()
            .unwrap();
        let id = stored.id.unwrap();

        let outcome = f.orders.manually_mark_paid(&id).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::new(1, 1));
        assert!(f
            .orders
            .get_order_by_transaction(&order.transaction_id)
            .await
            .unwrap()
            .unwrap()
            .is_paid());
    }
}
