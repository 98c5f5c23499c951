//! # Request Handlers
//!
//! Axum request handlers for the marketplace API.
//! Handlers stay thin: extract, call a service, serialize the store result.

use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use medi_core::{
    CallbackOutcome, CartItem, Category, MarketError, Medicine, OrderPayload, QuantityChange, User,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// `?email=` filter on list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct EmailQuery {
    #[serde(default)]
    pub email: Option<String>,
}

/// `?buyerEmail=` filter for clearing a cart
#[derive(Debug, Default, Deserialize)]
pub struct BuyerQuery {
    #[serde(default, rename = "buyerEmail")]
    pub buyer_email: Option<String>,
}

/// Body of `PATCH /carts/{id}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityUpdateRequest {
    /// `increase` or `decrease`
    #[serde(default, rename = "type")]
    pub change: Option<String>,
    /// Sent by the storefront, not used for matching
    #[serde(default)]
    pub buyer_email: Option<String>,
}

/// Body of `PATCH /user/{email}`
#[derive(Debug, Default, Deserialize)]
pub struct RoleUpdateRequest {
    #[serde(default)]
    pub role: Option<Value>,
}

/// Create order response
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    /// Hosted payment page (redirect the buyer here)
    pub url: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }
}

/// Handler error: a [`MarketError`] rendered as `{ message, code }`
#[derive(Debug)]
pub struct ApiError(pub MarketError);

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.status_code();
        if code >= 500 {
            error!("Request failed: {}", self.0);
        }
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::new(self.0.to_string(), code))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(MarketError::InvalidRequest(rejection.body_text()))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// JSON request body whose rejections render like every other error
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

fn callback_response(outcome: CallbackOutcome) -> Response {
    match outcome {
        CallbackOutcome::Redirect(url) => Redirect::to(&url).into_response(),
        CallbackOutcome::Ignored => StatusCode::NO_CONTENT.into_response(),
    }
}

// =============================================================================
// Service
// =============================================================================

/// Root banner
pub async fn root() -> &'static str {
    "MediTrust server"
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "meditrust",
        "store": state.store.backend_name(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// =============================================================================
// Orders & Payment Callbacks
// =============================================================================

/// Create an order: answer with the gateway URL, then record it as pending
#[instrument(skip(state, payload), fields(items = payload.items.len()))]
pub async fn create_order(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<OrderPayload>,
) -> ApiResult<Json<CheckoutResponse>> {
    let checkout = state.orders.create_order(payload).await?;

    let orders = state.orders.clone();
    let order = checkout.order;
    tokio::spawn(async move {
        if let Err(e) = orders.record_pending(&order).await {
            error!(
                "Failed to record pending order {}: {}",
                order.transaction_id, e
            );
        }
    });

    Ok(Json(CheckoutResponse { url: checkout.url }))
}

/// Gateway success callback
#[instrument(skip(state))]
pub async fn payment_success(
    State(state): State<AppState>,
    Path(tran_id): Path<String>,
) -> ApiResult<Response> {
    let outcome = state.orders.confirm_success(&tran_id).await?;
    Ok(callback_response(outcome))
}

/// Gateway failure callback
#[instrument(skip(state))]
pub async fn payment_fail(
    State(state): State<AppState>,
    Path(tran_id): Path<String>,
) -> ApiResult<Response> {
    let outcome = state.orders.confirm_failure(&tran_id).await?;
    Ok(callback_response(outcome))
}

/// Order by transaction id, `null` when absent
pub async fn get_order(
    State(state): State<AppState>,
    Path(tran_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.orders.get_order_by_transaction(&tran_id).await?))
}

pub async fn orders_by_buyer(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.orders.list_orders_by_buyer(&email).await?))
}

pub async fn all_orders(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.orders.list_all_orders().await?))
}

/// Orders containing an item with the given medicine name
pub async fn orders_by_medicine(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.orders.list_orders_by_medicine_name(&name).await?))
}

/// Mark an order paid by document id
#[instrument(skip(state))]
pub async fn mark_order_paid(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.orders.manually_mark_paid(&id).await?))
}

// =============================================================================
// Catalog
// =============================================================================

pub async fn list_medicines(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.catalog.list_medicines().await?))
}

#[instrument(skip(state, medicine), fields(name = medicine.name().unwrap_or_default()))]
pub async fn add_medicine(
    State(state): State<AppState>,
    JsonBody(medicine): JsonBody<Medicine>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.catalog.add_medicine(medicine).await?))
}

pub async fn medicines_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.catalog.list_medicines_by_category(&category).await?))
}

pub async fn add_category(
    State(state): State<AppState>,
    JsonBody(category): JsonBody<Category>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.catalog.add_category(category).await?))
}

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.catalog.list_categories().await?))
}

#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.catalog.delete_category(&id).await?))
}

// =============================================================================
// Cart
// =============================================================================

/// Cart lines, optionally for one buyer
pub async fn list_cart(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.carts.list_cart_for_buyer(query.email.as_deref()).await?))
}

#[instrument(skip(state, item), fields(buyer = %item.buyer_email, medicine = %item.medicine_name))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    JsonBody(item): JsonBody<CartItem>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.carts.add_to_cart(item).await?))
}

/// Step a cart line's quantity up or down by one
#[instrument(skip(state, request))]
pub async fn update_cart_quantity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<QuantityUpdateRequest>,
) -> ApiResult<impl IntoResponse> {
    let change: QuantityChange = request.change.as_deref().unwrap_or_default().parse()?;
    Ok(Json(state.carts.update_quantity(&id, change).await?))
}

/// Cart line by id, `null` when absent
pub async fn get_cart_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.carts.get_cart_item(&id).await?))
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.carts.remove_cart_item(&id).await?))
}

/// Empty a buyer's cart
#[instrument(skip(state))]
pub async fn clear_cart(
    State(state): State<AppState>,
    Query(query): Query<BuyerQuery>,
) -> ApiResult<impl IntoResponse> {
    if query.buyer_email.is_none() {
        warn!("Clearing carts without buyerEmail only matches lines with no buyer");
    }
    Ok(Json(
        state
            .carts
            .remove_all_for_buyer(query.buyer_email.as_deref())
            .await?,
    ))
}

// =============================================================================
// Users & Roles
// =============================================================================

#[instrument(skip(state, user), fields(email = %user.email))]
pub async fn register_user(
    State(state): State<AppState>,
    JsonBody(user): JsonBody<User>,
) -> ApiResult<impl IntoResponse> {
    let registration = state.users.register_user(user).await?;
    if !registration.is_created() {
        info!("Registration skipped, user already exists");
    }
    Ok(Json(registration))
}

pub async fn all_users(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.users.list_all_users().await?))
}

pub async fn users_by_email(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.users.find_users_by_email(query.email.as_deref()).await?))
}

#[instrument(skip(state, request))]
pub async fn set_role(
    State(state): State<AppState>,
    Path(email): Path<String>,
    JsonBody(request): JsonBody<RoleUpdateRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.users.set_role(&email, request.role).await?))
}

pub async fn check_admin(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let is_admin = state.users.is_admin(&email).await?;
    Ok(Json(serde_json::json!({ "isAdmin": is_admin })))
}

pub async fn check_seller(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let is_seller = state.users.is_seller(&email).await?;
    Ok(Json(serde_json::json!({ "isSeller": is_seller })))
}
