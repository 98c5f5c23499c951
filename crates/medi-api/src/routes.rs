//! # Routes
//!
//! Axum router configuration for the marketplace API.
//! Paths match what the storefront already calls.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Orders & payment:
///   - POST /order, GET /order/{tranId}, GET /order/user/{buyerEmail}
///   - GET /allOrders, GET /orders/medicineName/{medicineName}
///   - PATCH /order/update/{id}
///   - POST /payment/success/{tranId}, POST /payment/fail/{tranId}
///
/// - Catalog:
///   - GET /medicines, POST /medicine, GET /medicine/{category}
///   - POST /category, GET /categories, DELETE /category/{id}
///
/// - Cart:
///   - GET|POST|DELETE /carts, GET|PATCH|DELETE /carts/{id}
///
/// - Users:
///   - POST|GET /users, GET /allUsers, PATCH /user/{email}
///   - GET /users/admin/{email}, GET /users/seller/{email}
pub fn create_router(state: AppState) -> Router {
    // The storefront is served from another origin and sends no credentials
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let order_routes = Router::new()
        .route("/order", post(handlers::create_order))
        .route("/order/{tran_id}", get(handlers::get_order))
        .route("/order/user/{buyer_email}", get(handlers::orders_by_buyer))
        .route("/order/update/{id}", patch(handlers::mark_order_paid))
        .route("/allOrders", get(handlers::all_orders))
        .route(
            "/orders/medicineName/{medicine_name}",
            get(handlers::orders_by_medicine),
        )
        .route("/payment/success/{tran_id}", post(handlers::payment_success))
        .route("/payment/fail/{tran_id}", post(handlers::payment_fail));

    let catalog_routes = Router::new()
        .route("/medicines", get(handlers::list_medicines))
        .route("/medicine", post(handlers::add_medicine))
        .route("/medicine/{category}", get(handlers::medicines_by_category))
        .route("/category", post(handlers::add_category))
        .route("/categories", get(handlers::list_categories))
        .route("/category/{id}", delete(handlers::delete_category));

    let cart_routes = Router::new()
        .route(
            "/carts",
            get(handlers::list_cart)
                .post(handlers::add_to_cart)
                .delete(handlers::clear_cart),
        )
        .route(
            "/carts/{id}",
            get(handlers::get_cart_item)
                .patch(handlers::update_cart_quantity)
                .delete(handlers::remove_cart_item),
        );

    let user_routes = Router::new()
        .route(
            "/users",
            get(handlers::users_by_email).post(handlers::register_user),
        )
        .route("/allUsers", get(handlers::all_users))
        .route("/user/{email}", patch(handlers::set_role))
        .route("/users/admin/{email}", get(handlers::check_admin))
        .route("/users/seller/{email}", get(handlers::check_seller));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(order_routes)
        .merge(catalog_routes)
        .merge(cart_routes)
        .merge(user_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
