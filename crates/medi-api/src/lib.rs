//! # medi-api
//!
//! HTTP API layer for the MediTrust marketplace.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for medicines, categories, carts, users and orders
//! - SSLCommerz success/fail callbacks that redirect the buyer back to the storefront
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/order` | Start a payment, returns `{ url }` |
//! | POST | `/payment/success/{tranId}` | Gateway success callback |
//! | POST | `/payment/fail/{tranId}` | Gateway failure callback |
//! | GET | `/medicines` | List medicines |
//! | GET | `/carts?email=` | A buyer's cart |
//! | PATCH | `/carts/{id}` | Step quantity up or down |
//! | POST | `/users` | Register a user |
//! | GET | `/users/admin/{email}` | `{ isAdmin }` |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState, StoreBackend};
