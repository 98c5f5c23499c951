//! # Application State
//!
//! Shared state for the Axum application.
//! Holds the store handle, the payment gateway and the services built on them.

use medi_core::{
    BoxedGateway, BoxedStore, CallbackUrls, CartService, CatalogSeed, CatalogService,
    MemoryStore, OrderService, UserService,
};
use medi_mongo::MongoStore;
use medi_sslcommerz::SslCommerzGateway;
use std::sync::Arc;

/// Which document store backs the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local store, optionally seeded from TOML
    Memory,
    /// MongoDB at `MONGODB_URI`
    Mongo,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            other => Err(anyhow::anyhow!("Unknown STORE_BACKEND: {}", other)),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL the gateway calls back on
    pub server_url: String,
    /// Storefront base URL buyers are redirected to
    pub client_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Document store backend
    pub store_backend: StoreBackend,
    /// MongoDB connection string
    pub mongodb_uri: Option<String>,
    /// Database name
    pub database_name: String,
    /// TOML catalog seed for the memory backend
    pub seed_catalog: String,
    /// Gateway cancel page
    pub payment_cancel_url: String,
    /// Gateway IPN listener
    pub payment_ipn_url: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        let var = |key: &str, default: String| std::env::var(key).unwrap_or(default);

        Ok(Self {
            host: var("HOST", defaults.host),
            port: match std::env::var("PORT") {
                Ok(p) => p
                    .parse()
                    .map_err(|e| anyhow::anyhow!("Invalid PORT {}: {}", p, e))?,
                Err(_) => defaults.port,
            },
            server_url: var("SERVER_URL", defaults.server_url),
            client_url: var("CLIENT_URL", defaults.client_url),
            environment: var("ENVIRONMENT", defaults.environment),
            store_backend: match std::env::var("STORE_BACKEND") {
                Ok(backend) => backend.parse()?,
                Err(_) => defaults.store_backend,
            },
            mongodb_uri: std::env::var("MONGODB_URI")
                .ok()
                .filter(|uri| !uri.trim().is_empty()),
            database_name: var("DATABASE_NAME", defaults.database_name),
            seed_catalog: var("SEED_CATALOG", defaults.seed_catalog),
            payment_cancel_url: var("PAYMENT_CANCEL_URL", defaults.payment_cancel_url),
            payment_ipn_url: var("PAYMENT_IPN_URL", defaults.payment_ipn_url),
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Callback and redirect URLs for the payment lifecycle
    pub fn callback_urls(&self) -> CallbackUrls {
        CallbackUrls::new(&self.server_url, &self.client_url)
            .with_gateway_pages(&self.payment_cancel_url, &self.payment_ipn_url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            server_url: "http://localhost:5000".to_string(),
            client_url: "http://localhost:5173".to_string(),
            environment: "development".to_string(),
            store_backend: StoreBackend::Memory,
            mongodb_uri: None,
            database_name: "MediTrustDB".to_string(),
            seed_catalog: "config/catalog.toml".to_string(),
            payment_cancel_url: "http://localhost:3030/cancel".to_string(),
            payment_ipn_url: "http://localhost:3030/ipn".to_string(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Store handle, closed on shutdown
    pub store: BoxedStore,
    pub users: UserService,
    pub catalog: CatalogService,
    pub carts: CartService,
    pub orders: OrderService,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create state from the environment: connect the store, configure SSLCommerz
    pub async fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let gateway = SslCommerzGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize SSLCommerz: {}", e))?;
        tracing::info!(
            "SSLCommerz mode: {}",
            if gateway.is_live() { "live" } else { "sandbox" }
        );

        let store = connect_store(&config).await?;
        let state = Self::with_parts(config, store, Arc::new(gateway));

        if state.config.store_backend == StoreBackend::Memory {
            if let Some(seed) = load_seed_catalog(&state.config.seed_catalog)? {
                state.catalog.load_seed(seed).await?;
            }
        }

        Ok(state)
    }

    /// Assemble state from an already constructed store and gateway
    pub fn with_parts(config: AppConfig, store: BoxedStore, gateway: BoxedGateway) -> Self {
        Self {
            users: UserService::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            carts: CartService::new(store.clone()),
            orders: OrderService::new(store.clone(), gateway, config.callback_urls()),
            store,
            config,
        }
    }
}

async fn connect_store(config: &AppConfig) -> anyhow::Result<BoxedStore> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Mongo => {
            let uri = config
                .mongodb_uri
                .as_deref()
                .map(str::trim)
                .filter(|uri| !uri.is_empty())
                .ok_or_else(|| anyhow::anyhow!("MONGODB_URI not set"))?;
            let store = MongoStore::connect(uri, &config.database_name).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Load the catalog seed file, if there is one
fn load_seed_catalog(path: &str) -> anyhow::Result<Option<CatalogSeed>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => {
            tracing::info!("No catalog seed at {}, starting empty", path);
            return Ok(None);
        }
    };

    let seed = CatalogSeed::from_toml(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
    tracing::info!(
        "Loaded seed from {}: {} categories, {} medicines",
        path,
        seed.categories.len(),
        seed.medicines.len()
    );
    Ok(Some(seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5000);
        assert_eq!(config.database_name, "MediTrustDB");
        assert_eq!(config.store_backend, StoreBackend::Memory);
    }

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ..AppConfig::default()
        };

        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("MongoDB".parse::<StoreBackend>().unwrap(), StoreBackend::Mongo);
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_callback_urls_from_config() {
        let config = AppConfig {
            server_url: "https://api.meditrust.example".to_string(),
            ..AppConfig::default()
        };
        let urls = config.callback_urls();
        assert_eq!(
            urls.fail_callback("t9"),
            "https://api.meditrust.example/payment/fail/t9"
        );
        assert_eq!(urls.ipn_url, "http://localhost:3030/ipn");
    }

    #[tokio::test]
    async fn test_blank_mongodb_uri_counts_as_unset() {
        for uri in [None, Some(""), Some("   ")] {
            let config = AppConfig {
                store_backend: StoreBackend::Mongo,
                mongodb_uri: uri.map(str::to_string),
                ..AppConfig::default()
            };
            let err = connect_store(&config).await.err().unwrap();
            assert_eq!(err.to_string(), "MONGODB_URI not set");
        }
    }

    #[test]
    fn test_missing_seed_file_is_not_an_error() {
        assert!(load_seed_catalog("does/not/exist.toml").unwrap().is_none());
    }

    #[test]
    fn test_bundled_seed_parses() {
        let seed = load_seed_catalog(concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/catalog.toml"))
            .unwrap()
            .unwrap();
        assert!(!seed.is_empty());
    }
}
