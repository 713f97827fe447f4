//! Command implementations and the shared session they run against.

pub mod cart;
pub mod checkout;
pub mod orders;

use std::sync::Arc;

use thiserror::Error;

use pomelo_client::cache::{CacheError, CacheStore};
use pomelo_client::cart::CartStore;
use pomelo_client::checkout::CheckoutOrchestrator;
use pomelo_client::config::{ClientConfig, ConfigError};
use pomelo_client::gateway::{GatewayError, HttpOrderGateway, OrderGateway};
use pomelo_client::orders::OrderClassifier;
use pomelo_client::profile::HttpProfileDirectory;
use pomelo_client::StoreError;

/// Errors that can occur while assembling a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The cache file could not be opened.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// An HTTP client could not be built.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A restored cart or order reference is unreadable.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything one CLI invocation needs, wired from environment config.
pub struct Session {
    pub cart: Arc<CartStore>,
    pub orchestrator: CheckoutOrchestrator,
    pub classifier: OrderClassifier,
}

impl Session {
    /// Build a session from environment variables.
    ///
    /// With `POMELO_CACHE_PATH` set, state persists across invocations;
    /// without it, each invocation starts from an empty cache.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is missing or invalid, the cache
    /// file is unreadable, or an HTTP client cannot be built.
    pub fn from_env() -> Result<Self, SessionError> {
        let config = ClientConfig::from_env()?;

        let cache_store = match &config.cache_path {
            Some(path) => CacheStore::open(path)?,
            None => CacheStore::in_memory(),
        };

        let gateway: Arc<dyn OrderGateway> = Arc::new(HttpOrderGateway::new(&config.api)?);
        let profiles = Arc::new(HttpProfileDirectory::new(&config.api)?);

        let cart = Arc::new(CartStore::new(Arc::clone(&gateway), cache_store.handle())?);
        let orchestrator = CheckoutOrchestrator::new(
            Arc::clone(&gateway),
            profiles,
            Arc::clone(&cart),
            cache_store.handle(),
        );
        let classifier = OrderClassifier::new(gateway);

        Ok(Self {
            cart,
            orchestrator,
            classifier,
        })
    }
}
