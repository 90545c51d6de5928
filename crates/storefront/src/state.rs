//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::Services;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; gives handlers the configuration, the
/// database pool (for health checks) and the wired services.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    services: Services,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool, services: Services) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                services,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the wired services.
    #[must_use]
    pub fn services(&self) -> &Services {
        &self.inner.services
    }
}
