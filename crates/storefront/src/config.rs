//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `PAYMENT_KEY_ID` - Payment provider key id (public)
//! - `PAYMENT_KEY_SECRET` - Payment provider key secret (API auth and signature HMAC)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `PAYMENT_API_BASE` - Provider API base (default: <https://api.razorpay.com/v1>)
//! - `PAYMENT_CURRENCY` - ISO currency code (default: INR)
//! - `PAYMENT_TIMEOUT_SECS` - Provider request timeout (default: 10)
//! - `DELIVERY_FEE` - Flat home-delivery fee (default: 0)
//! - `FREE_DELIVERY_THRESHOLD` - Order value at which the fee is waived (unset: never)
//! - `DELIVERY_ZONE_POLYGON` - JSON `[[lat, lon], ...]` closed ring (unset: no zone check)
//! - `STORE_NAME`, `STORE_ADDRESS_LINE`, `STORE_CITY`, `STORE_STATE`,
//!   `STORE_POSTAL_CODE`, `STORE_COUNTRY`, `STORE_PHONE` - Pickup address
//! - `MEDIA_ROOT` - Directory holding item images (default: media)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use greenbasket_core::address::ShippingAddress;
use greenbasket_core::geo::DeliveryZone;
use greenbasket_core::pricing::ShippingRule;
use greenbasket_core::types::CurrencyCode;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::services::ServiceSettings;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_PAYMENT_API_BASE: &str = "https://api.razorpay.com/v1";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Payment provider configuration
    pub payment: PaymentConfig,
    /// Delivery fee rules
    pub pricing: PricingConfig,
    /// Home-delivery zone; `None` disables the zone check
    pub delivery_zone: Option<DeliveryZone>,
    /// Pickup address; `None` makes self-pickup unavailable
    pub store_address: Option<ShippingAddress>,
    /// Directory holding item images
    pub media_root: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag (e.g. production, staging)
    pub sentry_environment: Option<String>,
    /// Fraction of error events sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Payment provider configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct PaymentConfig {
    /// API base URL without trailing slash
    pub api_base: String,
    /// Public key id, also handed to the checkout widget
    pub key_id: String,
    /// Key secret: basic-auth password and signature HMAC key
    pub key_secret: SecretString,
    /// Currency orders are created in
    pub currency: CurrencyCode,
    /// Upper bound on every provider request
    pub timeout: Duration,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("currency", &self.currency)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Delivery fee configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PricingConfig {
    pub delivery_fee: Decimal,
    pub free_delivery_threshold: Option<Decimal>,
}

impl PricingConfig {
    #[must_use]
    pub const fn shipping_rule(&self) -> ShippingRule {
        ShippingRule {
            delivery_fee: self.delivery_fee,
            free_delivery_threshold: self.free_delivery_threshold,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    /// An invalid delivery zone or incomplete store address is not an error;
    /// the feature is disabled and a warning is logged.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        let payment = PaymentConfig::from_env()?;
        let pricing = PricingConfig::from_env()?;
        let delivery_zone = load_delivery_zone(get_optional_env("DELIVERY_ZONE_POLYGON").as_deref());
        let store_address = StoreAddressVars::from_env().into_address();
        if store_address.is_none() {
            tracing::warn!("Store address is incomplete; self-pickup orders will be rejected");
        }
        let media_root = PathBuf::from(get_env_or_default("MEDIA_ROOT", "media"));
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = parse_rate("SENTRY_SAMPLE_RATE", 1.0)?;
        let sentry_traces_sample_rate = parse_rate("SENTRY_TRACES_SAMPLE_RATE", 0.0)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            payment,
            pricing,
            delivery_zone,
            store_address,
            media_root,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The subset of configuration the services are built from.
    #[must_use]
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            delivery_zone: self.delivery_zone.clone(),
            shipping: self.pricing.shipping_rule(),
            store_address: self.store_address.clone(),
            payment_key_id: self.payment.key_id.clone(),
            payment_key_secret: self.payment.key_secret.clone(),
            currency: self.payment.currency,
        }
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let currency = get_env_or_default("PAYMENT_CURRENCY", "INR")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("PAYMENT_CURRENCY".to_string(), e))?;
        let timeout_secs = get_env_or_default("PAYMENT_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("PAYMENT_TIMEOUT_SECS".to_string(), e.to_string())
            })?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PAYMENT_TIMEOUT_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            api_base: get_env_or_default("PAYMENT_API_BASE", DEFAULT_PAYMENT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            key_id: get_required_env("PAYMENT_KEY_ID")?,
            key_secret: get_validated_secret("PAYMENT_KEY_SECRET")?,
            currency,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl PricingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let delivery_fee = parse_amount("DELIVERY_FEE", &get_env_or_default("DELIVERY_FEE", "0"))?;
        let free_delivery_threshold = get_optional_env("FREE_DELIVERY_THRESHOLD")
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_amount("FREE_DELIVERY_THRESHOLD", &raw))
            .transpose()?;

        Ok(Self {
            delivery_fee,
            free_delivery_threshold,
        })
    }
}

/// Parse a sampling rate in `[0, 1]`, falling back to `default` when unset.
fn parse_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let rate = raw
        .trim()
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be between 0 and 1".to_string(),
        ));
    }
    Ok(rate)
}

/// Parse a non-negative decimal amount.
fn parse_amount(key: &str, raw: &str) -> Result<Decimal, ConfigError> {
    let amount = raw
        .trim()
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(amount)
}

/// Load the delivery zone from its latitude-first JSON form.
///
/// A missing or blank value disables the zone check. An invalid ring also
/// disables it, with a warning, rather than rejecting every delivery.
#[must_use]
pub fn load_delivery_zone(raw: Option<&str>) -> Option<DeliveryZone> {
    let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;

    match DeliveryZone::from_lat_lon_json(raw) {
        Ok(zone) => {
            tracing::info!(points = zone.ring().len(), "Delivery zone loaded");
            Some(zone)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring invalid DELIVERY_ZONE_POLYGON; zone check disabled");
            None
        }
    }
}

/// Raw store address variables.
#[derive(Debug, Clone, Default)]
pub struct StoreAddressVars {
    pub name: Option<String>,
    pub line: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

impl StoreAddressVars {
    fn from_env() -> Self {
        Self {
            name: get_optional_env("STORE_NAME"),
            line: get_optional_env("STORE_ADDRESS_LINE"),
            city: get_optional_env("STORE_CITY"),
            state: get_optional_env("STORE_STATE"),
            postal_code: get_optional_env("STORE_POSTAL_CODE"),
            country: get_optional_env("STORE_COUNTRY"),
            phone: get_optional_env("STORE_PHONE"),
        }
    }

    /// Build the pickup snapshot, or `None` if any required field is blank.
    /// The phone number is optional.
    #[must_use]
    pub fn into_address(self) -> Option<ShippingAddress> {
        fn present(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Some(ShippingAddress {
            full_name: present(self.name)?,
            phone: present(self.phone).unwrap_or_default(),
            line1: present(self.line)?,
            line2: None,
            landmark: None,
            city: present(self.city)?,
            state: present(self.state)?,
            postal_code: present(self.postal_code)?,
            country: present(self.country)?,
            latitude: None,
            longitude: None,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
