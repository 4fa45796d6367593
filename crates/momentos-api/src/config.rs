//! API configuration.

use std::time::Duration;

/// Development-only signing secret for host sessions.
pub const DEV_JWT_SECRET: &str = "momentos-dev-secret";

/// Where albums and media are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local stores, lost on restart.
    Memory,
    /// Firestore documents and R2 objects.
    Cloud,
}

impl StoreBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "cloud" | "firestore" => Some(Self::Cloud),
            _ => None,
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second
    pub rate_limit_rps: u32,
    /// Rate limit burst
    pub rate_limit_burst: u32,
    /// Per-IP rate on the public upload and guest routes
    pub upload_rate_limit_rps: u32,
    /// Request timeout
    pub request_timeout: Duration,
    /// An upload still running after this is cancelled
    pub upload_timeout: Duration,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// HS256 secret shared with the auth service
    pub jwt_secret: String,
    /// Expected `iss` claim, unchecked when unset
    pub jwt_issuer: Option<String>,
    pub store_backend: StoreBackend,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            rate_limit_burst: 20,
            upload_rate_limit_rps: 5,
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(120),
            max_body_size: 64 * 1024 * 1024, // 64MB
            environment: "development".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_issuer: None,
            store_backend: StoreBackend::Memory,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_or("API_PORT", defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_or("RATE_LIMIT_RPS", defaults.rate_limit_rps),
            rate_limit_burst: env_or("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            upload_rate_limit_rps: env_or("UPLOAD_RATE_LIMIT_RPS", defaults.upload_rate_limit_rps),
            request_timeout: Duration::from_secs(env_or("REQUEST_TIMEOUT", 30)),
            upload_timeout: Duration::from_secs(env_or("UPLOAD_TIMEOUT", 120)),
            max_body_size: env_or("MAX_BODY_SIZE", defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            jwt_issuer: std::env::var("JWT_ISSUER").ok().filter(|s| !s.is_empty()),
            store_backend: std::env::var("STORE_BACKEND")
                .ok()
                .and_then(|s| StoreBackend::parse(&s))
                .unwrap_or(defaults.store_backend),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_store_backend() {
        assert_eq!(StoreBackend::parse("memory"), Some(StoreBackend::Memory));
        assert_eq!(StoreBackend::parse(" Firestore "), Some(StoreBackend::Cloud));
        assert_eq!(StoreBackend::parse("redis"), None);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("API_PORT", "9001");
        std::env::set_var("STORE_BACKEND", "cloud");
        std::env::set_var("UPLOAD_TIMEOUT", "5");
        std::env::set_var("JWT_ISSUER", "");

        let config = ApiConfig::from_env();
        assert_eq!(config.port, 9001);
        assert_eq!(config.store_backend, StoreBackend::Cloud);
        assert_eq!(config.upload_timeout, Duration::from_secs(5));
        assert!(config.jwt_issuer.is_none());
        assert!(!config.is_production());

        std::env::remove_var("API_PORT");
        std::env::remove_var("STORE_BACKEND");
        std::env::remove_var("UPLOAD_TIMEOUT");
        std::env::remove_var("JWT_ISSUER");
    }
}
