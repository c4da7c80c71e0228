use common::delhivery::{DelhiveryConfig, DELHIVERY_STAGING_URL};
use common::http::{CorsConfig, HttpLoggingConfig, HttpServerConfig};
use common::postgres::PostgresConfig;
use common::telemetry::{LogFormat, TelemetryConfig};
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Stdout log encoding: json or pretty
    #[serde(default)]
    pub log_format: LogFormat,

    // HTTP server
    #[serde(default = "default_http_host")]
    pub http_host: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// CORS allowed origins (comma-separated, "*" for all). Empty disables CORS.
    #[serde(default)]
    pub http_cors_allowed_origins: String,

    /// Path prefixes excluded from request logging (comma-separated)
    #[serde(default = "default_http_ignored_paths")]
    pub http_ignored_paths: String,

    /// Bearer key required on /api/*; empty disables the check
    #[serde(default)]
    pub admin_api_key: String,

    // PostgreSQL
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    #[serde(default = "default_postgres_migrations_dir")]
    pub postgres_migrations_dir: String,

    #[serde(default = "default_postgres_goose_binary_path")]
    pub postgres_goose_binary_path: String,

    // Delhivery
    #[serde(default = "default_delhivery_base_url")]
    pub delhivery_base_url: String,

    #[serde(default)]
    pub delhivery_api_token: String,

    /// Client name sent with bulk waybill requests
    #[serde(default)]
    pub delhivery_client_name: String,

    /// Registered warehouse name used for manifests and pickups
    #[serde(default = "default_delhivery_pickup_location")]
    pub delhivery_pickup_location: String,

    /// Seller name used when an order carries none
    #[serde(default = "default_delhivery_seller_name")]
    pub delhivery_seller_name: String,

    #[serde(default = "default_delhivery_timeout_secs")]
    pub delhivery_timeout_secs: u64,

    /// Serve flagged demo data when the carrier rejects the token
    #[serde(default)]
    pub carrier_demo_fallback: bool,

    /// Age after which cached serviceability is refreshed; 0 never expires
    #[serde(default)]
    pub serviceability_max_age_hours: i64,

    // OpenTelemetry
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default)]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_ignored_paths() -> String {
    "/healthz".to_string()
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "dispatch".to_string()
}

fn default_postgres_username() -> String {
    "dispatch".to_string()
}

fn default_postgres_password() -> String {
    "dispatch".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

fn default_postgres_migrations_dir() -> String {
    "crates/common/migrations/postgres".to_string()
}

fn default_postgres_goose_binary_path() -> String {
    "goose".to_string()
}

fn default_delhivery_base_url() -> String {
    DELHIVERY_STAGING_URL.to_string()
}

fn default_delhivery_pickup_location() -> String {
    "Main Warehouse".to_string()
}

fn default_delhivery_seller_name() -> String {
    "Dispatch".to_string()
}

fn default_delhivery_timeout_secs() -> u64 {
    30
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "dispatch".to_string()
}

fn split_comma_separated(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Environment::with_prefix("DISPATCH"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.serviceability_max_age_hours > 0
            && chrono::Duration::try_hours(self.serviceability_max_age_hours).is_none()
        {
            return Err(ConfigError::Message(format!(
                "serviceability_max_age_hours {} is out of range",
                self.serviceability_max_age_hours
            )));
        }
        Ok(())
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.otel_service_name.clone(),
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
            log_format: self.log_format,
        }
    }

    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
            migrations_dir: self.postgres_migrations_dir.clone(),
            goose_binary_path: self.postgres_goose_binary_path.clone(),
        }
    }

    pub fn delhivery_config(&self) -> DelhiveryConfig {
        let mut config = DelhiveryConfig::new(&self.delhivery_base_url, &self.delhivery_api_token);
        config.client_name = self.delhivery_client_name.clone();
        config.timeout = Duration::from_secs(self.delhivery_timeout_secs);
        config
    }

    pub fn http_config(&self) -> HttpServerConfig {
        let cors_config = if self.http_cors_allowed_origins.trim().is_empty() {
            None
        } else {
            Some(CorsConfig::from_comma_separated(
                &self.http_cors_allowed_origins,
            ))
        };

        HttpServerConfig {
            host: self.http_host.clone(),
            port: self.http_port,
            logging_config: HttpLoggingConfig::new(split_comma_separated(&self.http_ignored_paths)),
            cors_config,
        }
    }

    pub fn admin_api_key(&self) -> Option<String> {
        Some(self.admin_api_key.clone()).filter(|k| !k.is_empty())
    }

    pub fn serviceability_max_age(&self) -> Option<chrono::Duration> {
        (self.serviceability_max_age_hours > 0)
            .then(|| chrono::Duration::try_hours(self.serviceability_max_age_hours))
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // env vars are process-global
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 6] = [
        "DISPATCH_LOG_LEVEL",
        "DISPATCH_HTTP_PORT",
        "DISPATCH_SERVICEABILITY_MAX_AGE_HOURS",
        "DISPATCH_HTTP_CORS_ALLOWED_ORIGINS",
        "DISPATCH_CARRIER_DEMO_FALLBACK",
        "DISPATCH_LOG_FORMAT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.http_port, 8080);
        assert!(!config.carrier_demo_fallback);
        assert!(config.serviceability_max_age().is_none());
        assert!(config.http_config().cors_config.is_none());
        assert!(config.admin_api_key().is_none());
        assert_eq!(config.delhivery_config().base_url, DELHIVERY_STAGING_URL);
    }

    #[test]
    fn test_oversized_serviceability_max_age_is_rejected() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var(
            "DISPATCH_SERVICEABILITY_MAX_AGE_HOURS",
            i64::MAX.to_string(),
        );

        let result = ServiceConfig::from_env();
        clear_env();

        match result {
            Err(ConfigError::Message(message)) => assert!(message.contains("out of range")),
            other => panic!("expected a config error, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("DISPATCH_LOG_LEVEL", "debug");
        std::env::set_var("DISPATCH_HTTP_PORT", "9090");
        std::env::set_var("DISPATCH_SERVICEABILITY_MAX_AGE_HOURS", "24");
        std::env::set_var("DISPATCH_HTTP_CORS_ALLOWED_ORIGINS", "https://admin.example.com");
        std::env::set_var("DISPATCH_CARRIER_DEMO_FALLBACK", "true");
        std::env::set_var("DISPATCH_LOG_FORMAT", "pretty");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.http_config().port, 9090);
        assert_eq!(
            config.serviceability_max_age(),
            Some(chrono::Duration::hours(24))
        );
        assert!(config.carrier_demo_fallback);
        assert_eq!(config.telemetry_config().log_format, LogFormat::Pretty);
        assert_eq!(
            config.http_config().cors_config.unwrap().allowed_origins,
            vec!["https://admin.example.com"]
        );

        clear_env();
    }
}
