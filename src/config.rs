//! Application configuration
//!
//! Loads configuration from environment variables with sensible defaults.

use rand::Rng;
use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL URL; without one the in-memory store is used
    pub database_url: Option<String>,
    /// HS256 signing secret for identity tokens
    pub jwt_secret: String,
    /// Frontend assets directory
    pub frontend_dir: String,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
    /// Environment (development/production)
    pub environment: Environment,
    /// Mailbox that receives admin notifications
    pub admin_email: Option<String>,
    /// Sender address on outgoing mail
    pub mail_from: String,
    /// Complaints older than this are archived by the sweep
    pub archive_after_days: i64,
    /// How often the background sweep runs
    pub archive_interval: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        let jwt_secret = resolve_jwt_secret(non_empty_var("JWT_SECRET"), &environment)?;

        let archive_after_days: i64 = parse_var("ARCHIVE_AFTER_DAYS", 365);
        if archive_after_days <= 0 {
            return Err(ConfigError::Invalid(
                "ARCHIVE_AFTER_DAYS must be positive".to_string(),
            ));
        }
        let archive_interval = archive_interval(parse_var("ARCHIVE_INTERVAL_HOURS", 24))?;

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 8080),
            database_url: non_empty_var("DATABASE_URL"),
            jwt_secret,
            frontend_dir: env::var("FRONTEND_DIR").unwrap_or_else(|_| "./public".to_string()),
            max_body_size: parse_var("MAX_BODY_SIZE", 1024 * 1024), // 1MB default
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| parse_origins(&s))
                .unwrap_or_else(|_| vec!["http://localhost:8080".to_string()]),
            environment,
            admin_email: non_empty_var("ADMIN_EMAIL"),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@complaint-desk.local".to_string()),
            archive_after_days,
            archive_interval,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn archive_interval(hours: u64) -> Result<Duration, ConfigError> {
    hours
        .checked_mul(3600)
        .filter(|_| hours > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            ConfigError::Invalid("ARCHIVE_INTERVAL_HOURS must be a positive number of hours".to_string())
        })
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

/// Production must configure a secret. Development falls back to a random one,
/// so tokens do not survive a restart.
fn resolve_jwt_secret(
    configured: Option<String>,
    environment: &Environment,
) -> Result<String, ConfigError> {
    match (configured, environment) {
        (Some(secret), Environment::Production) if secret.len() < 32 => Err(ConfigError::Invalid(
            "JWT_SECRET must be at least 32 characters".to_string(),
        )),
        (Some(secret), _) => Ok(secret),
        (None, Environment::Production) => Err(ConfigError::Missing(
            "JWT_SECRET is required in production".to_string(),
        )),
        (None, Environment::Development) => {
            tracing::warn!("JWT_SECRET not set, generated a random secret for this run");
            let bytes: [u8; 32] = rand::thread_rng().gen();
            Ok(hex::encode(bytes))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
