/// Configuration management for the GradAid service
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub credits: CreditsConfig,
    pub generation: GenerationConfig,
    pub rate_limit: RateLimitConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider
    pub identity_jwt_secret: String,
    /// Shared secret the identity provider sends with webhook calls
    pub webhook_secret: String,
}

/// AI credit metering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditsConfig {
    pub default_total: i64,
    pub reset_period_days: i64,
    pub sop_cost: i64,
    pub lor_cost: i64,
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self {
            default_total: 500,
            reset_period_days: 30,
            sop_cost: 5,
            lor_cost: 3,
        }
    }
}

/// Language-model service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub service_url: String,
    /// No timeout when unset
    pub timeout_secs: Option<u64>,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub authenticated_rps: u32,
    pub unauthenticated_rps: u32,
    pub burst_size: u32,
}

/// Background job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub credit_reset_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("GRADAID_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("GRADAID_PORT")
            .unwrap_or_else(|_| "3210".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let version = env::var("GRADAID_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let data_directory: PathBuf = env::var("GRADAID_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("GRADAID_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("gradaid.sqlite"));

        let identity_jwt_secret = env::var("GRADAID_IDENTITY_JWT_SECRET")
            .map_err(|_| AppError::Validation("Identity JWT secret required".to_string()))?;
        let webhook_secret = env::var("GRADAID_WEBHOOK_SECRET")
            .map_err(|_| AppError::Validation("Webhook secret required".to_string()))?;

        let defaults = CreditsConfig::default();
        let credits = CreditsConfig {
            default_total: env_or("GRADAID_CREDITS_DEFAULT_TOTAL", defaults.default_total),
            reset_period_days: env_or("GRADAID_CREDITS_RESET_DAYS", defaults.reset_period_days),
            sop_cost: env_or("GRADAID_CREDITS_SOP_COST", defaults.sop_cost),
            lor_cost: env_or("GRADAID_CREDITS_LOR_COST", defaults.lor_cost),
        };

        let generation = GenerationConfig {
            service_url: env::var("GRADAID_LLM_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            timeout_secs: env::var("GRADAID_LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
        };

        let rate_limit = RateLimitConfig {
            enabled: env_or("GRADAID_RATE_LIMITS_ENABLED", true),
            authenticated_rps: env_or("GRADAID_RATE_LIMIT_AUTHENTICATED_RPS", 100),
            unauthenticated_rps: env_or("GRADAID_RATE_LIMIT_UNAUTHENTICATED_RPS", 10),
            burst_size: env_or("GRADAID_RATE_LIMIT_BURST", 50),
        };

        let jobs = JobsConfig {
            credit_reset_interval_secs: env_or("GRADAID_CREDIT_RESET_INTERVAL_SECS", 3600),
        };

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            authentication: AuthConfig {
                identity_jwt_secret,
                webhook_secret,
            },
            credits,
            generation,
            rate_limit,
            jobs,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.identity_jwt_secret.len() < 32 {
            return Err(AppError::Validation(
                "Identity JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.webhook_secret.is_empty() {
            return Err(AppError::Validation("Webhook secret cannot be empty".to_string()));
        }

        if self.credits.default_total <= 0 || self.credits.reset_period_days <= 0 {
            return Err(AppError::Validation(
                "Credit allocation and reset period must be positive".to_string(),
            ));
        }

        if self.credits.sop_cost <= 0 || self.credits.lor_cost <= 0 {
            return Err(AppError::Validation("Generation costs must be positive".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 3210,
            version: "test".to_string(),
        },
        storage: StorageConfig {
            data_directory: PathBuf::from("./data"),
            database: PathBuf::from("./data/test.sqlite"),
        },
        authentication: AuthConfig {
            identity_jwt_secret: "test-secret-that-is-at-least-32-characters".to_string(),
            webhook_secret: "webhook-secret".to_string(),
        },
        credits: CreditsConfig::default(),
        generation: GenerationConfig {
            service_url: "http://localhost:5000".to_string(),
            timeout_secs: None,
        },
        rate_limit: RateLimitConfig {
            enabled: false,
            authenticated_rps: 100,
            unauthenticated_rps: 10,
            burst_size: 50,
        },
        jobs: JobsConfig {
            credit_reset_interval_secs: 3600,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_test_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = test_config();
        config.authentication.identity_jwt_secret = "short".to_string();
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_credit_defaults() {
        let credits = CreditsConfig::default();
        assert_eq!(credits.default_total, 500);
        assert_eq!(credits.reset_period_days, 30);
        assert_eq!(credits.sop_cost, 5);
        assert_eq!(credits.lor_cost, 3);
    }
}
