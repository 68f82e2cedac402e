use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub app: AppConfig,
    pub mail: Option<MailConfig>,
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Skills a volunteer must list before the floor policy lets them through.
    pub min_skill_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        // Mail is optional; once the URL is given the rest must be present.
        let mail = match env::var("MAIL_API_URL") {
            Ok(api_url) => Some(MailConfig {
                api_url,
                api_key: env::var("MAIL_API_KEY")?,
                from: env::var("MAIL_FROM")?,
            }),
            Err(_) => None,
        };

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "memory://".to_string()),

            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            app: AppConfig {
                min_skill_count: env::var("MIN_SKILL_COUNT")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
            },

            mail,

            delivery: DeliveryConfig {
                max_attempts: env::var("DELIVERY_MAX_ATTEMPTS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                backoff_ms: env::var("DELIVERY_BACKOFF_MS")
                    .unwrap_or_else(|_| "500".to_string())
                    .parse()
                    .unwrap_or(500),
            },
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { min_skill_count: 2 }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

impl DeliveryConfig {
    /// Exponential backoff after the given (1-based) failed attempt, capped at 64x the base.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(6);
        Duration::from_millis(self.backoff_ms.saturating_mul(1u64 << exponent))
    }
}
