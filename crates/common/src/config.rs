use std::time::Duration;

use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Maximum send attempts per dispatch, including the first (default: 3, min 1)
    pub max_attempts: u32,

    /// Base backoff delay between send attempts in milliseconds (default: 1000)
    pub base_delay_ms: u64,

    /// Simulated email channel latency in milliseconds (default: 1000)
    pub email_latency_ms: u64,

    /// Simulated chat channel latency in milliseconds (default: 200)
    pub chat_latency_ms: u64,

    /// Probability in [0, 1) that a simulated send attempt fails (default: 0.1)
    pub fault_probability: f64,

    /// Address the API server binds to (default: 0.0.0.0:8080)
    pub bind_addr: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            max_attempts: std::env::var("MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MAX_ATTEMPTS must be a valid u32"))?,
            base_delay_ms: std::env::var("BASE_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BASE_DELAY_MS must be a valid u64"))?,
            email_latency_ms: std::env::var("EMAIL_LATENCY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("EMAIL_LATENCY_MS must be a valid u64"))?,
            chat_latency_ms: std::env::var("CHAT_LATENCY_MS")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("CHAT_LATENCY_MS must be a valid u64"))?,
            fault_probability: std::env::var("FAULT_PROBABILITY")
                .unwrap_or_else(|_| "0.1".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("FAULT_PROBABILITY must be a valid f64"))?,
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts < 1 {
            anyhow::bail!("MAX_ATTEMPTS must be at least 1");
        }
        if self.base_delay_ms == 0 {
            anyhow::bail!("BASE_DELAY_MS must be greater than 0");
        }
        if !(0.0..1.0).contains(&self.fault_probability) {
            anyhow::bail!("FAULT_PROBABILITY must be in [0, 1)");
        }
        Ok(())
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn email_latency(&self) -> Duration {
        Duration::from_millis(self.email_latency_ms)
    }

    pub fn chat_latency(&self) -> Duration {
        Duration::from_millis(self.chat_latency_ms)
    }
}
