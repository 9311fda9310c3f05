//! API server configuration, `from_env()` throughout.

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub rate_limit_rps: u32,
    pub rate_limit_burst: u32,
    /// Pending queue length above which ingestion is rejected with 429.
    pub queue_high_watermark: u64,
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 20,
            rate_limit_burst: 40,
            queue_high_watermark: 10_000,
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(default.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.rate_limit_rps),
            rate_limit_burst: std::env::var("RATE_LIMIT_BURST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.rate_limit_burst),
            queue_high_watermark: std::env::var("QUEUE_HIGH_WATERMARK")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.queue_high_watermark),
            environment: std::env::var("ENVIRONMENT").unwrap_or(default.environment),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_production() {
        assert!(!ApiConfig::default().is_production());
    }
}
