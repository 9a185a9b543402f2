// src/config/mod.rs

use std::env;

/// Upstream forecasting REST API the proxy route forwards to.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub base_url: String,
    /// Bearer token attached when the incoming request carries none.
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_root: String,
    pub upstream: Option<Upstream>,
}

impl Config {
    /// Read configuration from the environment, with the same defaults the
    /// service has always shipped with: port 8080, data under `public/`.
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let data_root = env::var("DATA_ROOT").unwrap_or_else(|_| "public".to_string());
        let upstream = env::var("FORECAST_API_URL").ok().map(|base_url| Upstream {
            base_url,
            token: env::var("FORECAST_API_TOKEN").ok(),
        });

        Config {
            port,
            data_root,
            upstream,
        }
    }
}
