use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub admission: AdmissionConfig,
    pub auth: AuthConfig,
    pub images: ImageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_tracing: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    pub api_base_url: String,
    pub uploads_base_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Additional attempts after the first throttled one.
    pub max_retries: u32,
    pub default_retry_after_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub manga_ttl_secs: u64,
    pub feed_ttl_secs: u64,
    pub chapter_ttl_secs: u64,
    pub image_ttl_secs: u64,
    /// Upper bound on live entries; 0 disables the bound.
    pub max_entries: usize,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionPolicy {
    /// Wait `delay_ms` and let the request through anyway.
    Delay,
    /// Answer 429 immediately.
    Reject,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdmissionConfig {
    pub max_requests: usize,
    pub window_ms: u64,
    pub policy: AdmissionPolicy,
    pub delay_ms: u64,
    pub idle_eviction_secs: u64,
}

impl AdmissionConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub authorize_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: Option<Secret<String>>,
    /// Public origin of this service, used to build the redirect URI.
    pub app_url: String,
    pub secure_cookies: bool,
    pub token_max_age_secs: i64,
    pub refresh_max_age_secs: i64,
}

impl AuthConfig {
    pub fn redirect_uri(&self) -> String {
        format!("{}/api/auth/callback", self.app_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImageConfig {
    /// Hosts `/api/proxy-image` may fetch from; `*.example.org` matches subdomains.
    pub allowed_hosts: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("MIKAREADS_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map APP__SERVER__PORT=3000 to server.port
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 3000,
                enable_tracing: true,
            },
            upstream: UpstreamConfig {
                api_base_url: "https://api.mangadex.org".into(),
                uploads_base_url: "https://uploads.mangadex.org".into(),
                user_agent: "Mikareads/1.0 (https://mika-anime.vercel.app)".into(),
                timeout_ms: 25_000,
            },
            retry: RetryConfig {
                max_retries: 2,
                default_retry_after_ms: 1000,
                max_backoff_ms: 3000,
            },
            cache: CacheConfig {
                manga_ttl_secs: 600,
                feed_ttl_secs: 600,
                chapter_ttl_secs: 600,
                image_ttl_secs: 3600,
                max_entries: 1024,
            },
            admission: AdmissionConfig {
                max_requests: 4,
                window_ms: 1000,
                policy: AdmissionPolicy::Delay,
                delay_ms: 200,
                idle_eviction_secs: 60,
            },
            auth: AuthConfig {
                authorize_url:
                    "https://auth.mangadex.org/realms/mangadex/protocol/openid-connect/auth".into(),
                token_url: "https://auth.mangadex.org/realms/mangadex/protocol/openid-connect/token"
                    .into(),
                client_id: String::new(),
                client_secret: None,
                app_url: "http://localhost:3000".into(),
                secure_cookies: false,
                token_max_age_secs: 60 * 60 * 24 * 30,
                refresh_max_age_secs: 60 * 60 * 24 * 365,
            },
            images: ImageConfig {
                allowed_hosts: vec!["uploads.mangadex.org".into(), "*.mangadex.network".into()],
            },
            logging: LoggingConfig {
                filter: "info,mikareads=debug".into(),
                json: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_uri_trims_trailing_slash() {
        let mut auth = AppConfig::default().auth;
        auth.app_url = "https://mika.example/".into();
        assert_eq!(auth.redirect_uri(), "https://mika.example/api/auth/callback");
    }

    #[test]
    fn test_admission_policy_deserializes_lowercase() {
        let policy: AdmissionPolicy = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(policy, AdmissionPolicy::Reject);
    }
}
