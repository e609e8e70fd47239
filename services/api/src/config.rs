//! Service configuration loaded from the environment
//!
//! # Environment Variables
//! - `PORT`: listen port (default: 3000)
//! - `APP_ENV`: `production` restricts CORS to `CORS_ALLOWED_ORIGINS` (default: development)
//! - `ADMIN_USERNAME`: admin login name (default: admin)
//! - `ADMIN_PASSWORD` / `ADMIN_PASSWORD_HASH`: plaintext or Argon2 PHC hash, one is required
//! - `SESSION_TTL_SECS`: admin session lifetime (default: 3600)
//! - `AWS_REGION`: bucket region (default: eu-north-1)
//! - `S3_BUCKET_NAME`: image bucket (required)
//! - `S3_ENDPOINT_URL`, `S3_PUBLIC_BASE_URL`: optional S3 overrides
//! - `RATE_LIMIT_MAX_REQUESTS`, `RATE_LIMIT_WINDOW_SECS`: `/api` limit (default: 100 per 900s)
//! - `CONTACT_RELAY_URL`, `CONTACT_RELAY_TOKEN`: optional mail relay endpoint
//! - `CONTACT_RECIPIENT`: inbox receiving contact form messages

use anyhow::{Context, Result};
use config::{Config, Environment};
use ngo_common::s3::S3Config;
use serde::{Deserialize, Deserializer};

use crate::rate_limiter::RateLimiterConfig;

/// Longest admin session accepted from configuration (30 days)
const MAX_SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Application configuration
#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub app_env: String,
    pub admin_username: String,
    pub admin_password: Option<String>,
    pub admin_password_hash: Option<String>,
    pub session_ttl_secs: u64,
    pub aws_region: String,
    pub s3_bucket_name: String,
    pub s3_endpoint_url: Option<String>,
    pub s3_public_base_url: Option<String>,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    #[serde(default, deserialize_with = "comma_separated")]
    pub cors_allowed_origins: Vec<String>,
    pub contact_relay_url: Option<String>,
    pub contact_relay_token: Option<String>,
    pub contact_recipient: String,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_environment(Environment::default())
    }

    /// Load configuration from an explicit environment source
    pub fn from_environment(environment: Environment) -> Result<Self> {
        let config = Config::builder()
            .set_default("port", 3000)?
            .set_default("app_env", "development")?
            .set_default("admin_username", "admin")?
            .set_default("session_ttl_secs", 3600)?
            .set_default("aws_region", "eu-north-1")?
            .set_default("rate_limit_max_requests", 100)?
            .set_default("rate_limit_window_secs", 900)?
            .set_default("contact_recipient", "contact@localhost")?
            .add_source(environment)
            .build()
            .context("Failed to read configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;

        if app_config.admin_password.is_none() && app_config.admin_password_hash.is_none() {
            anyhow::bail!("Either ADMIN_PASSWORD or ADMIN_PASSWORD_HASH must be set");
        }

        if app_config.session_ttl_secs == 0 || app_config.session_ttl_secs > MAX_SESSION_TTL_SECS {
            anyhow::bail!(
                "SESSION_TTL_SECS must be between 1 and {}",
                MAX_SESSION_TTL_SECS
            );
        }

        Ok(app_config)
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn s3_config(&self) -> S3Config {
        S3Config {
            bucket: self.s3_bucket_name.clone(),
            region: self.aws_region.clone(),
            endpoint_url: self.s3_endpoint_url.clone(),
            public_base_url: self.s3_public_base_url.clone(),
        }
    }

    pub fn rate_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            max_requests: self.rate_limit_max_requests,
            window_seconds: self.rate_limit_window_secs,
        }
    }
}

/// Environment values stay strings, so lists are split here
fn comma_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn environment(vars: &[(&str, &str)]) -> Environment {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Environment::default().source(Some(source))
    }

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_environment(environment(&[
            ("S3_BUCKET_NAME", "ngo-site"),
            ("ADMIN_PASSWORD", "secret"),
        ]))
        .expect("config should load");

        assert_eq!(config.port, 3000);
        assert_eq!(config.admin_username, "admin");
        assert_eq!(config.session_ttl_secs, 3600);
        assert_eq!(config.aws_region, "eu-north-1");
        assert_eq!(config.rate_limit_max_requests, 100);
        assert_eq!(config.rate_limit_window_secs, 900);
        assert!(config.cors_allowed_origins.is_empty());
        assert!(!config.is_production());
        assert_eq!(
            config.s3_config().public_base_url(),
            "https://ngo-site.s3.eu-north-1.amazonaws.com"
        );
    }

    #[test]
    fn test_numeric_password_stays_a_string() {
        let config = AppConfig::from_environment(environment(&[
            ("S3_BUCKET_NAME", "ngo-site"),
            ("ADMIN_PASSWORD", "20242024"),
        ]))
        .expect("config should load");

        assert_eq!(config.admin_password.as_deref(), Some("20242024"));
    }

    #[test]
    fn test_password_kept_verbatim() {
        for password in ["0042", "1e5", "true", "3.10"] {
            let config = AppConfig::from_environment(environment(&[
                ("S3_BUCKET_NAME", "ngo-site"),
                ("ADMIN_PASSWORD", password),
                ("CONTACT_RELAY_TOKEN", "007"),
            ]))
            .expect("config should load");

            assert_eq!(config.admin_password.as_deref(), Some(password));
            assert_eq!(config.contact_relay_token.as_deref(), Some("007"));
        }
    }

    #[test]
    fn test_numeric_bucket_name_kept_verbatim() {
        let config = AppConfig::from_environment(environment(&[
            ("S3_BUCKET_NAME", "0123"),
            ("ADMIN_PASSWORD", "secret"),
            ("PORT", "8081"),
        ]))
        .expect("config should load");

        assert_eq!(config.s3_bucket_name, "0123");
        assert_eq!(config.port, 8081);
    }

    #[test]
    fn test_session_ttl_out_of_range_rejected() {
        for ttl in ["0", "9000000000000000"] {
            let result = AppConfig::from_environment(environment(&[
                ("S3_BUCKET_NAME", "ngo-site"),
                ("ADMIN_PASSWORD", "secret"),
                ("SESSION_TTL_SECS", ttl),
            ]));
            assert!(result.is_err(), "ttl {ttl} should be rejected");
        }
    }

    #[test]
    fn test_cors_origins_are_split() {
        let config = AppConfig::from_environment(environment(&[
            ("S3_BUCKET_NAME", "ngo-site"),
            ("ADMIN_PASSWORD", "secret"),
            ("APP_ENV", "production"),
            (
                "CORS_ALLOWED_ORIGINS",
                "https://example.org, https://www.example.org",
            ),
        ]))
        .expect("config should load");

        assert!(config.is_production());
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://example.org", "https://www.example.org"]
        );
    }

    #[test]
    fn test_missing_password_is_rejected() {
        let result =
            AppConfig::from_environment(environment(&[("S3_BUCKET_NAME", "ngo-site")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_bucket_is_rejected() {
        let result = AppConfig::from_environment(environment(&[("ADMIN_PASSWORD", "secret")]));
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_from_process_env() {
        // SAFETY: serialized with every other test touching the environment
        unsafe {
            std::env::set_var("S3_BUCKET_NAME", "env-bucket");
            std::env::set_var("ADMIN_PASSWORD", "from-env");
            std::env::set_var("PORT", "8080");
        }

        let config = AppConfig::from_env();

        unsafe {
            std::env::remove_var("S3_BUCKET_NAME");
            std::env::remove_var("ADMIN_PASSWORD");
            std::env::remove_var("PORT");
        }

        let config = config.expect("config should load");
        assert_eq!(config.s3_bucket_name, "env-bucket");
        assert_eq!(config.port, 8080);
    }
}
