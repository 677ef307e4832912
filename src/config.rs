use std::env;
use std::str::FromStr;

use secrecy::SecretString;

use crate::utils::password::DEFAULT_ITERATIONS;

pub const DEFAULT_SESSION_MAX_AGE_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {value}")]
    Invalid { name: &'static str, value: String },
}

/// HTTP mail relay; when absent, emails are written to the log
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: SecretString,
    pub sender: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: SecretString,
    pub session_max_age_secs: i64,
    pub app_url: String,
    pub password_hash_iterations: u32,
    pub mail: Option<MailConfig>,
}

impl AppConfig {
    /// Reads `.env` (if present) then the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_vars()
    }

    fn from_vars() -> Result<Self, ConfigError> {
        let mail = match optional("MAIL_API_URL") {
            Some(api_url) => Some(MailConfig {
                api_url,
                api_key: SecretString::from(required("MAIL_API_KEY")?),
                sender: optional("MAIL_SENDER").unwrap_or_else(|| "no-reply@localhost".to_string()),
            }),
            None => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: optional("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parsed("PORT", 8080)?,
            jwt_secret: SecretString::from(required("JWT_SECRET")?),
            session_max_age_secs: parsed("SESSION_MAX_AGE_SECS", DEFAULT_SESSION_MAX_AGE_SECS)?,
            app_url: optional("APP_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            password_hash_iterations: parsed("PASSWORD_HASH_ITERATIONS", DEFAULT_ITERATIONS)?,
            mail,
        })
    }
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
