use crate::utils::signature::WebhookAuth;
use std::env;
use thiserror::Error;

const DEFAULT_XENDIT_API_URL: &str = "https://api.xendit.co";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct XenditConfig {
    pub secret_key: Option<String>,
    pub webhook_token: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub frontend_url: String,
    pub environment: AppEnvironment,
    pub xendit: XenditConfig,
}

impl AppConfig {
    // Read the configuration from the process environment (.env is loaded by main)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let environment = match get("APP_ENV").as_deref() {
            Some("development") => AppEnvironment::Development,
            _ => AppEnvironment::Production,
        };

        let database_max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value.parse::<u32>().map_err(|e| ConfigError::Invalid {
                name: "DATABASE_MAX_CONNECTIONS",
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let xendit = XenditConfig {
            secret_key: get("XENDIT_SECRET_KEY"),
            webhook_token: get("XENDIT_WEBHOOK_TOKEN"),
            api_url: get("XENDIT_API_URL")
                .unwrap_or_else(|| DEFAULT_XENDIT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        // Unsigned notifications are only accepted in development
        if environment == AppEnvironment::Production && xendit.webhook_token.is_none() {
            return Err(ConfigError::Missing("XENDIT_WEBHOOK_TOKEN"));
        }

        Ok(AppConfig {
            database_url: require("DATABASE_URL")?,
            database_max_connections,
            jwt_secret: require("JWT_SECRET")?,
            frontend_url: get("FRONTEND_URL")
                .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            environment,
            xendit,
        })
    }

    pub fn webhook_auth(&self) -> Result<WebhookAuth, ConfigError> {
        match (self.environment, &self.xendit.webhook_token) {
            (AppEnvironment::Development, _) => Ok(WebhookAuth::Trusted),
            (AppEnvironment::Production, Some(token)) => {
                Ok(WebhookAuth::SharedSecret(token.clone()))
            }
            (AppEnvironment::Production, None) => Err(ConfigError::Missing("XENDIT_WEBHOOK_TOKEN")),
        }
    }
}
