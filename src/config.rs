use serde::{Deserialize, Serialize};
use tracing::{info, error};

use crate::clients::content_api::Credential;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Service identity, used as the subject of minted service tokens
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Base URL of the content API that owns page storage
    #[serde(default = "default_content_api_url")]
    pub content_api_url: String,

    /// Static bearer token for outbound content API calls
    pub content_api_token: Option<String>,

    /// Secret for minting short-lived service JWTs instead of a static token
    pub content_api_jwt_secret: Option<String>,

    /// Timeout for outbound content API calls, in seconds
    #[serde(default = "default_content_api_timeout_secs")]
    pub content_api_timeout_secs: u64,

    /// How often a dirty page snapshot is flushed back to the content API
    #[serde(default = "default_save_interval_secs")]
    pub save_interval_secs: u64,

    /// How long a page with no connected clients is kept in memory
    #[serde(default = "default_idle_grace_secs")]
    pub idle_grace_secs: u64,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        // Load from environment variables using envy
        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("✅ Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("❌ Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve the credential used for outbound content API calls.
    ///
    /// A static token wins over a JWT secret; configuring neither is a
    /// startup error, since every content API request must carry one.
    pub fn credential(&self) -> Result<Credential, ConfigError> {
        if let Some(token) = &self.content_api_token {
            Ok(Credential::Static(token.clone()))
        } else if let Some(secret) = &self.content_api_jwt_secret {
            Ok(Credential::ServiceJwt {
                secret: secret.clone(),
                service_name: self.service_name.clone(),
            })
        } else {
            Err(ConfigError::MissingCredential)
        }
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "prod" || self.environment.to_lowercase() == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            service_name: default_service_name(),
            content_api_url: default_content_api_url(),
            content_api_token: None,
            content_api_jwt_secret: None,
            content_api_timeout_secs: default_content_api_timeout_secs(),
            save_interval_secs: default_save_interval_secs(),
            idle_grace_secs: default_idle_grace_secs(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    EnvError(envy::Error),
    MissingCredential,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EnvError(e) => write!(f, "Environment variable error: {}", e),
            ConfigError::MissingCredential => write!(
                f,
                "No content API credential configured (set CONTENT_API_TOKEN or CONTENT_API_JWT_SECRET)"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "pages-relay".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_content_api_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_content_api_timeout_secs() -> u64 {
    10
}

fn default_save_interval_secs() -> u64 {
    30
}

fn default_idle_grace_secs() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_token_wins_over_jwt_secret() {
        let mut config = Config::default();
        config.content_api_token = Some("token-abc".to_string());
        config.content_api_jwt_secret = Some("secret".to_string());
        match config.credential() {
            Ok(Credential::Static(token)) => assert_eq!(token, "token-abc"),
            other => panic!("expected static credential, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn jwt_secret_used_when_no_token() {
        let mut config = Config::default();
        config.content_api_jwt_secret = Some("secret".to_string());
        match config.credential() {
            Ok(Credential::ServiceJwt { service_name, .. }) => {
                assert_eq!(service_name, "pages-relay")
            }
            other => panic!("expected service JWT credential, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn missing_credential_is_an_error() {
        let config = Config::default();
        assert!(matches!(
            config.credential(),
            Err(ConfigError::MissingCredential)
        ));
    }
}
