//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub mpesa: MpesaSettings,
    pub otp: OtpSettings,
    pub smtp: SmtpConfig,
    pub admin: AdminConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

/// M-Pesa Daraja API settings
#[derive(Debug, Clone)]
pub struct MpesaSettings {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub short_code: String,
    pub passkey: String,
    pub callback_url: String,
    pub environment: String, // "sandbox" or "production"
    pub request_timeout: u64, // seconds
    pub max_retries: u32,
}

/// OTP lifecycle settings
#[derive(Debug, Clone)]
pub struct OtpSettings {
    pub code_ttl_secs: i64,
    pub max_attempts: i32,
    pub resend_cap: i32,
    pub cooldown_schedule_secs: Vec<i64>,
}

/// SMTP transport settings for the verification mailer
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub timeout: u64, // seconds
}

/// Admin capabilities
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub super_admin_email: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            mpesa: MpesaSettings::from_env()?,
            otp: OtpSettings::from_env()?,
            smtp: SmtpConfig::from_env()?,
            admin: AdminConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.mpesa.validate()?;
        self.otp.validate()?;
        self.admin.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost,http://127.0.0.1".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl MpesaSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(MpesaSettings {
            consumer_key: env::var("MPESA_CONSUMER_KEY")
                .map_err(|_| ConfigError::MissingVariable("MPESA_CONSUMER_KEY".to_string()))?,
            consumer_secret: env::var("MPESA_CONSUMER_SECRET")
                .map_err(|_| ConfigError::MissingVariable("MPESA_CONSUMER_SECRET".to_string()))?,
            short_code: env::var("MPESA_SHORT_CODE").unwrap_or_else(|_| "174379".to_string()),
            passkey: env::var("MPESA_PASSKEY")
                .map_err(|_| ConfigError::MissingVariable("MPESA_PASSKEY".to_string()))?,
            callback_url: env::var("MPESA_CALLBACK_URL")
                .map_err(|_| ConfigError::MissingVariable("MPESA_CALLBACK_URL".to_string()))?,
            environment: env::var("MPESA_ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string()),
            request_timeout: env::var("MPESA_REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MPESA_REQUEST_TIMEOUT".to_string()))?,
            max_retries: env::var("MPESA_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MPESA_MAX_RETRIES".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_environments = ["sandbox", "production"];
        if !valid_environments.contains(&self.environment.as_str()) {
            return Err(ConfigError::InvalidValue("MPESA_ENVIRONMENT".to_string()));
        }

        if self.consumer_key.is_empty() || self.consumer_secret.is_empty() {
            return Err(ConfigError::InvalidValue(
                "MPESA_CONSUMER_KEY and MPESA_CONSUMER_SECRET cannot be empty".to_string(),
            ));
        }

        if !self.callback_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "MPESA_CALLBACK_URL must be a public https URL".to_string(),
            ));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::InvalidValue(
                "MPESA_REQUEST_TIMEOUT".to_string(),
            ));
        }

        Ok(())
    }
}

impl OtpSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(OtpSettings {
            code_ttl_secs: env::var("OTP_CODE_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("OTP_CODE_TTL_SECS".to_string()))?,
            max_attempts: env::var("OTP_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("OTP_MAX_ATTEMPTS".to_string()))?,
            resend_cap: env::var("OTP_RESEND_CAP")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("OTP_RESEND_CAP".to_string()))?,
            cooldown_schedule_secs: env::var("OTP_COOLDOWN_SCHEDULE_SECS")
                .unwrap_or_else(|_| "30,60,120".to_string())
                .split(',')
                .map(|s| {
                    s.trim()
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("OTP_COOLDOWN_SCHEDULE_SECS".to_string()))
                })
                .collect::<Result<Vec<i64>, ConfigError>>()?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.code_ttl_secs <= 0 {
            return Err(ConfigError::InvalidValue("OTP_CODE_TTL_SECS".to_string()));
        }

        if self.max_attempts <= 0 {
            return Err(ConfigError::InvalidValue("OTP_MAX_ATTEMPTS".to_string()));
        }

        if self.resend_cap < 0 {
            return Err(ConfigError::InvalidValue("OTP_RESEND_CAP".to_string()));
        }

        if self.cooldown_schedule_secs.is_empty() {
            return Err(ConfigError::InvalidValue(
                "OTP_COOLDOWN_SCHEDULE_SECS cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl SmtpConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(SmtpConfig {
            host: env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SMTP_PORT".to_string()))?,
            secure: env::var("SMTP_SECURE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SMTP_SECURE".to_string()))?,
            username: env::var("SMTP_USER").unwrap_or_default(),
            password: env::var("SMTP_PASS").unwrap_or_default(),
            from_address: env::var("SMTP_FROM")
                .unwrap_or_else(|_| "no-reply@duka.example".to_string()),
            timeout: env::var("SMTP_TIMEOUT")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SMTP_TIMEOUT".to_string()))?,
        })
    }
}

impl AdminConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(AdminConfig {
            super_admin_email: env::var("SUPER_ADMIN_EMAIL")
                .map_err(|_| ConfigError::MissingVariable("SUPER_ADMIN_EMAIL".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.super_admin_email.is_empty() || !self.super_admin_email.contains('@') {
            return Err(ConfigError::InvalidValue("SUPER_ADMIN_EMAIL".to_string()));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl From<std::num::ParseIntError> for ConfigError {
    fn from(_: std::num::ParseIntError) -> Self {
        ConfigError::InvalidValue("Failed to parse integer value".to_string())
    }
}
