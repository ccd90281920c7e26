use secrecy::SecretString;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const MAX_MAIL_TIMEOUT_SECS: u64 = 15;
const MAX_TOKEN_TTL_HOURS: i64 = 168;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub verification: VerificationConfig,
    pub mail: MailConfig,
    pub storage: StorageConfig,
    pub dispatch: DispatchConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let format = LogFormat::parse(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        )?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, format },
            verification: VerificationConfig::from_env()?,
            mail: MailConfig::from_env()?,
            storage: StorageConfig {
                contacts_path: optional_var("CONTACTS_DB_PATH").map(PathBuf::from),
            },
            dispatch: DispatchConfig {
                mappings_csv: optional_var("EMAIL_MAPPINGS_CSV").map(PathBuf::from),
                default_pva_email: optional_var("DEFAULT_PVA_EMAIL")
                    .unwrap_or_else(|| "pva@example.com".to_string()),
                default_zoning_email: optional_var("DEFAULT_ZONING_EMAIL")
                    .unwrap_or_else(|| "zoning@example.com".to_string()),
            },
        })
    }
}

/// Reads a variable, treating blank values as unset.
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bounded<T>(variable: &'static str, raw: &str, min: T, max: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + fmt::Display + Copy,
{
    let value = raw
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidNumber {
            variable,
            value: raw.to_string(),
        })?;
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            variable,
            min: min.to_string(),
            max: max.to_string(),
        });
    }
    Ok(value)
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidLogFormat(other.to_string())),
        }
    }
}

/// Confirmation link and token lifetime settings.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub base_url: String,
    pub token_ttl: chrono::Duration,
}

impl VerificationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = optional_var("APP_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string());
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }

        let hours = match optional_var("TOKEN_TTL_HOURS") {
            Some(raw) => parse_bounded("TOKEN_TTL_HOURS", &raw, 1, MAX_TOKEN_TTL_HOURS)?,
            None => 48,
        };

        Ok(Self {
            base_url,
            token_ttl: chrono::Duration::hours(hours),
        })
    }
}

/// Outbound mail transport settings.
#[derive(Debug)]
pub struct MailConfig {
    pub smtp: Option<SmtpSettings>,
    pub sender: Option<SenderIdentity>,
    pub timeout: Duration,
}

impl MailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let port = match optional_var("SMTP_PORT") {
            Some(raw) => parse_bounded("SMTP_PORT", &raw, 1u16, u16::MAX)?,
            None => 465,
        };
        let implicit_tls = optional_var("SMTP_USE_TLS")
            .map(|value| value.eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        let smtp = match (
            optional_var("SMTP_HOST"),
            optional_var("SMTP_USER"),
            optional_var("SMTP_PASS"),
        ) {
            (Some(host), Some(username), Some(password)) => Some(SmtpSettings {
                host,
                port,
                username,
                password: SecretString::from(password),
                implicit_tls: implicit_tls || port == 465,
            }),
            _ => None,
        };

        let sender = optional_var("SENDER_EMAIL").map(|email| SenderIdentity {
            email,
            name: optional_var("SENDER_NAME"),
        });

        let timeout_secs = match optional_var("MAIL_TIMEOUT_SECS") {
            Some(raw) => parse_bounded("MAIL_TIMEOUT_SECS", &raw, 1, MAX_MAIL_TIMEOUT_SECS)?,
            None => 10,
        };

        Ok(Self {
            smtp,
            sender,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// SMTP relay credentials. Port 465 always uses implicit TLS.
#[derive(Debug)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub implicit_tls: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub email: String,
    pub name: Option<String>,
}

/// Location of the durable contact table; `None` keeps contacts in memory.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub contacts_path: Option<PathBuf>,
}

/// Recipient directory inputs for PVA/Zoning request dispatch.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub mappings_csv: Option<PathBuf>,
    pub default_pva_email: String,
    pub default_zoning_email: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str, value: String },
    OutOfRange {
        variable: &'static str,
        min: String,
        max: String,
    },
    InvalidBaseUrl(String),
    InvalidLogFormat(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable, value } => {
                write!(f, "{variable} must be a number (got '{value}')")
            }
            ConfigError::OutOfRange { variable, min, max } => {
                write!(f, "{variable} must be between {min} and {max}")
            }
            ConfigError::InvalidBaseUrl(value) => {
                write!(f, "APP_BASE_URL must start with http:// or https:// (got '{value}')")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT must be 'compact' or 'json' (got '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
