//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    pub app: AppSettings,
    pub platform: PlatformConfig,
    pub gateway: GatewayConfig,
    pub delivery: DeliveryConfig,
    pub relay: RelayConfig,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: Environment::default(),
        }
    }
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" | "dev" => Ok(Self::Development),
            other => Err(ConfigError::InvalidValue("APP_ENV", other.to_string())),
        }
    }
}

/// Target platform HTTP API settings
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Base URL of the REST API, e.g. `https://www.kookapp.cn/api/v3`
    pub api_base_url: String,
    /// Bot token sent as `Authorization: Bot <token>`
    pub token: String,
    /// When set, every API request is relayed through this endpoint
    pub forward_url: Option<String>,
    pub request_timeout: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            token: String::new(),
            forward_url: None,
            request_timeout: Duration::from_millis(10_000),
        }
    }
}

/// Gateway session settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// JSON file holding `{ sessionId, sn }` between restarts
    pub session_file: PathBuf,
    /// Ask the gateway for zlib-compressed frames
    pub compress: bool,
    /// Steady-state heartbeat cadence, anchored to the previous ping
    pub heartbeat_interval: Duration,
    /// Delay between unacknowledged pings
    pub heartbeat_retry_delay: Duration,
    /// Unacknowledged pings tolerated before forcing a reconnect
    pub heartbeat_max_retries: u32,
    /// Period of the "transport is not terminally closed" assertion
    pub liveness_check_interval: Duration,
    /// Pause between a teardown and the next connection attempt
    pub reconnect_delay: Duration,
    /// Pause between failed discovery calls
    pub discovery_retry_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            session_file: PathBuf::from(".cache/client.json"),
            compress: true,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_retry_delay: Duration::from_secs(6),
            heartbeat_max_retries: 2,
            liveness_check_interval: Duration::from_secs(100),
            reconnect_delay: Duration::from_secs(1),
            discovery_retry_delay: Duration::from_secs(1),
        }
    }
}

/// Outbound delivery queue settings
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Courtesy delay before every send attempt
    pub pacing_delay: Duration,
    /// Transient failures retried per message
    pub max_retries: u32,
    /// Rendered text budget of a card payload
    pub content_max_chars: usize,
    pub malformed_payload_code: i64,
    pub content_too_long_code: i64,
    /// Further codes that fail a message without retrying
    pub non_retryable_codes: Vec<i64>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            pacing_delay: Duration::from_secs(3),
            max_retries: 2,
            content_max_chars: 2000,
            malformed_payload_code: 40000,
            content_too_long_code: 40012,
            non_retryable_codes: vec![40011],
        }
    }
}

impl DeliveryConfig {
    /// Whether `code` fails a message on the first attempt
    #[must_use]
    pub fn is_non_retryable(&self, code: i64) -> bool {
        code == self.malformed_payload_code || self.non_retryable_codes.contains(&code)
    }
}

/// Optional mirroring of gateway chat messages into a channel
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    pub channel_id: Option<String>,
}

// Default value functions
fn default_app_name() -> String {
    "chat-bridge".to_string()
}

fn default_api_base_url() -> String {
    "https://www.kookapp.cn/api/v3".to_string()
}

impl BridgeConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if the bot token is missing or a value cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let gateway_defaults = GatewayConfig::default();
        let delivery_defaults = DeliveryConfig::default();
        let platform_defaults = PlatformConfig::default();

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: optional_var("APP_ENV")
                    .map(|s| s.parse())
                    .transpose()?
                    .unwrap_or_default(),
            },
            platform: PlatformConfig {
                api_base_url: env::var("PLATFORM_API_URL")
                    .unwrap_or_else(|_| default_api_base_url()),
                token: resolve_secret("BOT_TOKEN")?.ok_or(ConfigError::MissingVar("BOT_TOKEN"))?,
                forward_url: optional_var("PLATFORM_FORWARD_URL"),
                request_timeout: millis_var(
                    "PLATFORM_REQUEST_TIMEOUT_MS",
                    platform_defaults.request_timeout,
                )?,
            },
            gateway: GatewayConfig {
                session_file: optional_var("SESSION_FILE")
                    .map_or(gateway_defaults.session_file, PathBuf::from),
                compress: parse_var("GATEWAY_COMPRESS", gateway_defaults.compress)?,
                heartbeat_interval: millis_var(
                    "HEARTBEAT_INTERVAL_MS",
                    gateway_defaults.heartbeat_interval,
                )?,
                heartbeat_retry_delay: millis_var(
                    "HEARTBEAT_RETRY_DELAY_MS",
                    gateway_defaults.heartbeat_retry_delay,
                )?,
                heartbeat_max_retries: parse_var(
                    "HEARTBEAT_MAX_RETRIES",
                    gateway_defaults.heartbeat_max_retries,
                )?,
                liveness_check_interval: millis_var(
                    "LIVENESS_CHECK_INTERVAL_MS",
                    gateway_defaults.liveness_check_interval,
                )?,
                reconnect_delay: millis_var("RECONNECT_DELAY_MS", gateway_defaults.reconnect_delay)?,
                discovery_retry_delay: millis_var(
                    "DISCOVERY_RETRY_DELAY_MS",
                    gateway_defaults.discovery_retry_delay,
                )?,
            },
            delivery: DeliveryConfig {
                pacing_delay: millis_var("DELIVERY_PACING_MS", delivery_defaults.pacing_delay)?,
                max_retries: parse_var("DELIVERY_MAX_RETRIES", delivery_defaults.max_retries)?,
                content_max_chars: parse_var(
                    "DELIVERY_CONTENT_MAX_CHARS",
                    delivery_defaults.content_max_chars,
                )?,
                malformed_payload_code: parse_var(
                    "DELIVERY_MALFORMED_CODE",
                    delivery_defaults.malformed_payload_code,
                )?,
                content_too_long_code: parse_var(
                    "DELIVERY_CONTENT_TOO_LONG_CODE",
                    delivery_defaults.content_too_long_code,
                )?,
                non_retryable_codes: match optional_var("DELIVERY_NON_RETRYABLE_CODES") {
                    Some(raw) => parse_code_list("DELIVERY_NON_RETRYABLE_CODES", &raw)?,
                    None => delivery_defaults.non_retryable_codes,
                },
            },
            relay: RelayConfig {
                channel_id: optional_var("RELAY_CHANNEL_ID"),
            },
        })
    }
}

/// Read a secret from `KEY`, then `key`, then the file named by `KEY_FILE`.
///
/// Returns `Ok(None)` when none of them is set.
pub fn resolve_secret(key: &'static str) -> Result<Option<String>, ConfigError> {
    if let Some(value) = optional_var(key).or_else(|| optional_var(&key.to_lowercase())) {
        return Ok(Some(value));
    }

    let file_key = format!("{key}_FILE");
    match optional_var(&file_key) {
        Some(path) => {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::InvalidValue(key, format!("{path}: {e}")))?;
            let trimmed = contents.trim_end().to_string();
            Ok((!trimmed.is_empty()).then_some(trimmed))
        }
        None => Ok(None),
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(default),
    }
}

fn millis_var(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let millis = parse_var(key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(millis))
}

fn parse_code_list(key: &'static str, raw: &str) -> Result<Vec<i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| ConfigError::InvalidValue(key, s.to_string()))
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
