use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7350;
pub const DEFAULT_SERVER_KEY: &str = "defaultkey";
pub const DEFAULT_TIMEOUT_MS: u64 = 7_000;
/// Lookahead used by the pre-flight refresh gate (5 minutes).
pub const DEFAULT_EXPIRED_TIMESPAN_MS: u64 = 5 * 60 * 1000;

/// Options for the realtime socket transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketConfig {
    /// Language tag sent in the connection URL
    pub lang: String,
    /// Handshake timeout; `None` waits for the OS-level connect to give up
    pub connect_timeout_ms: Option<u64>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            lang: "en".to_string(),
            connect_timeout_ms: None,
        }
    }
}

impl SocketConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_key: Secret<String>,
    pub host: String,
    pub port: u16,
    pub use_ssl: bool,
    pub timeout_ms: u64,
    pub auto_refresh_session: bool,
    pub expired_timespan_ms: u64,
    pub socket: SocketConfig,
}

// Never expose the server key in serialization
impl Serialize for ClientConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ClientConfig", 8)?;
        state.serialize_field("server_key", "[REDACTED]")?;
        state.serialize_field("host", &self.host)?;
        state.serialize_field("port", &self.port)?;
        state.serialize_field("use_ssl", &self.use_ssl)?;
        state.serialize_field("timeout_ms", &self.timeout_ms)?;
        state.serialize_field("auto_refresh_session", &self.auto_refresh_session)?;
        state.serialize_field("expired_timespan_ms", &self.expired_timespan_ms)?;
        state.serialize_field("socket", &self.socket)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ClientConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ClientConfigHelper {
            server_key: String,
            #[serde(default = "default_host")]
            host: String,
            #[serde(default = "default_port")]
            port: u16,
            #[serde(default)]
            use_ssl: bool,
            #[serde(default = "default_timeout_ms")]
            timeout_ms: u64,
            #[serde(default = "default_true")]
            auto_refresh_session: bool,
            #[serde(default = "default_expired_timespan_ms")]
            expired_timespan_ms: u64,
            #[serde(default)]
            socket: SocketConfig,
        }

        let helper = ClientConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            server_key: Secret::new(helper.server_key),
            host: helper.host,
            port: helper.port,
            use_ssl: helper.use_ssl,
            timeout_ms: helper.timeout_ms,
            auto_refresh_session: helper.auto_refresh_session,
            expired_timespan_ms: helper.expired_timespan_ms,
            socket: helper.socket,
        })
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

const fn default_true() -> bool {
    true
}

const fn default_expired_timespan_ms() -> u64 {
    DEFAULT_EXPIRED_TIMESPAN_MS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_KEY.to_string())
    }
}

impl ClientConfig {
    /// Create a configuration for a local server with the given server key
    #[must_use]
    pub fn new(server_key: String) -> Self {
        Self {
            server_key: Secret::new(server_key),
            host: default_host(),
            port: DEFAULT_PORT,
            use_ssl: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            auto_refresh_session: true,
            expired_timespan_ms: DEFAULT_EXPIRED_TIMESPAN_MS,
            socket: SocketConfig::default(),
        }
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_SERVER_KEY` (optional, defaults to `defaultkey`)
    /// - `{PREFIX}_HOST` (optional, defaults to `127.0.0.1`)
    /// - `{PREFIX}_PORT` (optional, defaults to `7350`)
    /// - `{PREFIX}_USE_SSL` (optional, defaults to false)
    /// - `{PREFIX}_TIMEOUT_MS` (optional, defaults to 7000)
    /// - `{PREFIX}_AUTO_REFRESH` (optional, defaults to true)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let var = |name: &str| env::var(format!("{}_{}", prefix, name)).ok();

        let mut config = Self::new(
            var("SERVER_KEY").unwrap_or_else(|| DEFAULT_SERVER_KEY.to_string()),
        );

        if let Some(host) = var("HOST") {
            if host.trim().is_empty() {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "{}_HOST is set but empty",
                    prefix
                )));
            }
            config.host = host;
        }

        if let Some(port) = var("PORT") {
            config.port = port.parse().map_err(|_| {
                ConfigError::InvalidConfiguration(format!("{}_PORT is not a valid port: {}", prefix, port))
            })?;
        }

        if let Some(timeout) = var("TIMEOUT_MS") {
            config.timeout_ms = timeout.parse().map_err(|_| {
                ConfigError::InvalidConfiguration(format!(
                    "{}_TIMEOUT_MS is not a number: {}",
                    prefix, timeout
                ))
            })?;
        }

        config.use_ssl = var("USE_SSL")
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);
        config.auto_refresh_session = var("AUTO_REFRESH")
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(true);

        Ok(config)
    }

    /// Create configuration from a .env file and environment variables
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    /// Create configuration from a specific .env file path
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(_) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                // No .env file, fall back to the process environment
            }
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub const fn use_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    #[must_use]
    pub const fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub const fn auto_refresh_session(mut self, enabled: bool) -> Self {
        self.auto_refresh_session = enabled;
        self
    }

    /// Set how far ahead of the access token's expiry the client refreshes it
    #[must_use]
    pub const fn expired_timespan_ms(mut self, lookahead_ms: u64) -> Self {
        self.expired_timespan_ms = lookahead_ms;
        self
    }

    #[must_use]
    pub fn socket(mut self, socket: SocketConfig) -> Self {
        self.socket = socket;
        self
    }

    /// Get the server key (use carefully - exposes secret)
    pub fn server_key(&self) -> &str {
        self.server_key.expose_secret()
    }

    pub fn expired_timespan(&self) -> Duration {
        Duration::from_millis(self.expired_timespan_ms)
    }

    /// Base URL of the REST surface, e.g. `http://127.0.0.1:7350`
    pub fn http_base_url(&self) -> String {
        let scheme = if self.use_ssl { "https://" } else { "http://" };
        format!("{}{}:{}", scheme, self.host, self.port)
    }

    pub fn ws_scheme(&self) -> WsScheme {
        if self.use_ssl {
            WsScheme::Wss
        } else {
            WsScheme::Ws
        }
    }
}

/// URL scheme of the realtime socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsScheme {
    Ws,
    Wss,
}

impl WsScheme {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ws => "ws://",
            Self::Wss => "wss://",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
