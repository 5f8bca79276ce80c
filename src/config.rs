//! # Gateway Configuration
//!
//! Configuration for the HTTP gateway: bind address, store connection,
//! credentials, request timeout, and the debug-error flag. All values can be
//! loaded from the environment; the CLI may override individual fields.

use serde::{Deserialize, Serialize};

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Store connection string (default: "mongodb://localhost:27017")
    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,

    /// Database name (default: "docgate")
    #[serde(default = "default_database")]
    pub database: String,

    /// Basic-auth username
    #[serde(default)]
    pub auth_username: String,

    /// Basic-auth password
    #[serde(default)]
    pub auth_password: String,

    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 3333)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request deadline in milliseconds (default: 30000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Attach error detail (stack, name, request id) to error bodies
    #[serde(default)]
    pub debug: bool,
}

fn default_mongodb_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "docgate".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3333
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mongodb_uri: default_mongodb_uri(),
            database: default_database(),
            auth_username: String::new(),
            auth_password: String::new(),
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
            debug: false,
        }
    }
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Recognized variables: `MONGODB_URI`, `MONGODB_DATABASE`,
    /// `AUTH_USERNAME`, `AUTH_PASSWORD`, `HOST`, `PORT`,
    /// `REQUEST_TIMEOUT_MS`, `DEBUG`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(uri) = std::env::var("MONGODB_URI") {
            config.mongodb_uri = uri;
        }
        if let Ok(db) = std::env::var("MONGODB_DATABASE") {
            config.database = db;
        }
        if let Ok(user) = std::env::var("AUTH_USERNAME") {
            config.auth_username = user;
        }
        if let Ok(pass) = std::env::var("AUTH_PASSWORD") {
            config.auth_password = pass;
        }
        if let Ok(host) = std::env::var("HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }
        if let Ok(ms) = std::env::var("REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.request_timeout_ms = ms;
            }
        }
        if let Ok(debug) = std::env::var("DEBUG") {
            config.debug = matches!(debug.as_str(), "1" | "true" | "yes");
        }

        config
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
