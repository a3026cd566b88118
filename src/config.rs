//! Client configuration.
//!
//! A [`ClientConfig`] can be built in code, read from the environment, or
//! loaded from a YAML file.  Values not given fall back to the defaults
//! below.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Base URL used when none is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Route of the login entry point.
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";

/// Environment variable overriding the base URL.
pub const API_URL_ENV: &str = "CHATSYNC_API_URL";

/// Environment variable overriding the timeout, in whole seconds.
pub const TIMEOUT_ENV: &str = "CHATSYNC_TIMEOUT_SECS";

/// Configuration for an [`ApiClient`](crate::ApiClient) and its login redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the backend, without a trailing slash.
    pub base_url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Where to send the user when the backend rejects their credentials.
    pub login_route: String,

    /// Routes reachable without credentials.  No login redirect happens
    /// while one of these is showing.
    pub public_routes: Vec<String>,
}

impl ClientConfig {
    /// Creates a new ClientConfig with default values.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            public_routes: vec!["/login".to_string(), "/signup".to_string()],
        }
    }

    /// Reads overrides from `CHATSYNC_API_URL` and `CHATSYNC_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();
        if let Ok(url) = env::var(API_URL_ENV) {
            config = config.with_base_url(url);
        }
        if let Ok(secs) = env::var(TIMEOUT_ENV) {
            let secs = secs.trim().parse::<u64>().map_err(|_| {
                Error::validation(
                    format!("{TIMEOUT_ENV} must be a whole number of seconds"),
                    Some(TIMEOUT_ENV.to_string()),
                )
            })?;
            config.timeout_secs = secs;
        }
        config.validate()?;
        Ok(config)
    }

    /// Loads a YAML configuration file.
    ///
    /// ```yaml
    /// base_url: https://chat.example.com/
    /// timeout_secs: 30
    /// ```
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::io(
                format!("failed to read config file {}", path.display()),
                err,
            )
        })?;
        Self::from_yaml(&content)
    }

    /// Parses a YAML configuration document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).map_err(|err| {
            Error::serialization(
                format!("invalid config file: {err}"),
                Some(Box::new(err)),
            )
        })?;
        let config = config.normalized();
        config.validate()?;
        Ok(config)
    }

    /// Sets the base URL, dropping any trailing slash.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.normalized()
    }

    /// Sets the per-request timeout, rounded up to whole seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self.timeout_secs = secs.max(1);
        self
    }

    /// Sets the login route.
    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    /// Sets the routes that never trigger a login redirect.
    pub fn with_public_routes(mut self, routes: Vec<String>) -> Self {
        self.public_routes = routes;
        self
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// True if `route` is reachable without credentials.
    pub fn is_public_route(&self, route: &str) -> bool {
        self.public_routes.iter().any(|r| r == route)
    }

    /// Checks that the configuration can be used to build a client.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::validation(
                "API base URL is not configured",
                Some("base_url".to_string()),
            ));
        }
        url::Url::parse(&self.base_url)?;
        if self.timeout_secs == 0 {
            return Err(Error::validation(
                "timeout must be at least one second",
                Some("timeout_secs".to_string()),
            ));
        }
        Ok(())
    }

    fn normalized(mut self) -> Self {
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
