//! Client configuration.
//!
//! Settings come either from code ([`ClientConfig::new`] and the `with_*`
//! builders) or from the process environment ([`ClientConfig::from_env`]):
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `SYNAPSE_HOST` | Service host name | required |
//! | `SYNAPSE_PORT` | Service port | `443` |
//! | `SYNAPSE_API_KEY` | Static API key; selects API-key mode | unset |
//! | `SYNAPSE_TIMEOUT_SECS` | Whole-request timeout | `30` |
//! | `SYNAPSE_INSECURE` | Accept invalid TLS certificates (`1`/`true`) | `false` |
//!
//! Empty values are treated as unset.

use std::time::Duration;

use crate::error::ClientError;

/// Environment variable naming the service host.
pub const ENV_HOST: &str = "SYNAPSE_HOST";
/// Environment variable naming the service port.
pub const ENV_PORT: &str = "SYNAPSE_PORT";
/// Environment variable holding a static API key.
pub const ENV_API_KEY: &str = "SYNAPSE_API_KEY";
/// Environment variable holding the request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "SYNAPSE_TIMEOUT_SECS";
/// Environment variable enabling acceptance of invalid certificates.
pub const ENV_INSECURE: &str = "SYNAPSE_INSECURE";

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 443;
/// Timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Host and port of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns `https://{host}:{port}`.
    pub fn base_url(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Everything needed to construct a [`crate::Client`].
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service endpoint.
    pub endpoint: Endpoint,
    /// Static API key. `Some` selects API-key mode; `None` selects cookie login.
    pub api_key: Option<String>,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Accept self-signed or otherwise invalid certificates.
    pub accept_invalid_certs: bool,
}

impl ClientConfig {
    /// Creates a configuration for `host:port` with default settings.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            endpoint: Endpoint::new(host, port),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: false,
        }
    }

    /// Selects API-key mode.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables or disables acceptance of invalid certificates.
    #[must_use]
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if `SYNAPSE_HOST` is unset or a
    /// numeric or boolean variable cannot be parsed.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let host = get(ENV_HOST)
            .ok_or_else(|| ClientError::configuration(format!("{ENV_HOST} is not set")))?;
        let port = match get(ENV_PORT) {
            Some(raw) => raw.parse::<u16>().map_err(|err| {
                ClientError::configuration(format!("{ENV_PORT}={raw:?} is not a port: {err}"))
            })?,
            None => DEFAULT_PORT,
        };
        let timeout = match get(ENV_TIMEOUT_SECS) {
            Some(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|err| {
                ClientError::configuration(format!(
                    "{ENV_TIMEOUT_SECS}={raw:?} is not a number of seconds: {err}"
                ))
            })?),
            None => DEFAULT_TIMEOUT,
        };
        let accept_invalid_certs = match get(ENV_INSECURE) {
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                ClientError::configuration(format!("{ENV_INSECURE}={raw:?} is not a boolean"))
            })?,
            None => false,
        };

        Ok(Self {
            endpoint: Endpoint::new(host, port),
            api_key: get(ENV_API_KEY),
            timeout,
            accept_invalid_certs,
        })
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
