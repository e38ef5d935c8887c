//! Client connection configuration.
//!
//! Connection parameters can be supplied explicitly, or fall back to
//! environment-derived defaults (`WAYPOST_HTTP_ADDR`, `WAYPOST_HTTP_TOKEN`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, WaypostError};

/// Environment variable holding a full `scheme://host:port` address.
pub const ENV_HTTP_ADDR: &str = "WAYPOST_HTTP_ADDR";

/// Environment variable holding the default ACL token.
pub const ENV_HTTP_TOKEN: &str = "WAYPOST_HTTP_TOKEN";

/// Default host to connect to.
pub const DEFAULT_HOST: &str = "localhost";

/// Default agent HTTP port.
pub const DEFAULT_PORT: u16 = 8500;

/// Remote API version prefix.
pub const API_VERSION: &str = "v1";

/// Default timeout for HTTP requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection configuration for the remote agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// URL scheme, `http` or `https`.
    pub scheme: String,

    /// Host name or address of the agent.
    pub host: String,

    /// Agent HTTP port.
    pub port: u16,

    /// Optional datacenter to scope requests to.
    pub datacenter: Option<String>,

    /// Optional ACL token sent with every request.
    pub token: Option<String>,

    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            datacenter: None,
            token: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Builds a configuration from environment-derived defaults.
    ///
    /// `WAYPOST_HTTP_ADDR` is parsed as `scheme://host:port`;
    /// `WAYPOST_HTTP_TOKEN` supplies the ACL token.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var(ENV_HTTP_ADDR) {
            if let Some((scheme, host, port)) = parse_http_addr(&addr) {
                config.scheme = scheme;
                config.host = host;
                if let Some(port) = port {
                    config.port = port;
                }
            }
        }

        if let Ok(token) = std::env::var(ENV_HTTP_TOKEN) {
            if !token.is_empty() {
                config.token = Some(token);
            }
        }

        config
    }

    /// Validates configuration.
    pub fn validate(&self) -> Result<()> {
        if self.scheme != "http" && self.scheme != "https" {
            return Err(WaypostError::validation(format!(
                "scheme must be http or https, got '{}'",
                self.scheme
            )));
        }
        if self.host.is_empty() {
            return Err(WaypostError::validation("host must not be empty"));
        }
        if self.port == 0 {
            return Err(WaypostError::validation("port must be > 0"));
        }
        Ok(())
    }

    /// Returns the base URI for API requests, e.g. `http://localhost:8500/v1`.
    pub fn base_uri(&self) -> String {
        format!(
            "{}://{}:{}/{}",
            self.scheme, self.host, self.port, API_VERSION
        )
    }

    /// Returns the configured request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Parses `scheme://host:port` into its parts. The port is optional.
fn parse_http_addr(addr: &str) -> Option<(String, String, Option<u16>)> {
    let (scheme, rest) = addr.split_once("://")?;
    if rest.is_empty() {
        return None;
    }
    match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse().ok()?;
            Some((scheme.to_string(), host.to_string(), Some(port)))
        }
        None => Some((scheme.to_string(), rest.to_string(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();

        assert_eq!(config.scheme, "http");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8500);
        assert!(config.datacenter.is_none());
        assert!(config.token.is_none());
        assert_eq!(config.base_uri(), "http://localhost:8500/v1");
    }

    #[test]
    fn test_parse_http_addr() {
        assert_eq!(
            parse_http_addr("https://consul.internal:8501"),
            Some(("https".to_string(), "consul.internal".to_string(), Some(8501)))
        );
        assert_eq!(
            parse_http_addr("http://localhost"),
            Some(("http".to_string(), "localhost".to_string(), None))
        );
        assert_eq!(parse_http_addr("not-a-url"), None);
        assert_eq!(parse_http_addr("http://"), None);
    }

    #[test]
    fn test_validation_bad_scheme() {
        let config = ClientConfig {
            scheme: "ftp".to_string(),
            ..Default::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("scheme"));
    }

    #[test]
    fn test_validation_port_zero() {
        let config = ClientConfig {
            port: 0,
            ..Default::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("port"));
    }

    #[test]
    fn test_validation_empty_host() {
        let config = ClientConfig {
            host: String::new(),
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_uri_https() {
        let config = ClientConfig {
            scheme: "https".to_string(),
            host: "consul.internal".to_string(),
            port: 8501,
            ..Default::default()
        };

        assert_eq!(config.base_uri(), "https://consul.internal:8501/v1");
    }
}
