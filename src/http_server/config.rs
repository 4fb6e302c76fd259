//! HTTP listener settings, read from the `http` section of the config file.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Interface the API listens on; loopback unless configured
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins of till and back-office front ends allowed to call the API.
    /// Empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

impl HttpServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Reject a zero port and origins that cannot be sent as a header value
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("http.port must be > 0".to_string());
        }
        if let Some(origin) = self
            .allowed_origins
            .iter()
            .find(|origin| origin.is_empty() || HeaderValue::from_str(origin).is_err())
        {
            return Err(format!("http.allowed_origins has an invalid origin '{}'", origin));
        }
        Ok(())
    }

    pub(crate) fn origin_headers(&self) -> Vec<HeaderValue> {
        self.allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_bind_loopback_and_allow_any_origin() {
        let config = HttpServerConfig::default();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert!(config.allowed_origins.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: HttpServerConfig =
            serde_json::from_str(r#"{"host": "0.0.0.0", "allowed_origins": ["https://till.example"]}"#)
                .unwrap();
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.origin_headers().len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = HttpServerConfig {
            port: 0,
            ..HttpServerConfig::default()
        };
        assert!(config.validate().unwrap_err().contains("http.port"));

        let config = HttpServerConfig {
            allowed_origins: vec!["https://ok.example".to_string(), "bad\norigin".to_string()],
            ..HttpServerConfig::default()
        };
        assert!(config.validate().unwrap_err().contains("bad"));
    }

    #[test]
    fn test_host_must_be_an_address() {
        let result = serde_json::from_str::<HttpServerConfig>(r#"{"host": "localhost"}"#);
        assert!(result.is_err());
    }
}
