//! Server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the Mentor server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
        }
    }
}

impl ServerConfig {
    /// Build from the settings layer.
    #[must_use]
    pub fn from_settings(settings: &mentor_settings::ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
        }
    }

    /// Bind address string.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn from_settings_copies_values() {
        let settings = mentor_settings::ServerSettings::default();
        let config = ServerConfig::from_settings(&settings);
        assert_eq!(config.host, settings.host);
        assert_eq!(config.port, settings.port);
    }

    #[test]
    fn serde_roundtrip() {
        let config = ServerConfig {
            host: "0.0.0.0".into(),
            port: 9000,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, "0.0.0.0");
        assert_eq!(back.port, 9000);
    }
}
