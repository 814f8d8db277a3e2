//! Broker settings and their TOML file representation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::broker::{DEFAULT_REQUEST_TIMEOUT, SendOptions};
use crate::channel::OUTBOUND_QUEUE_CAPACITY;
use crate::error::ConfigError;

/// Backend endpoint used when nothing is configured.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:1337";

/// Resolved settings, every field filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    /// Backend URL. `http`/`ws` URLs and bare `host:port` are accepted.
    pub endpoint: String,
    /// Request deadline in milliseconds; 0 disables it.
    pub request_timeout_ms: u64,
    pub queue_until_connected: bool,
    pub single_flight: bool,
    pub outbound_queue_capacity: usize,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
            queue_until_connected: false,
            single_flight: false,
            outbound_queue_capacity: OUTBOUND_QUEUE_CAPACITY,
        }
    }
}

/// One configuration layer as written in `callwire.toml`. Absent keys leave
/// the lower layer untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsFile {
    pub endpoint: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub queue_until_connected: Option<bool>,
    pub single_flight: Option<bool>,
    pub outbound_queue_capacity: Option<usize>,
}

impl BrokerSettings {
    /// Overlay a configuration layer on top of these settings.
    pub fn apply(&mut self, layer: SettingsFile) {
        if let Some(endpoint) = layer.endpoint {
            self.endpoint = endpoint;
        }
        if let Some(timeout) = layer.request_timeout_ms {
            self.request_timeout_ms = timeout;
        }
        if let Some(queue) = layer.queue_until_connected {
            self.queue_until_connected = queue;
        }
        if let Some(single_flight) = layer.single_flight {
            self.single_flight = single_flight;
        }
        if let Some(capacity) = layer.outbound_queue_capacity {
            self.outbound_queue_capacity = capacity;
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    /// Default options for calls made through a broker built from these
    /// settings.
    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            timeout: self.request_timeout(),
            queue_until_connected: self.queue_until_connected,
            single_flight: self.single_flight,
        }
    }

    /// `host:port` to open the TCP connection to.
    ///
    /// The scheme only supplies the default port (`http`/`ws` 80,
    /// `https`/`wss` 443); the path is ignored.
    pub fn socket_addr(&self) -> Result<String, ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            message: message.to_string(),
        };

        let with_scheme = if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            format!("tcp://{}", self.endpoint)
        };
        let url = Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        Ok(format!("{}:{}", host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_point_at_local_backend() {
        let settings = BrokerSettings::default();
        assert_eq!(settings.socket_addr().unwrap(), "127.0.0.1:1337");
        assert_eq!(settings.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.outbound_queue_capacity, 256);
    }

    #[rstest]
    #[case("http://127.0.0.1:1337", "127.0.0.1:1337")]
    #[case("http://devbox:8080/socket.io", "devbox:8080")]
    #[case("ws://devbox", "devbox:80")]
    #[case("https://devbox", "devbox:443")]
    #[case("localhost:1337", "localhost:1337")]
    #[case("10.0.0.5:9000", "10.0.0.5:9000")]
    fn socket_addr_resolves_endpoint(#[case] endpoint: &str, #[case] expected: &str) {
        let settings = BrokerSettings {
            endpoint: endpoint.to_string(),
            ..BrokerSettings::default()
        };
        assert_eq!(settings.socket_addr().unwrap(), expected);
    }

    #[rstest]
    #[case("localhost")]
    #[case("tcp://devbox")]
    #[case("")]
    fn socket_addr_rejects_unusable_endpoint(#[case] endpoint: &str) {
        let settings = BrokerSettings {
            endpoint: endpoint.to_string(),
            ..BrokerSettings::default()
        };
        assert!(matches!(
            settings.socket_addr(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn apply_overrides_only_present_fields() {
        let mut settings = BrokerSettings::default();
        settings.apply(SettingsFile {
            request_timeout_ms: Some(0),
            single_flight: Some(true),
            ..SettingsFile::default()
        });

        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.request_timeout(), None);
        assert!(settings.single_flight);
        assert!(!settings.queue_until_connected);
    }

    #[test]
    fn settings_file_uses_camel_case_keys() {
        let layer: SettingsFile = toml::from_str(
            r#"
            endpoint = "http://devbox:1337"
            requestTimeoutMs = 5000
            queueUntilConnected = true
            "#,
        )
        .unwrap();

        assert_eq!(layer.endpoint.as_deref(), Some("http://devbox:1337"));
        assert_eq!(layer.request_timeout_ms, Some(5000));
        assert_eq!(layer.queue_until_connected, Some(true));
        assert_eq!(layer.single_flight, None);
    }

    #[test]
    fn settings_file_rejects_unknown_keys() {
        assert!(toml::from_str::<SettingsFile>("endpiont = \"typo\"").is_err());
    }

    #[test]
    fn send_options_follow_settings() {
        let settings = BrokerSettings {
            request_timeout_ms: 250,
            queue_until_connected: true,
            ..BrokerSettings::default()
        };
        let options = settings.send_options();
        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
        assert!(options.queue_until_connected);
        assert!(!options.single_flight);
    }
}
