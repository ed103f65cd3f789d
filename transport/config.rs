// Transport configuration, overridable from the environment
use framelink_core::Role;
use std::env;
use std::time::Duration;

// Environment variables for configuration
// FRAMELINK_HOST: Remote host for the connector role (default: 127.0.0.1)
// FRAMELINK_PORT: Remote port (connector) or local port (listener) (default: 42070)
// FRAMELINK_ROLE: connector | listener (default: listener)
// FRAMELINK_DEBUG: 0/1 or false/true, diagnostic output (default: 1)
// FRAMELINK_READ_TIMEOUT_MS: Receive timeout, 0 or unset blocks forever
// FRAMELINK_MAX_FRAME_LEN: Largest frame accepted by receive (default: unlimited)

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 42070;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub role: Role,
    pub debug: bool,
    pub read_timeout: Option<Duration>,
    pub max_frame_len: Option<u32>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            role: Role::Listener,
            debug: true,
            read_timeout: None,
            max_frame_len: None,
        }
    }
}

impl TransportConfig {
    pub fn connector(host: &str, port: u16) -> Self {
        TransportConfig {
            host: host.to_string(),
            port,
            role: Role::Connector,
            ..Default::default()
        }
    }

    pub fn listener(port: u16) -> Self {
        TransportConfig {
            port,
            role: Role::Listener,
            ..Default::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; absent or unparsable values fall
    /// back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = TransportConfig::default();

        let host = lookup("FRAMELINK_HOST")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.host);

        let port = lookup("FRAMELINK_PORT")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.port);

        let role = lookup("FRAMELINK_ROLE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.role);

        let debug = lookup("FRAMELINK_DEBUG")
            .and_then(|s| parse_flag(&s))
            .unwrap_or(defaults.debug);

        let read_timeout = lookup("FRAMELINK_READ_TIMEOUT_MS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let max_frame_len = lookup("FRAMELINK_MAX_FRAME_LEN")
            .and_then(|s| s.trim().parse().ok());

        TransportConfig {
            host,
            port,
            role,
            debug,
            read_timeout,
            max_frame_len,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = TransportConfig::from_lookup(|_| None);
        assert_eq!(config, TransportConfig::default());
        assert_eq!(config.port, 42070);
        assert_eq!(config.role, Role::Listener);
        assert!(config.debug);
    }

    #[test]
    fn environment_overrides_every_field() {
        let config = TransportConfig::from_lookup(lookup_from(&[
            ("FRAMELINK_HOST", "10.0.0.7"),
            ("FRAMELINK_PORT", "9000"),
            ("FRAMELINK_ROLE", "client"),
            ("FRAMELINK_DEBUG", "off"),
            ("FRAMELINK_READ_TIMEOUT_MS", "250"),
            ("FRAMELINK_MAX_FRAME_LEN", "1024"),
        ]));
        assert_eq!(config.host, "10.0.0.7");
        assert_eq!(config.port, 9000);
        assert_eq!(config.role, Role::Connector);
        assert!(!config.debug);
        assert_eq!(config.read_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.max_frame_len, Some(1024));
    }

    #[test]
    fn garbage_values_fall_back() {
        let config = TransportConfig::from_lookup(lookup_from(&[
            ("FRAMELINK_PORT", "70000"),
            ("FRAMELINK_ROLE", "both"),
            ("FRAMELINK_DEBUG", "maybe"),
            ("FRAMELINK_READ_TIMEOUT_MS", "0"),
        ]));
        assert_eq!(config, TransportConfig::default());
    }
}
