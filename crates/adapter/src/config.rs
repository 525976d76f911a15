//! Link configuration.
//!
//! Defaults can be overridden from the environment:
//!
//! - `ECHOESPHERE_LINK_HOST`: bind address (default "127.0.0.1")
//! - `ECHOESPHERE_LINK_PORT`: port number (default 65432)
//! - `ECHOESPHERE_LINK_MAX_FRAME`: largest inbound frame in bytes (default 64 MiB)
//! - `ECHOESPHERE_LINK_MAX_PENDING`: inbound event queue capacity (default 64)
//! - `ECHOESPHERE_LINK_LOG_PATH`: append every frame to this JSON-lines file
//! - `ECHOESPHERE_LINK_DISABLED`: "1" or "true" disables the link entirely

use std::path::PathBuf;

use crate::types::{DEFAULT_MAX_FRAME_LEN, DEFAULT_PORT};

pub const ENV_HOST: &str = "ECHOESPHERE_LINK_HOST";
pub const ENV_PORT: &str = "ECHOESPHERE_LINK_PORT";
pub const ENV_MAX_FRAME: &str = "ECHOESPHERE_LINK_MAX_FRAME";
pub const ENV_MAX_PENDING: &str = "ECHOESPHERE_LINK_MAX_PENDING";
pub const ENV_LOG_PATH: &str = "ECHOESPHERE_LINK_LOG_PATH";
pub const ENV_DISABLED: &str = "ECHOESPHERE_LINK_DISABLED";

/// Server configuration
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub host: String,
    pub port: u16,
    pub max_frame_len: usize,
    pub max_pending_events: usize,
    pub wire_log_path: Option<PathBuf>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            max_pending_events: 64,
            wire_log_path: None,
        }
    }
}

impl LinkConfig {
    /// Create from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let host = lookup(ENV_HOST)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.host);
        let port = lookup(ENV_PORT)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.port);
        let max_frame_len = lookup(ENV_MAX_FRAME)
            .and_then(|s| s.trim().parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(defaults.max_frame_len);
        let max_pending_events = lookup(ENV_MAX_PENDING)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.max_pending_events);
        let wire_log_path = lookup(ENV_LOG_PATH)
            .map(|s| s.trim().to_string())
            .and_then(|s| if s.is_empty() { None } else { Some(PathBuf::from(s)) });

        Self {
            host,
            port,
            max_frame_len,
            max_pending_events,
            wire_log_path,
        }
    }

    /// Check if the link is disabled via environment
    pub fn is_disabled() -> bool {
        std::env::var(ENV_DISABLED)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// `host:port` as handed to the resolver when binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Probe whether `host:port` can currently be bound.
///
/// Uses a blocking std listener so it can run before any runtime exists.
pub fn check_tcp_listen_available(host: &str, port: u16) -> std::io::Result<()> {
    let listener = std::net::TcpListener::bind((host, port))?;
    drop(listener);
    Ok(())
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
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.port, 65432);
        assert_eq!(config.host, "127.0.0.1");
        assert!(config.wire_log_path.is_none());
        assert_eq!(config.bind_addr(), "127.0.0.1:65432");
    }

    #[test]
    fn test_overrides() {
        let config = LinkConfig::from_lookup(lookup_from(&[
            (ENV_HOST, "0.0.0.0"),
            (ENV_PORT, "7000"),
            (ENV_MAX_FRAME, "1024"),
            (ENV_MAX_PENDING, "4"),
            (ENV_LOG_PATH, " /tmp/wire.jsonl "),
        ]));
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 7000);
        assert_eq!(config.max_frame_len, 1024);
        assert_eq!(config.max_pending_events, 4);
        assert_eq!(config.wire_log_path, Some(PathBuf::from("/tmp/wire.jsonl")));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = LinkConfig::from_lookup(lookup_from(&[
            (ENV_PORT, "not-a-port"),
            (ENV_MAX_FRAME, "0"),
            (ENV_LOG_PATH, "   "),
        ]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.max_frame_len, DEFAULT_MAX_FRAME_LEN);
        assert!(config.wire_log_path.is_none());
    }

    #[test]
    fn test_port_check_fails_when_port_in_use() {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let err = check_tcp_listen_available("127.0.0.1", port).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::AddrInUse);
    }
}
