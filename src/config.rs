//! Trader configuration loading.
//!
//! TOML is the sole config source; no environment-variable overrides except
//! the two TLS trust knobs the transport adapter reads directly (see
//! `crate::transport`). Default config path: `/etc/fixp-trader/trader.toml`,
//! matching `forwarder::config::load_config`'s default-path convention.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Fully-resolved trader configuration, defaults already applied.
#[derive(Debug, Clone)]
pub struct TraderConfig {
    pub encoding: String,
    pub transport: TransportSettings,
    pub heartbeat_interval_ms: u32,
    pub timeout_seconds: u64,
    pub dispatcher_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl TransportSettings {
    pub fn uri(&self) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            encoding: "SBE".to_owned(),
            transport: TransportSettings {
                scheme: "wss".to_owned(),
                host: "localhost".to_owned(),
                port: 443,
                path: "/trade".to_owned(),
            },
            heartbeat_interval_ms: 5_000,
            timeout_seconds: 5,
            dispatcher_capacity: 256,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    encoding: Option<String>,
    transport: Option<RawTransport>,
    heartbeat_interval_ms: Option<u32>,
    timeout_seconds: Option<u64>,
    dispatcher_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct RawTransport {
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: Option<String>,
}

/// Loads config from a custom path.
pub fn load_config_from_path(path: &Path) -> Result<TraderConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_config_from_str(&toml_str)
}

/// Loads config from the default path `/etc/fixp-trader/trader.toml`.
pub fn load_config() -> Result<TraderConfig, ConfigError> {
    load_config_from_path(Path::new("/etc/fixp-trader/trader.toml"))
}

/// Loads config from a TOML string, applying defaults for any field left
/// unset. Every field is optional; `encoding`, if present, must be non-empty.
pub fn load_config_from_str(toml_str: &str) -> Result<TraderConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str)?;
    let defaults = TraderConfig::default();

    let encoding = raw.encoding.unwrap_or(defaults.encoding);
    if encoding.trim().is_empty() {
        return Err(ConfigError::InvalidValue(
            "encoding must not be empty".to_owned(),
        ));
    }

    let transport = match raw.transport {
        Some(t) => TransportSettings {
            scheme: t.scheme.unwrap_or(defaults.transport.scheme),
            host: t.host.unwrap_or(defaults.transport.host),
            port: t.port.unwrap_or(defaults.transport.port),
            path: t.path.unwrap_or(defaults.transport.path),
        },
        None => defaults.transport,
    };

    Ok(TraderConfig {
        encoding,
        transport,
        heartbeat_interval_ms: raw
            .heartbeat_interval_ms
            .unwrap_or(defaults.heartbeat_interval_ms),
        timeout_seconds: raw.timeout_seconds.unwrap_or(defaults.timeout_seconds),
        dispatcher_capacity: raw
            .dispatcher_capacity
            .unwrap_or(defaults.dispatcher_capacity),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_config_is_empty() {
        let cfg = load_config_from_str("").unwrap();
        assert_eq!(cfg.encoding, "SBE");
        assert_eq!(cfg.transport.uri(), "wss://localhost:443/trade");
        assert_eq!(cfg.heartbeat_interval_ms, 5_000);
    }

    #[test]
    fn overrides_are_honored() {
        let toml = r#"
            encoding = "SBE"
            heartbeat_interval_ms = 1000
            timeout_seconds = 2

            [transport]
            scheme = "ws"
            host = "127.0.0.1"
            port = 9001
            path = "/trade"
        "#;
        let cfg = load_config_from_str(toml).unwrap();
        assert_eq!(cfg.transport.uri(), "ws://127.0.0.1:9001/trade");
        assert_eq!(cfg.heartbeat_interval_ms, 1000);
        assert_eq!(cfg.timeout_seconds, 2);
    }

    #[test]
    fn empty_encoding_is_rejected() {
        let err = load_config_from_str(r#"encoding = """#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = load_config_from_str("not valid toml = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_a_config_file_on_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"
                encoding = "SBE"

                [transport]
                host = "exchange.example.com"
                port = 8443
            "#,
        )
        .unwrap();

        let cfg = load_config_from_path(file.path()).unwrap();
        assert_eq!(cfg.transport.host, "exchange.example.com");
        assert_eq!(cfg.transport.port, 8443);
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let err = load_config_from_path(Path::new("/no/such/trader.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
