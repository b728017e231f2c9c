//! Error taxonomy for the trader facade and its collaborators.
//!
//! Mirrors the per-module `thiserror` enum style used throughout this
//! codebase (e.g. `receiver::session::SessionError`,
//! `forwarder::uplink::UplinkError`): one `#[derive(Error)]` enum per module
//! boundary, `#[from]` for cheap conversion at `?` sites, and a `Display`
//! message an operator can read without cross-referencing source.

use thiserror::Error;

/// Top-level error returned by [`crate::trader::Trader`] operations.
#[derive(Debug, Error)]
pub enum TraderError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Codec(#[from] fixp_protocol::CodecError),

    #[error("send attempted while session was not established")]
    NotEstablished,

    #[error("blocking wait was cancelled")]
    Interrupted,

    #[error("bounded wait timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("no codec provider registered under the name '{0}'")]
    NoSuchProvider(String),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("session already has a subscriber attached")]
    AlreadySubscribed,
}

/// TLS/handshake/socket failures from the transport adapter.
///
/// Surfaced to the trader's error sink; on receipt the session is demoted
/// to `NOT_ESTABLISHED` rather than torn down, since the session object
/// itself stays usable across a reconnect.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("invalid transport URI '{0}'")]
    InvalidUri(String),

    #[error("TLS/WebSocket handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("failed to read TLS trust material: {0}")]
    TrustMaterial(String),

    #[error("send over closed or failed transport: {0}")]
    SendFailed(String),

    #[error("transport is not connected")]
    NotConnected,
}

/// Errors raised while loading `trader.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}
