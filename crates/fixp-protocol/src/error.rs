use thiserror::Error;

/// Errors raised while decoding a wire frame.
///
/// Mirrors the wrap-time failures `wrap` must surface per the codec-provider
/// contract: an unrecognized schema id or template id must fail without any
/// partial decoding becoming observable to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame too short: need at least {need} bytes, have {have}")]
    FrameTooShort { need: usize, have: usize },
    #[error("unknown schema id {found}, expected {expected}")]
    UnknownSchema { found: u16, expected: u16 },
    #[error("unknown template id {0}")]
    UnknownTemplate(u16),
    #[error("payload length {found} does not match template {template_id} (expected {expected})")]
    BadPayloadLength {
        template_id: u16,
        expected: usize,
        found: usize,
    },
    #[error("invalid field value in template {template_id}: {reason}")]
    InvalidField { template_id: u16, reason: String },
}
