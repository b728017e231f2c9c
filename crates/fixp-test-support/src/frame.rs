//! Thin re-export of the production frame envelope, plus one deliberately
//! malformed constructor used to provoke `UnknownSchema` in tests — the
//! production codec never needs to build a frame with a wrong schema id.

use bytes::BytesMut;
use fixp_protocol::SessionHeader;

pub use fixp_protocol::{decode_frame, encode_frame, Frame as DecodedFrame};

pub fn encode_frame_with_schema(
    session: SessionHeader,
    seq_no: u64,
    template_id: u16,
    schema_id: u16,
    block_length: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut out = BytesMut::new();
    session.encode(&mut out);
    out.extend_from_slice(&seq_no.to_le_bytes());
    out.extend_from_slice(&block_length.to_le_bytes());
    out.extend_from_slice(&template_id.to_le_bytes());
    out.extend_from_slice(&schema_id.to_le_bytes());
    out.extend_from_slice(&fixp_protocol::SCHEMA_VERSION.to_le_bytes());
    out.extend_from_slice(payload);
    out.to_vec()
}
