use bytes::{Buf, BufMut};

use crate::error::CodecError;

/// The schema id the bundled SBE provider registers under.
///
/// `wrap` rejects any frame whose `MessageHeader.schema_id` does not match
/// this constant with [`CodecError::UnknownSchema`].
pub const SCHEMA_ID: u16 = 1;

/// Current schema version. Bumped only on a breaking wire change.
pub const SCHEMA_VERSION: u16 = 1;

pub const SESSION_HEADER_LEN: usize = 16;
pub const MESSAGE_HEADER_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Template ids — application messages
// ---------------------------------------------------------------------------

pub mod template {
    pub const NEW_ORDER_SINGLE: u16 = 1;
    pub const ORDER_CANCEL_REQUEST: u16 = 2;
    pub const EXECUTION_REPORT: u16 = 3;
    pub const ORDER_CANCEL_REJECT: u16 = 4;

    pub const NEGOTIATE: u16 = 100;
    pub const NEGOTIATION_RESPONSE: u16 = 101;
    pub const NEGOTIATION_REJECT: u16 = 102;
    pub const ESTABLISH: u16 = 103;
    pub const ESTABLISHMENT_ACK: u16 = 104;
    pub const ESTABLISHMENT_REJECT: u16 = 105;
    pub const TERMINATE: u16 = 106;
    pub const SEQUENCE: u16 = 107;
    pub const RETRANSMIT_REQUEST: u16 = 108;
    pub const RETRANSMIT_RESPONSE: u16 = 109;
}

/// The session's opaque 16-byte identity, carried on every frame.
///
/// Transmitted during negotiation and echoed on every subsequent frame so a
/// peer can detect traffic addressed to a stale incarnation of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHeader(pub [u8; 16]);

impl SessionHeader {
    pub fn new(id: uuid::Uuid) -> Self {
        Self(*id.as_bytes())
    }

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_slice(&self.0);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        if buf.remaining() < SESSION_HEADER_LEN {
            return Err(CodecError::FrameTooShort {
                need: SESSION_HEADER_LEN,
                have: buf.remaining(),
            });
        }
        let mut id = [0u8; 16];
        buf.copy_to_slice(&mut id);
        Ok(Self(id))
    }
}

/// The fixed four-field SBE message header: `{block_length, template_id,
/// schema_id, version}`, little-endian, 8 bytes total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub block_length: u16,
    pub template_id: u16,
    pub schema_id: u16,
    pub version: u16,
}

impl MessageHeader {
    pub fn for_template(template_id: u16, block_length: u16) -> Self {
        Self {
            block_length,
            template_id,
            schema_id: SCHEMA_ID,
            version: SCHEMA_VERSION,
        }
    }

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u16_le(self.block_length);
        out.put_u16_le(self.template_id);
        out.put_u16_le(self.schema_id);
        out.put_u16_le(self.version);
    }

    /// Decode and validate the schema id against [`SCHEMA_ID`].
    ///
    /// Template-id recognition is the caller's responsibility (different
    /// callers — the application codec vs. the session framer — recognize
    /// disjoint sets of template ids).
    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        if buf.remaining() < MESSAGE_HEADER_LEN {
            return Err(CodecError::FrameTooShort {
                need: MESSAGE_HEADER_LEN,
                have: buf.remaining(),
            });
        }
        let block_length = buf.get_u16_le();
        let template_id = buf.get_u16_le();
        let schema_id = buf.get_u16_le();
        let version = buf.get_u16_le();
        if schema_id != SCHEMA_ID {
            return Err(CodecError::UnknownSchema {
                found: schema_id,
                expected: SCHEMA_ID,
            });
        }
        Ok(Self {
            block_length,
            template_id,
            schema_id,
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn message_header_round_trips() {
        let header = MessageHeader::for_template(template::NEW_ORDER_SINGLE, 42);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), MESSAGE_HEADER_LEN);

        let mut cursor = buf.freeze();
        let decoded = MessageHeader::decode(&mut cursor).expect("decode");
        assert_eq!(decoded, header);
    }

    #[test]
    fn message_header_rejects_unknown_schema() {
        let mut buf = BytesMut::new();
        buf.put_u16_le(0);
        buf.put_u16_le(template::NEW_ORDER_SINGLE);
        buf.put_u16_le(SCHEMA_ID.wrapping_add(1));
        buf.put_u16_le(SCHEMA_VERSION);

        let mut cursor = buf.freeze();
        let err = MessageHeader::decode(&mut cursor).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnknownSchema {
                found: SCHEMA_ID.wrapping_add(1),
                expected: SCHEMA_ID,
            }
        );
    }

    #[test]
    fn session_header_round_trips() {
        let id = uuid::Uuid::new_v4();
        let header = SessionHeader::new(id);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        let mut cursor = buf.freeze();
        let decoded = SessionHeader::decode(&mut cursor).expect("decode");
        assert_eq!(decoded, header);
    }
}
