//! The `{SessionHeader}{SeqNo}{MessageHeader}{Payload}` envelope shared by
//! every frame on the wire, independent of which template the payload
//! carries.
//!
//! `SeqNo` is an 8-byte little-endian counter. Session-control frames
//! (negotiate/establish/terminate/heartbeat/gap messages) don't participate
//! in application sequencing and are encoded with `seq_no = 0`; the session
//! framer ignores the field on decode. Application frames carry the real
//! `nextOutboundSeqNo`/`expectedInboundSeqNo` value, which is how a receiver
//! tells a duplicate or a gap apart from a legitimate next message.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::CodecError;
use crate::header::{MessageHeader, SessionHeader};

pub const SEQ_NO_LEN: usize = 8;

pub fn encode_frame(
    session: SessionHeader,
    seq_no: u64,
    template_id: u16,
    block_length: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut out = BytesMut::with_capacity(
        crate::header::SESSION_HEADER_LEN
            + SEQ_NO_LEN
            + crate::header::MESSAGE_HEADER_LEN
            + payload.len(),
    );
    session.encode(&mut out);
    out.extend_from_slice(&seq_no.to_le_bytes());
    MessageHeader::for_template(template_id, block_length).encode(&mut out);
    out.extend_from_slice(payload);
    out.to_vec()
}

/// A decoded frame: the three fixed fields plus the still-undecoded payload.
pub struct Frame {
    pub session: SessionHeader,
    pub seq_no: u64,
    pub header: MessageHeader,
    pub payload: Bytes,
}

pub fn decode_frame(bytes: Bytes) -> Result<Frame, CodecError> {
    let mut buf = bytes;
    let session = SessionHeader::decode(&mut buf)?;
    if buf.remaining() < SEQ_NO_LEN {
        return Err(CodecError::FrameTooShort {
            need: SEQ_NO_LEN,
            have: buf.remaining(),
        });
    }
    let seq_no = buf.get_u64_le();
    let header = MessageHeader::decode(&mut buf)?;
    if buf.remaining() != usize::from(header.block_length) {
        return Err(CodecError::BadPayloadLength {
            template_id: header.template_id,
            expected: usize::from(header.block_length),
            found: buf.remaining(),
        });
    }
    Ok(Frame {
        session,
        seq_no,
        header,
        payload: buf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::template;

    #[test]
    fn frame_round_trips_with_seq_no() {
        let session = SessionHeader::new(uuid::Uuid::new_v4());
        let encoded = encode_frame(session, 42, template::EXECUTION_REPORT, 0, &[]);
        let decoded = decode_frame(Bytes::from(encoded)).unwrap();
        assert_eq!(decoded.session, session);
        assert_eq!(decoded.seq_no, 42);
        assert_eq!(decoded.header.template_id, template::EXECUTION_REPORT);
    }

    #[test]
    fn frame_too_short_for_seq_no_is_rejected() {
        let session = SessionHeader::new(uuid::Uuid::new_v4());
        let mut out = BytesMut::new();
        session.encode(&mut out);
        out.extend_from_slice(&[0u8; 4]);
        let err = decode_frame(out.freeze()).unwrap_err();
        assert!(matches!(err, CodecError::FrameTooShort { .. }));
    }
}
