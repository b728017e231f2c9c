//! Session-control payload types: negotiate/establish/finalize/heartbeat/gap.
//!
//! These share the `{SessionHeader}{MessageHeader}{Payload}` envelope with
//! application messages but are handled by the session framer rather than
//! the application codec (see `fixp_protocol::header::template`).

use bytes::{Buf, BufMut};

use crate::error::CodecError;
use crate::header::template;

fn require(buf: &impl Buf, need: usize, template_id: u16) -> Result<(), CodecError> {
    if buf.remaining() < need {
        return Err(CodecError::BadPayloadLength {
            template_id,
            expected: need,
            found: buf.remaining(),
        });
    }
    Ok(())
}

/// Sent by the client on first transport connection to open a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiate {
    pub timestamp: u64,
    pub heartbeat_interval_ms: u32,
}

impl Negotiate {
    pub const LEN: usize = 8 + 4;

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u64_le(self.timestamp);
        out.put_u32_le(self.heartbeat_interval_ms);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        require(buf, Self::LEN, template::NEGOTIATE)?;
        Ok(Self {
            timestamp: buf.get_u64_le(),
            heartbeat_interval_ms: buf.get_u32_le(),
        })
    }
}

/// Peer's acceptance of a `Negotiate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationResponse {
    pub request_timestamp: u64,
}

impl NegotiationResponse {
    pub const LEN: usize = 8;

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u64_le(self.request_timestamp);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        require(buf, Self::LEN, template::NEGOTIATION_RESPONSE)?;
        Ok(Self {
            request_timestamp: buf.get_u64_le(),
        })
    }
}

/// Peer's rejection of a `Negotiate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationReject {
    pub request_timestamp: u64,
    pub reason_code: u8,
}

impl NegotiationReject {
    pub const LEN: usize = 8 + 1;

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u64_le(self.request_timestamp);
        out.put_u8(self.reason_code);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        require(buf, Self::LEN, template::NEGOTIATION_REJECT)?;
        Ok(Self {
            request_timestamp: buf.get_u64_le(),
            reason_code: buf.get_u8(),
        })
    }
}

/// Sent by the client after a successful negotiation to establish the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Establish {
    pub timestamp: u64,
    pub heartbeat_interval_ms: u32,
}

impl Establish {
    pub const LEN: usize = 8 + 4;

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u64_le(self.timestamp);
        out.put_u32_le(self.heartbeat_interval_ms);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        require(buf, Self::LEN, template::ESTABLISH)?;
        Ok(Self {
            timestamp: buf.get_u64_le(),
            heartbeat_interval_ms: buf.get_u32_le(),
        })
    }
}

/// Peer's acceptance of an `Establish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstablishmentAck {
    pub request_timestamp: u64,
    pub next_seq_no: u64,
}

impl EstablishmentAck {
    pub const LEN: usize = 8 + 8;

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u64_le(self.request_timestamp);
        out.put_u64_le(self.next_seq_no);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        require(buf, Self::LEN, template::ESTABLISHMENT_ACK)?;
        Ok(Self {
            request_timestamp: buf.get_u64_le(),
            next_seq_no: buf.get_u64_le(),
        })
    }
}

/// Peer's rejection of an `Establish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstablishmentReject {
    pub request_timestamp: u64,
    pub reason_code: u8,
}

impl EstablishmentReject {
    pub const LEN: usize = 8 + 1;

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u64_le(self.request_timestamp);
        out.put_u8(self.reason_code);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        require(buf, Self::LEN, template::ESTABLISHMENT_REJECT)?;
        Ok(Self {
            request_timestamp: buf.get_u64_le(),
            reason_code: buf.get_u8(),
        })
    }
}

/// Graceful session teardown, sent by either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminate {
    pub reason_code: u8,
}

impl Terminate {
    pub const LEN: usize = 1;

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u8(self.reason_code);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        require(buf, Self::LEN, template::TERMINATE)?;
        Ok(Self {
            reason_code: buf.get_u8(),
        })
    }
}

/// Heartbeat ("Sequence" in FIXP terms) — keeps the flow live when there is
/// no application traffic to piggy-back on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    pub next_seq_no: u64,
}

impl Sequence {
    pub const LEN: usize = 8;

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u64_le(self.next_seq_no);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        require(buf, Self::LEN, template::SEQUENCE)?;
        Ok(Self {
            next_seq_no: buf.get_u64_le(),
        })
    }
}

/// Requests retransmission of a contiguous inbound range after a detected gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetransmitRequest {
    pub from_seq_no: u64,
    pub count: u32,
}

impl RetransmitRequest {
    pub const LEN: usize = 8 + 4;

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u64_le(self.from_seq_no);
        out.put_u32_le(self.count);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        require(buf, Self::LEN, template::RETRANSMIT_REQUEST)?;
        Ok(Self {
            from_seq_no: buf.get_u64_le(),
            count: buf.get_u32_le(),
        })
    }
}

/// Peer's acknowledgement that it is replaying the requested range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetransmitResponse {
    pub from_seq_no: u64,
    pub count: u32,
}

impl RetransmitResponse {
    pub const LEN: usize = 8 + 4;

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u64_le(self.from_seq_no);
        out.put_u32_le(self.count);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        require(buf, Self::LEN, template::RETRANSMIT_RESPONSE)?;
        Ok(Self {
            from_seq_no: buf.get_u64_le(),
            count: buf.get_u32_le(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn negotiate_round_trips() {
        let msg = Negotiate {
            timestamp: 123_456,
            heartbeat_interval_ms: 5_000,
        };
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        assert_eq!(buf.len(), Negotiate::LEN);
        let mut cursor = buf.freeze();
        assert_eq!(Negotiate::decode(&mut cursor).unwrap(), msg);
    }

    #[test]
    fn establishment_ack_round_trips() {
        let msg = EstablishmentAck {
            request_timestamp: 1,
            next_seq_no: 1,
        };
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        let mut cursor = buf.freeze();
        assert_eq!(EstablishmentAck::decode(&mut cursor).unwrap(), msg);
    }
}
