//! The pluggable message-codec facade: a name-keyed registry of providers,
//! each exposing a request-builder factory, a response-view factory, and a
//! session-control framer for one wire encoding.
//!
//! Only one provider ships today (`SBE`, backed by `fixp_protocol`), but the
//! registry shape mirrors a service-provider lookup — `discover()` builds a
//! fixed list at process init and `resolve()` selects by name, which is as
//! close as a statically-compiled Rust binary gets to dynamic class loading.

use std::sync::Arc;

use fixp_protocol::header::template;
use fixp_protocol::{
    CodecError, Establish, EstablishmentAck, EstablishmentReject, ExecutionReport, Frame,
    Negotiate, NegotiationReject, NegotiationResponse, NewOrderSingle, OrdType,
    OrderCancelReject, OrderCancelRequest, RetransmitRequest, RetransmitResponse, SessionHeader,
    Sequence, Side, Symbol, Terminate, TimeInForce,
};

use crate::buffer_pool::{BufferPool, BufferRegion};
use crate::error::TraderError;

/// An inbound application message, decoded from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    ExecutionReport(ExecutionReport),
    OrderCancelReject(OrderCancelReject),
}

/// A session-control message, decoded from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControlMessage {
    NegotiationResponse(NegotiationResponse),
    NegotiationReject(NegotiationReject),
    EstablishmentAck(EstablishmentAck),
    EstablishmentReject(EstablishmentReject),
    Sequence(Sequence),
    RetransmitRequest(RetransmitRequest),
    RetransmitResponse(RetransmitResponse),
    Terminate(Terminate),
}

/// A fully-encoded outbound application message, ready for the session to
/// frame with a sequence number and hand to the transport.
pub struct OutboundMessage {
    pub template_id: u16,
    pub block_length: u16,
    pub region: BufferRegion,
}

/// Mutable, one-shot builder for a `NewOrderSingle`. Populate on the task
/// that created it, then `build()` to encode and hand off to `send`.
pub struct NewOrderSingleBuilder {
    pool: Arc<BufferPool>,
    cl_ord_id: u64,
    symbol: Symbol,
    side: Side,
    order_qty: u32,
    price: i64,
    ord_type: OrdType,
    time_in_force: TimeInForce,
}

impl NewOrderSingleBuilder {
    fn new(pool: Arc<BufferPool>) -> Self {
        Self {
            pool,
            cl_ord_id: 0,
            symbol: Symbol::new("").expect("empty symbol always fits"),
            side: Side::Buy,
            order_qty: 0,
            price: 0,
            ord_type: OrdType::Limit,
            time_in_force: TimeInForce::Day,
        }
    }

    pub fn cl_ord_id(mut self, v: u64) -> Self {
        self.cl_ord_id = v;
        self
    }

    pub fn symbol(mut self, v: Symbol) -> Self {
        self.symbol = v;
        self
    }

    pub fn side(mut self, v: Side) -> Self {
        self.side = v;
        self
    }

    pub fn order_qty(mut self, v: u32) -> Self {
        self.order_qty = v;
        self
    }

    pub fn price(mut self, v: i64) -> Self {
        self.price = v;
        self
    }

    pub fn ord_type(mut self, v: OrdType) -> Self {
        self.ord_type = v;
        self
    }

    pub fn time_in_force(mut self, v: TimeInForce) -> Self {
        self.time_in_force = v;
        self
    }

    pub fn build(self) -> OutboundMessage {
        let order = NewOrderSingle {
            cl_ord_id: self.cl_ord_id,
            symbol: self.symbol,
            side: self.side,
            order_qty: self.order_qty,
            price: self.price,
            ord_type: self.ord_type,
            time_in_force: self.time_in_force,
        };
        let region = self.pool.acquire(NewOrderSingle::LEN);
        region.with_buf(|buf| order.encode(buf));
        OutboundMessage {
            template_id: template::NEW_ORDER_SINGLE,
            block_length: NewOrderSingle::LEN as u16,
            region,
        }
    }
}

/// Mutable, one-shot builder for an `OrderCancelRequest`.
pub struct OrderCancelRequestBuilder {
    pool: Arc<BufferPool>,
    cl_ord_id: u64,
    orig_cl_ord_id: u64,
    symbol: Symbol,
    side: Side,
}

impl OrderCancelRequestBuilder {
    fn new(pool: Arc<BufferPool>) -> Self {
        Self {
            pool,
            cl_ord_id: 0,
            orig_cl_ord_id: 0,
            symbol: Symbol::new("").expect("empty symbol always fits"),
            side: Side::Buy,
        }
    }

    pub fn cl_ord_id(mut self, v: u64) -> Self {
        self.cl_ord_id = v;
        self
    }

    pub fn orig_cl_ord_id(mut self, v: u64) -> Self {
        self.orig_cl_ord_id = v;
        self
    }

    pub fn symbol(mut self, v: Symbol) -> Self {
        self.symbol = v;
        self
    }

    pub fn side(mut self, v: Side) -> Self {
        self.side = v;
        self
    }

    pub fn build(self) -> OutboundMessage {
        let cancel = OrderCancelRequest {
            cl_ord_id: self.cl_ord_id,
            orig_cl_ord_id: self.orig_cl_ord_id,
            symbol: self.symbol,
            side: self.side,
        };
        let region = self.pool.acquire(OrderCancelRequest::LEN);
        region.with_buf(|buf| cancel.encode(buf));
        OutboundMessage {
            template_id: template::ORDER_CANCEL_REQUEST,
            block_length: OrderCancelRequest::LEN as u16,
            region,
        }
    }
}

/// Hands out thread/task-affine request builders, each backed by a
/// pool-drawn buffer rather than a cached, shared one.
pub struct RequestFactory {
    pool: Arc<BufferPool>,
}

impl RequestFactory {
    pub fn new_order_single(&self) -> NewOrderSingleBuilder {
        NewOrderSingleBuilder::new(self.pool.clone())
    }

    pub fn order_cancel_request(&self) -> OrderCancelRequestBuilder {
        OrderCancelRequestBuilder::new(self.pool.clone())
    }
}

/// Wraps an inbound decoded frame into a read-only application message view.
pub struct ResponseFactory;

impl ResponseFactory {
    pub fn wrap(&self, frame: &Frame) -> Result<Message, CodecError> {
        match frame.header.template_id {
            template::EXECUTION_REPORT => {
                ExecutionReport::decode(&mut frame.payload.clone()).map(Message::ExecutionReport)
            }
            template::ORDER_CANCEL_REJECT => OrderCancelReject::decode(&mut frame.payload.clone())
                .map(Message::OrderCancelReject),
            other => Err(CodecError::UnknownTemplate(other)),
        }
    }
}

/// Encodes outbound session-control messages and decodes inbound ones.
pub struct SessionMessenger;

impl SessionMessenger {
    pub fn encode_negotiate(&self, session: SessionHeader, msg: Negotiate) -> Vec<u8> {
        let mut buf = bytes::BytesMut::new();
        msg.encode(&mut buf);
        fixp_protocol::encode_frame(session, 0, template::NEGOTIATE, Negotiate::LEN as u16, &buf)
    }

    pub fn encode_establish(&self, session: SessionHeader, msg: Establish) -> Vec<u8> {
        let mut buf = bytes::BytesMut::new();
        msg.encode(&mut buf);
        fixp_protocol::encode_frame(session, 0, template::ESTABLISH, Establish::LEN as u16, &buf)
    }

    pub fn encode_terminate(&self, session: SessionHeader, msg: Terminate) -> Vec<u8> {
        let mut buf = bytes::BytesMut::new();
        msg.encode(&mut buf);
        fixp_protocol::encode_frame(session, 0, template::TERMINATE, Terminate::LEN as u16, &buf)
    }

    pub fn encode_heartbeat(&self, session: SessionHeader, msg: Sequence) -> Vec<u8> {
        let mut buf = bytes::BytesMut::new();
        msg.encode(&mut buf);
        fixp_protocol::encode_frame(session, 0, template::SEQUENCE, Sequence::LEN as u16, &buf)
    }

    pub fn encode_retransmit_request(&self, session: SessionHeader, msg: RetransmitRequest) -> Vec<u8> {
        let mut buf = bytes::BytesMut::new();
        msg.encode(&mut buf);
        fixp_protocol::encode_frame(
            session,
            0,
            template::RETRANSMIT_REQUEST,
            RetransmitRequest::LEN as u16,
            &buf,
        )
    }

    pub fn decode(&self, frame: &Frame) -> Result<SessionControlMessage, CodecError> {
        let payload = &mut frame.payload.clone();
        match frame.header.template_id {
            template::NEGOTIATION_RESPONSE => {
                NegotiationResponse::decode(payload).map(SessionControlMessage::NegotiationResponse)
            }
            template::NEGOTIATION_REJECT => {
                NegotiationReject::decode(payload).map(SessionControlMessage::NegotiationReject)
            }
            template::ESTABLISHMENT_ACK => {
                EstablishmentAck::decode(payload).map(SessionControlMessage::EstablishmentAck)
            }
            template::ESTABLISHMENT_REJECT => {
                EstablishmentReject::decode(payload).map(SessionControlMessage::EstablishmentReject)
            }
            template::SEQUENCE => Sequence::decode(payload).map(SessionControlMessage::Sequence),
            template::RETRANSMIT_REQUEST => {
                RetransmitRequest::decode(payload).map(SessionControlMessage::RetransmitRequest)
            }
            template::RETRANSMIT_RESPONSE => {
                RetransmitResponse::decode(payload).map(SessionControlMessage::RetransmitResponse)
            }
            template::TERMINATE => Terminate::decode(payload).map(SessionControlMessage::Terminate),
            other => Err(CodecError::UnknownTemplate(other)),
        }
    }
}

/// One entry in the provider registry: a name and a factory function, the
/// Rust analogue of a compile-time service-provider registration.
struct ProviderEntry {
    name: &'static str,
    factory: fn() -> Box<dyn CodecProvider>,
}

pub trait CodecProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn request_factory(&self, pool: Arc<BufferPool>) -> RequestFactory;
    fn response_factory(&self) -> ResponseFactory;
    fn session_messenger(&self) -> SessionMessenger;
}

struct SbeCodecProvider;

impl CodecProvider for SbeCodecProvider {
    fn name(&self) -> &'static str {
        "SBE"
    }

    fn request_factory(&self, pool: Arc<BufferPool>) -> RequestFactory {
        RequestFactory { pool }
    }

    fn response_factory(&self) -> ResponseFactory {
        ResponseFactory
    }

    fn session_messenger(&self) -> SessionMessenger {
        SessionMessenger
    }
}

pub struct CodecRegistry {
    entries: Vec<ProviderEntry>,
}

impl CodecRegistry {
    pub fn discover() -> Self {
        Self {
            entries: vec![ProviderEntry {
                name: "SBE",
                factory: || Box::new(SbeCodecProvider),
            }],
        }
    }

    pub fn resolve(&self, name: &str) -> Result<Box<dyn CodecProvider>, TraderError> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| (e.factory)())
            .ok_or_else(|| TraderError::NoSuchProvider(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_pool::BufferPool;

    #[test]
    fn registry_resolves_sbe_and_rejects_unknown() {
        let registry = CodecRegistry::discover();
        let provider = registry.resolve("SBE").unwrap();
        assert_eq!(provider.name(), "SBE");
        assert!(registry.resolve("FAST").is_err());
    }

    #[test]
    fn new_order_single_builder_round_trips_through_the_wire() {
        let pool = BufferPool::new();
        let factory = RequestFactory { pool };
        let msg = factory
            .new_order_single()
            .cl_ord_id(7)
            .symbol(Symbol::new("IBM").unwrap())
            .side(Side::Sell)
            .order_qty(25)
            .price(42_0000)
            .ord_type(OrdType::Market)
            .time_in_force(TimeInForce::ImmediateOrCancel)
            .build();
        assert_eq!(msg.template_id, template::NEW_ORDER_SINGLE);
        let bytes = msg.region.with_buf(|buf| buf.clone().freeze());
        let decoded = NewOrderSingle::decode(&mut bytes.clone()).unwrap();
        assert_eq!(decoded.cl_ord_id, 7);
        assert_eq!(decoded.symbol.as_str(), "IBM");
    }
}
