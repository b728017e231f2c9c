//! fixp-protocol: wire types and binary serialization for the FIXP-style
//! session and application protocol.
//!
//! Every frame on the wire is `{SessionHeader}{MessageHeader}{Payload}`.
//! `SessionHeader` and `MessageHeader` are fixed-width and schema-stable;
//! `Payload` is one of the template-id-tagged structs in [`app`] or
//! [`session_control`], encoded with `bytes::{Buf, BufMut}` rather than a
//! self-describing format — there is no tag byte inside the payload itself,
//! the template id in `MessageHeader` carries that information.

pub mod app;
pub mod error;
pub mod frame;
pub mod header;
pub mod session_control;

pub use error::CodecError;
pub use frame::{decode_frame, encode_frame, Frame};
pub use header::{template, MessageHeader, SessionHeader, SCHEMA_ID, SCHEMA_VERSION};

pub use app::{
    ExecutionReport, NewOrderSingle, OrdType, OrderCancelReject, OrderCancelRequest, Side, Symbol,
    TimeInForce,
};

pub use session_control::{
    Establish, EstablishmentAck, EstablishmentReject, Negotiate, NegotiationReject,
    NegotiationResponse, RetransmitRequest, RetransmitResponse, Sequence, Terminate,
};
