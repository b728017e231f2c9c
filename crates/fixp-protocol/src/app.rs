//! Application payload types: `NewOrderSingle`, `OrderCancelRequest` (outbound)
//! and `ExecutionReport`, `OrderCancelReject` (inbound).

use bytes::{Buf, BufMut};

use crate::error::CodecError;
use crate::header::template;

/// An 8-byte, space-padded ASCII symbol, the fixed-width encoding SBE schemas
/// typically use for short identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol([u8; 8]);

impl Symbol {
    pub fn new(s: &str) -> Result<Self, CodecError> {
        if !s.is_ascii() || s.len() > 8 {
            return Err(CodecError::InvalidField {
                template_id: 0,
                reason: format!("symbol '{s}' must be <=8 ASCII bytes"),
            });
        }
        let mut bytes = [b' '; 8];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self(bytes))
    }

    pub fn as_str(&self) -> &str {
        let end = self.0.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
        std::str::from_utf8(&self.0[..end]).unwrap_or("")
    }

    fn encode(self, out: &mut impl BufMut) {
        out.put_slice(&self.0);
    }

    fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        if buf.remaining() < 8 {
            return Err(CodecError::FrameTooShort {
                need: 8,
                have: buf.remaining(),
            });
        }
        let mut bytes = [0u8; 8];
        buf.copy_to_slice(&mut bytes);
        Ok(Self(bytes))
    }
}

/// `Side`: the side of the market an order or report refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    fn to_wire(self) -> u8 {
        match self {
            Side::Buy => 1,
            Side::Sell => 2,
        }
    }

    fn from_wire(template_id: u16, v: u8) -> Result<Self, CodecError> {
        match v {
            1 => Ok(Side::Buy),
            2 => Ok(Side::Sell),
            other => Err(CodecError::InvalidField {
                template_id,
                reason: format!("unknown side {other}"),
            }),
        }
    }
}

/// `OrdType`: market or limit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrdType {
    Market,
    Limit,
}

impl OrdType {
    fn to_wire(self) -> u8 {
        match self {
            OrdType::Market => 1,
            OrdType::Limit => 2,
        }
    }

    fn from_wire(template_id: u16, v: u8) -> Result<Self, CodecError> {
        match v {
            1 => Ok(OrdType::Market),
            2 => Ok(OrdType::Limit),
            other => Err(CodecError::InvalidField {
                template_id,
                reason: format!("unknown ord_type {other}"),
            }),
        }
    }
}

/// `TimeInForce`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInForce {
    Day,
    GoodTillCancel,
    ImmediateOrCancel,
}

impl TimeInForce {
    fn to_wire(self) -> u8 {
        match self {
            TimeInForce::Day => 0,
            TimeInForce::GoodTillCancel => 1,
            TimeInForce::ImmediateOrCancel => 3,
        }
    }

    fn from_wire(template_id: u16, v: u8) -> Result<Self, CodecError> {
        match v {
            0 => Ok(TimeInForce::Day),
            1 => Ok(TimeInForce::GoodTillCancel),
            3 => Ok(TimeInForce::ImmediateOrCancel),
            other => Err(CodecError::InvalidField {
                template_id,
                reason: format!("unknown time_in_force {other}"),
            }),
        }
    }
}

/// `NewOrderSingle`: block length is fixed at 24 bytes
/// (`8 + 8 + 4 + 8 + 1 + 1` = cl_ord_id + symbol + order_qty + price + ord_type + ...).
pub const NEW_ORDER_SINGLE_LEN: usize = 8 + 8 + 1 + 4 + 8 + 1 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderSingle {
    pub cl_ord_id: u64,
    pub symbol: Symbol,
    pub side: Side,
    pub order_qty: u32,
    /// Fixed-point price, scaled by 10,000.
    pub price: i64,
    pub ord_type: OrdType,
    pub time_in_force: TimeInForce,
}

impl NewOrderSingle {
    pub const LEN: usize = NEW_ORDER_SINGLE_LEN;

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u64_le(self.cl_ord_id);
        self.symbol.encode(out);
        out.put_u8(self.side.to_wire());
        out.put_u32_le(self.order_qty);
        out.put_i64_le(self.price);
        out.put_u8(self.ord_type.to_wire());
        out.put_u8(self.time_in_force.to_wire());
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        require(buf, NEW_ORDER_SINGLE_LEN, template::NEW_ORDER_SINGLE)?;
        let cl_ord_id = buf.get_u64_le();
        let symbol = Symbol::decode(buf)?;
        let side = Side::from_wire(template::NEW_ORDER_SINGLE, buf.get_u8())?;
        let order_qty = buf.get_u32_le();
        let price = buf.get_i64_le();
        let ord_type = OrdType::from_wire(template::NEW_ORDER_SINGLE, buf.get_u8())?;
        let time_in_force = TimeInForce::from_wire(template::NEW_ORDER_SINGLE, buf.get_u8())?;
        Ok(Self {
            cl_ord_id,
            symbol,
            side,
            order_qty,
            price,
            ord_type,
            time_in_force,
        })
    }
}

pub const ORDER_CANCEL_REQUEST_LEN: usize = 8 + 8 + 8 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderCancelRequest {
    pub cl_ord_id: u64,
    pub orig_cl_ord_id: u64,
    pub symbol: Symbol,
    pub side: Side,
}

impl OrderCancelRequest {
    pub const LEN: usize = ORDER_CANCEL_REQUEST_LEN;

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u64_le(self.cl_ord_id);
        out.put_u64_le(self.orig_cl_ord_id);
        self.symbol.encode(out);
        out.put_u8(self.side.to_wire());
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        require(buf, ORDER_CANCEL_REQUEST_LEN, template::ORDER_CANCEL_REQUEST)?;
        let cl_ord_id = buf.get_u64_le();
        let orig_cl_ord_id = buf.get_u64_le();
        let symbol = Symbol::decode(buf)?;
        let side = Side::from_wire(template::ORDER_CANCEL_REQUEST, buf.get_u8())?;
        Ok(Self {
            cl_ord_id,
            orig_cl_ord_id,
            symbol,
            side,
        })
    }
}

pub const EXECUTION_REPORT_LEN: usize = 8 + 8 + 1 + 1 + 8 + 1 + 4 + 4 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReport {
    pub cl_ord_id: u64,
    pub order_id: u64,
    pub exec_type: u8,
    pub ord_status: u8,
    pub symbol: Symbol,
    pub side: Side,
    pub leaves_qty: u32,
    pub cum_qty: u32,
    pub last_px: i64,
}

impl ExecutionReport {
    pub const LEN: usize = EXECUTION_REPORT_LEN;

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u64_le(self.cl_ord_id);
        out.put_u64_le(self.order_id);
        out.put_u8(self.exec_type);
        out.put_u8(self.ord_status);
        self.symbol.encode(out);
        out.put_u8(self.side.to_wire());
        out.put_u32_le(self.leaves_qty);
        out.put_u32_le(self.cum_qty);
        out.put_i64_le(self.last_px);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        require(buf, EXECUTION_REPORT_LEN, template::EXECUTION_REPORT)?;
        let cl_ord_id = buf.get_u64_le();
        let order_id = buf.get_u64_le();
        let exec_type = buf.get_u8();
        let ord_status = buf.get_u8();
        let symbol = Symbol::decode(buf)?;
        let side = Side::from_wire(template::EXECUTION_REPORT, buf.get_u8())?;
        let leaves_qty = buf.get_u32_le();
        let cum_qty = buf.get_u32_le();
        let last_px = buf.get_i64_le();
        Ok(Self {
            cl_ord_id,
            order_id,
            exec_type,
            ord_status,
            symbol,
            side,
            leaves_qty,
            cum_qty,
            last_px,
        })
    }
}

pub const ORDER_CANCEL_REJECT_LEN: usize = 8 + 8 + 1 + 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderCancelReject {
    pub cl_ord_id: u64,
    pub orig_cl_ord_id: u64,
    pub ord_status: u8,
    pub cxl_rej_reason: u16,
}

impl OrderCancelReject {
    pub const LEN: usize = ORDER_CANCEL_REJECT_LEN;

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u64_le(self.cl_ord_id);
        out.put_u64_le(self.orig_cl_ord_id);
        out.put_u8(self.ord_status);
        out.put_u16_le(self.cxl_rej_reason);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        require(buf, ORDER_CANCEL_REJECT_LEN, template::ORDER_CANCEL_REJECT)?;
        let cl_ord_id = buf.get_u64_le();
        let orig_cl_ord_id = buf.get_u64_le();
        let ord_status = buf.get_u8();
        let cxl_rej_reason = buf.get_u16_le();
        Ok(Self {
            cl_ord_id,
            orig_cl_ord_id,
            ord_status,
            cxl_rej_reason,
        })
    }
}

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

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn new_order_single_round_trips() {
        let order = NewOrderSingle {
            cl_ord_id: 42,
            symbol: Symbol::new("AAPL").unwrap(),
            side: Side::Buy,
            order_qty: 100,
            price: 1_500_000,
            ord_type: OrdType::Limit,
            time_in_force: TimeInForce::Day,
        };
        let mut buf = BytesMut::new();
        order.encode(&mut buf);
        assert_eq!(buf.len(), NEW_ORDER_SINGLE_LEN);

        let mut cursor = buf.freeze();
        let decoded = NewOrderSingle::decode(&mut cursor).unwrap();
        assert_eq!(decoded, order);
        assert_eq!(decoded.symbol.as_str(), "AAPL");
    }

    #[test]
    fn execution_report_round_trips() {
        let report = ExecutionReport {
            cl_ord_id: 7,
            order_id: 99,
            exec_type: b'0',
            ord_status: b'0',
            symbol: Symbol::new("MSFT").unwrap(),
            side: Side::Sell,
            leaves_qty: 0,
            cum_qty: 100,
            last_px: 3_200_000,
        };
        let mut buf = BytesMut::new();
        report.encode(&mut buf);
        let mut cursor = buf.freeze();
        let decoded = ExecutionReport::decode(&mut cursor).unwrap();
        assert_eq!(decoded, report);
    }

    #[test]
    fn symbol_rejects_oversize() {
        assert!(Symbol::new("TOOLONGTICKER").is_err());
    }
}
