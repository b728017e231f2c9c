//! A mock exchange for integration testing the trader against a real
//! (in-process) counterparty, rather than stubbing the transport.
//!
//! Binds to port 0 (random) and exposes the actual bound port; each test
//! spins up its own isolated exchange instance.
//!
//! # Protocol behavior
//!
//! - First frame from a client must be `Negotiate`. Anything else closes
//!   the connection.
//! - After a valid negotiate/establish handshake the exchange fills every
//!   `NewOrderSingle` immediately (one `ExecutionReport`, `exec_type = '0'`)
//!   and rejects every `OrderCancelRequest` (`OrderCancelReject`,
//!   `ord_status = '8'`). Real matching logic is out of scope for a test
//!   double.
//! - A background task sends `Sequence` heartbeats at the negotiated
//!   interval so reconnect/gap tests don't need real wall-clock waits
//!   beyond the configured interval.
//!
//! [`ExchangeBehavior`] controls the deliberate misbehavior each scenario
//! test needs: schema corruption, negotiation/establishment rejection,
//! duplicate delivery, and induced sequence gaps.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use fixp_protocol::header::template;
use fixp_protocol::{
    CodecError, EstablishmentAck, EstablishmentReject, ExecutionReport, NegotiationReject,
    NegotiationResponse, NewOrderSingle, OrderCancelReject, OrderCancelRequest, Sequence,
    SessionHeader, Side, Symbol, Terminate,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::frame::{decode_frame, encode_frame, encode_frame_with_schema};

/// Deliberate misbehavior knobs, one flag per scenario the test suite needs
/// to provoke. All default to "well-behaved".
#[derive(Debug, Clone, Default)]
pub struct ExchangeBehavior {
    pub reject_negotiation: Option<u8>,
    pub reject_establishment: Option<u8>,
    /// Corrupts the `schema_id` field of the `NegotiationResponse` header so
    /// the client's codec rejects it with `CodecError::UnknownSchema`.
    pub corrupt_negotiation_response_schema: bool,
    /// Sends the first `ExecutionReport` twice in immediate succession.
    pub duplicate_first_execution_report: bool,
    /// Silently drops the second `ExecutionReport` and only reveals the gap
    /// on the next heartbeat, requiring the client to send a
    /// `RetransmitRequest` to recover it.
    pub gap_before_second_execution_report: bool,
    /// Suppresses heartbeats entirely, so a client relying on the heartbeat
    /// deadline to detect a stalled session will time out and reconnect.
    pub suppress_heartbeats: bool,
    /// Accepts `Establish` but never sends an `EstablishmentAck`, so the
    /// connection stays open while the client's session never leaves
    /// NEGOTIATED — used to provoke a `send` timeout without a disconnect.
    pub withhold_establishment_ack: bool,
}

pub struct MockExchange {
    addr: SocketAddr,
    _task: tokio::task::JoinHandle<()>,
}

impl MockExchange {
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        Self::start_with_behavior(ExchangeBehavior::default()).await
    }

    pub async fn start_with_behavior(
        behavior: ExchangeBehavior,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let task = tokio::spawn(async move {
            Self::accept_loop(listener, behavior).await;
        });

        Ok(Self { addr, _task: task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn accept_loop(listener: TcpListener, behavior: ExchangeBehavior) {
        loop {
            match listener.accept().await {
                Ok((stream, _peer)) => {
                    let behavior = behavior.clone();
                    tokio::spawn(async move {
                        let _ = Self::handle_connection(stream, behavior).await;
                    });
                }
                Err(_) => break,
            }
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        behavior: ExchangeBehavior,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (write, mut read) = ws_stream.split();
        let write = Arc::new(Mutex::new(write));

        // The first frame is either `Negotiate` (fresh session) or
        // `Establish` (reconnect onto a session ID the client already
        // negotiated in an earlier connection) — a real exchange retains
        // enough session state to skip renegotiation in the latter case.
        let Some(first) = Self::read_frame(&mut read).await? else {
            return Ok(());
        };

        let (session, heartbeat_ms) = match first.header.template_id {
            template::NEGOTIATE => {
                let session = match Self::respond_to_negotiate(&first, &write, &behavior).await? {
                    Some(session) => session,
                    None => return Ok(()),
                };
                let Some(second) = Self::read_frame(&mut read).await? else {
                    return Ok(());
                };
                if second.header.template_id != template::ESTABLISH {
                    return Ok(());
                }
                match Self::respond_to_establish(&mut read, &second, &write, &behavior, session)
                    .await?
                {
                    Some(ms) => (session, ms),
                    None => return Ok(()),
                }
            }
            template::ESTABLISH => {
                let session = first.session;
                match Self::respond_to_establish(&mut read, &first, &write, &behavior, session)
                    .await?
                {
                    Some(ms) => (session, ms),
                    None => return Ok(()),
                }
            }
            _ => return Ok(()),
        };

        let app_seq = Arc::new(AtomicU64::new(0));
        let heartbeat_task = {
            let write = write.clone();
            let app_seq = app_seq.clone();
            let suppress = behavior.suppress_heartbeats;
            tokio::spawn(async move {
                if suppress {
                    return;
                }
                loop {
                    tokio::time::sleep(Duration::from_millis(heartbeat_ms.max(1) as u64)).await;
                    let next = app_seq.load(Ordering::SeqCst) + 1;
                    let payload = Sequence { next_seq_no: next };
                    let mut buf = bytes::BytesMut::new();
                    payload.encode(&mut buf);
                    let frame = encode_frame(
                        session,
                        0,
                        template::SEQUENCE,
                        Sequence::LEN as u16,
                        &buf,
                    );
                    if write
                        .lock()
                        .await
                        .send(Message::Binary(frame.into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            })
        };

        let result = Self::app_loop(read, write.clone(), session, app_seq, behavior).await;
        heartbeat_task.abort();
        result
    }

    /// Reads and decodes the next binary frame, or `None` at a clean close
    /// or stream end.
    async fn read_frame(
        read: &mut futures_util::stream::SplitStream<
            tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
        >,
    ) -> Result<Option<fixp_protocol::Frame>, Box<dyn std::error::Error + Send + Sync>> {
        let Some(msg) = read.next().await else {
            return Ok(None);
        };
        let bytes = match msg? {
            Message::Binary(b) => b,
            _ => return Ok(None),
        };
        let decoded = decode_frame(Bytes::from(bytes.to_vec()))
            .map_err(|e: CodecError| -> Box<dyn std::error::Error + Send + Sync> {
                Box::new(std::io::Error::other(e.to_string()))
            })?;
        Ok(Some(decoded))
    }

    async fn respond_to_negotiate(
        decoded: &fixp_protocol::Frame,
        write: &Arc<
            Mutex<
                futures_util::stream::SplitSink<
                    tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
                    Message,
                >,
            >,
        >,
        behavior: &ExchangeBehavior,
    ) -> Result<Option<SessionHeader>, Box<dyn std::error::Error + Send + Sync>> {
        let fixp_protocol::Negotiate { timestamp, .. } =
            fixp_protocol::Negotiate::decode(&mut decoded.payload.clone())
                .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
                    Box::new(std::io::Error::other(e.to_string()))
                })?;

        if let Some(reason) = behavior.reject_negotiation {
            let reject = NegotiationReject {
                request_timestamp: timestamp,
                reason_code: reason,
            };
            let mut buf = bytes::BytesMut::new();
            reject.encode(&mut buf);
            let frame = encode_frame(
                decoded.session,
                0,
                template::NEGOTIATION_REJECT,
                NegotiationReject::LEN as u16,
                &buf,
            );
            let _ = write.lock().await.send(Message::Binary(frame.into())).await;
            return Ok(None);
        }

        let response = NegotiationResponse {
            request_timestamp: timestamp,
        };
        let mut buf = bytes::BytesMut::new();
        response.encode(&mut buf);
        let frame = if behavior.corrupt_negotiation_response_schema {
            encode_frame_with_schema(
                decoded.session,
                0,
                template::NEGOTIATION_RESPONSE,
                fixp_protocol::SCHEMA_ID.wrapping_add(1),
                NegotiationResponse::LEN as u16,
                &buf,
            )
        } else {
            encode_frame(
                decoded.session,
                0,
                template::NEGOTIATION_RESPONSE,
                NegotiationResponse::LEN as u16,
                &buf,
            )
        };
        write.lock().await.send(Message::Binary(frame.into())).await?;
        Ok(Some(decoded.session))
    }

    async fn respond_to_establish(
        read: &mut futures_util::stream::SplitStream<
            tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
        >,
        decoded: &fixp_protocol::Frame,
        write: &Arc<
            Mutex<
                futures_util::stream::SplitSink<
                    tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
                    Message,
                >,
            >,
        >,
        behavior: &ExchangeBehavior,
        session: SessionHeader,
    ) -> Result<Option<u32>, Box<dyn std::error::Error + Send + Sync>> {
        let establish = fixp_protocol::Establish::decode(&mut decoded.payload.clone())
            .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
                Box::new(std::io::Error::other(e.to_string()))
            })?;

        if let Some(reason) = behavior.reject_establishment {
            let reject = EstablishmentReject {
                request_timestamp: establish.timestamp,
                reason_code: reason,
            };
            let mut buf = bytes::BytesMut::new();
            reject.encode(&mut buf);
            let frame = encode_frame(
                session,
                0,
                template::ESTABLISHMENT_REJECT,
                EstablishmentReject::LEN as u16,
                &buf,
            );
            let _ = write.lock().await.send(Message::Binary(frame.into())).await;
            return Ok(None);
        }

        if behavior.withhold_establishment_ack {
            // Leave the connection open with no ack and no reject; the
            // client's session stays NEGOTIATED forever. Park here reading
            // (and discarding) further client frames so the socket doesn't
            // look abandoned, until the client gives up and disconnects.
            while read.next().await.transpose()?.is_some() {}
            return Ok(None);
        }

        let ack = EstablishmentAck {
            request_timestamp: establish.timestamp,
            next_seq_no: 1,
        };
        let mut buf = bytes::BytesMut::new();
        ack.encode(&mut buf);
        let frame = encode_frame(
            session,
            0,
            template::ESTABLISHMENT_ACK,
            EstablishmentAck::LEN as u16,
            &buf,
        );
        write.lock().await.send(Message::Binary(frame.into())).await?;
        Ok(Some(establish.heartbeat_interval_ms))
    }

    async fn app_loop(
        mut read: futures_util::stream::SplitStream<
            tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
        >,
        write: Arc<
            Mutex<
                futures_util::stream::SplitSink<
                    tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
                    Message,
                >,
            >,
        >,
        session: SessionHeader,
        app_seq: Arc<AtomicU64>,
        behavior: ExchangeBehavior,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        while let Some(msg_result) = read.next().await {
            let msg = msg_result?;
            let bytes = match msg {
                Message::Binary(b) => b,
                Message::Close(_) => break,
                _ => continue,
            };
            let decoded = decode_frame(Bytes::from(bytes.to_vec()))
                .map_err(|e: CodecError| -> Box<dyn std::error::Error + Send + Sync> {
                    Box::new(std::io::Error::other(e.to_string()))
                })?;

            match decoded.header.template_id {
                template::NEW_ORDER_SINGLE => {
                    let order = NewOrderSingle::decode(&mut decoded.payload.clone())
                        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
                            Box::new(std::io::Error::other(e.to_string()))
                        })?;
                    let seq = app_seq.fetch_add(1, Ordering::SeqCst) + 1;
                    let report = ExecutionReport {
                        cl_ord_id: order.cl_ord_id,
                        order_id: seq,
                        exec_type: b'0',
                        ord_status: b'0',
                        symbol: order.symbol,
                        side: order.side,
                        leaves_qty: order.order_qty,
                        cum_qty: 0,
                        last_px: order.price,
                    };
                    let mut buf = bytes::BytesMut::new();
                    report.encode(&mut buf);
                    let frame = encode_frame(
                        session,
                        seq,
                        template::EXECUTION_REPORT,
                        ExecutionReport::LEN as u16,
                        &buf,
                    );

                    if seq == 1 && behavior.duplicate_first_execution_report {
                        write
                            .lock()
                            .await
                            .send(Message::Binary(frame.clone().into()))
                            .await?;
                        write
                            .lock()
                            .await
                            .send(Message::Binary(frame.into()))
                            .await?;
                    } else if seq == 2 && behavior.gap_before_second_execution_report {
                        // Dropped on purpose; the client learns about the gap
                        // from the next heartbeat's `next_seq_no`.
                    } else {
                        write.lock().await.send(Message::Binary(frame.into())).await?;
                    }
                }
                template::ORDER_CANCEL_REQUEST => {
                    let cancel = OrderCancelRequest::decode(&mut decoded.payload.clone())
                        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
                            Box::new(std::io::Error::other(e.to_string()))
                        })?;
                    let seq = app_seq.fetch_add(1, Ordering::SeqCst) + 1;
                    let reject = OrderCancelReject {
                        cl_ord_id: cancel.cl_ord_id,
                        orig_cl_ord_id: cancel.orig_cl_ord_id,
                        ord_status: b'8',
                        cxl_rej_reason: 1,
                    };
                    let mut buf = bytes::BytesMut::new();
                    reject.encode(&mut buf);
                    let frame = encode_frame(
                        session,
                        seq,
                        template::ORDER_CANCEL_REJECT,
                        OrderCancelReject::LEN as u16,
                        &buf,
                    );
                    write.lock().await.send(Message::Binary(frame.into())).await?;
                }
                template::RETRANSMIT_REQUEST => {
                    let request =
                        fixp_protocol::RetransmitRequest::decode(&mut decoded.payload.clone())
                            .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
                                Box::new(std::io::Error::other(e.to_string()))
                            })?;
                    let response = fixp_protocol::RetransmitResponse {
                        from_seq_no: request.from_seq_no,
                        count: request.count,
                    };
                    let mut buf = bytes::BytesMut::new();
                    response.encode(&mut buf);
                    let frame = encode_frame(
                        session,
                        0,
                        template::RETRANSMIT_RESPONSE,
                        fixp_protocol::RetransmitResponse::LEN as u16,
                        &buf,
                    );
                    write.lock().await.send(Message::Binary(frame.into())).await?;

                    // Replay the synthetic dropped-order-2 execution report.
                    if request.from_seq_no == 2 {
                        let report = ExecutionReport {
                            cl_ord_id: 0,
                            order_id: 2,
                            exec_type: b'0',
                            ord_status: b'0',
                            symbol: Symbol::new("RETRY").unwrap(),
                            side: Side::Buy,
                            leaves_qty: 0,
                            cum_qty: 0,
                            last_px: 0,
                        };
                        let mut buf = bytes::BytesMut::new();
                        report.encode(&mut buf);
                        let frame = encode_frame(
                            session,
                            2,
                            template::EXECUTION_REPORT,
                            ExecutionReport::LEN as u16,
                            &buf,
                        );
                        write.lock().await.send(Message::Binary(frame.into())).await?;
                    }
                }
                template::TERMINATE => {
                    let _ = Terminate::decode(&mut decoded.payload.clone());
                    break;
                }
                template::SEQUENCE => {
                    // Client-side heartbeat; no reply required.
                }
                other => {
                    return Err(Box::new(std::io::Error::other(format!(
                        "unexpected template id {other} in app loop"
                    ))));
                }
            }
        }
        Ok(())
    }
}
