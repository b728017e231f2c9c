//! Shared test support for the FIXP trader: an in-process mock exchange and
//! a raw frame-level client, used by the root crate's integration tests.

pub mod frame;
pub mod mock_ws_client;
pub mod mock_ws_server;

pub use frame::{decode_frame, encode_frame, encode_frame_with_schema, DecodedFrame};
pub use mock_ws_client::MockTraderClient;
pub use mock_ws_server::{ExchangeBehavior, MockExchange};

#[cfg(test)]
mod tests {
    use super::*;
    use fixp_protocol::header::template;
    use fixp_protocol::{
        Establish, EstablishmentAck, Negotiate, NegotiationResponse, NewOrderSingle, OrdType,
        Side, Symbol, TimeInForce,
    };
    use uuid::Uuid;

    fn new_session() -> fixp_protocol::SessionHeader {
        fixp_protocol::SessionHeader::new(Uuid::new_v4())
    }

    #[tokio::test]
    async fn exchange_starts_and_reports_port() {
        let exchange = MockExchange::start().await.unwrap();
        assert_ne!(exchange.local_addr().port(), 0);
    }

    async fn negotiate_and_establish(
        client: &mut MockTraderClient,
        session: fixp_protocol::SessionHeader,
    ) -> EstablishmentAck {
        let negotiate = Negotiate {
            timestamp: 1,
            heartbeat_interval_ms: 50,
        };
        let mut buf = bytes::BytesMut::new();
        negotiate.encode(&mut buf);
        client
            .send_bytes(encode_frame(session, 0, template::NEGOTIATE, Negotiate::LEN as u16, &buf))
            .await
            .unwrap();

        let response = client.recv_frame().await.unwrap();
        assert_eq!(response.header.template_id, template::NEGOTIATION_RESPONSE);
        let _ = NegotiationResponse::decode(&mut response.payload.clone()).unwrap();

        let establish = Establish {
            timestamp: 2,
            heartbeat_interval_ms: 50,
        };
        let mut buf = bytes::BytesMut::new();
        establish.encode(&mut buf);
        client
            .send_bytes(encode_frame(session, 0, template::ESTABLISH, Establish::LEN as u16, &buf))
            .await
            .unwrap();

        let ack_frame = client.recv_frame().await.unwrap();
        assert_eq!(ack_frame.header.template_id, template::ESTABLISHMENT_ACK);
        EstablishmentAck::decode(&mut ack_frame.payload.clone()).unwrap()
    }

    #[tokio::test]
    async fn full_handshake_and_fill() {
        let exchange = MockExchange::start().await.unwrap();
        let url = format!("ws://{}", exchange.local_addr());
        let mut client = MockTraderClient::connect(&url).await.unwrap();
        let session = new_session();

        let ack = negotiate_and_establish(&mut client, session).await;
        assert_eq!(ack.next_seq_no, 1);

        let order = NewOrderSingle {
            cl_ord_id: 1,
            symbol: Symbol::new("AAPL").unwrap(),
            side: Side::Buy,
            order_qty: 10,
            price: 1_000_000,
            ord_type: OrdType::Limit,
            time_in_force: TimeInForce::Day,
        };
        let mut buf = bytes::BytesMut::new();
        order.encode(&mut buf);
        client
            .send_bytes(encode_frame(
                session,
                1,
                template::NEW_ORDER_SINGLE,
                NewOrderSingle::LEN as u16,
                &buf,
            ))
            .await
            .unwrap();

        let report_frame = client.recv_frame().await.unwrap();
        assert_eq!(report_frame.header.template_id, template::EXECUTION_REPORT);
    }

    #[tokio::test]
    async fn corrupt_schema_behavior_triggers_unknown_schema() {
        let exchange = MockExchange::start_with_behavior(ExchangeBehavior {
            corrupt_negotiation_response_schema: true,
            ..Default::default()
        })
        .await
        .unwrap();
        let url = format!("ws://{}", exchange.local_addr());
        let mut client = MockTraderClient::connect(&url).await.unwrap();
        let session = new_session();

        let negotiate = Negotiate {
            timestamp: 1,
            heartbeat_interval_ms: 50,
        };
        let mut buf = bytes::BytesMut::new();
        negotiate.encode(&mut buf);
        client
            .send_bytes(encode_frame(session, 0, template::NEGOTIATE, Negotiate::LEN as u16, &buf))
            .await
            .unwrap();

        let err = client.recv_frame().await.unwrap_err();
        assert!(err.to_string().contains("unknown schema"));
    }
}
