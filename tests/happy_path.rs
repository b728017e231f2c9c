//! End-to-end happy path: negotiate, establish, send an order, receive the
//! fill, then finalize — against the in-process mock exchange.

use std::net::SocketAddr;
use std::time::Duration;

use fixp_protocol::{OrdType, Side, Symbol, TimeInForce};
use fixp_test_support::MockExchange;
use fixp_trader::codec::Message;
use fixp_trader::session::SessionState;
use fixp_trader::{Trader, TraderConfig};

fn config_for(addr: SocketAddr) -> TraderConfig {
    let mut config = TraderConfig::default();
    config.transport.scheme = "ws".to_owned();
    config.transport.host = addr.ip().to_string();
    config.transport.port = addr.port();
    config.transport.path = String::new();
    config.heartbeat_interval_ms = 200;
    config.timeout_seconds = 2;
    config
}

#[tokio::test]
async fn order_is_filled_after_a_clean_handshake() {
    let exchange = MockExchange::start().await.unwrap();
    let trader = Trader::new(config_for(exchange.local_addr())).unwrap();

    trader.open().await.unwrap();
    trader
        .wait_until_established(Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(trader.state(), SessionState::Established);

    let order = trader
        .create_order()
        .cl_ord_id(42)
        .symbol(Symbol::new("AAPL").unwrap())
        .side(Side::Buy)
        .order_qty(10)
        .price(1_000_000)
        .ord_type(OrdType::Limit)
        .time_in_force(TimeInForce::Day)
        .build();

    let seq = trader.send(order).await.unwrap();
    assert_eq!(seq, 1);

    let msg = trader.next_message().await.expect("execution report expected");
    match msg {
        Message::ExecutionReport(report) => {
            assert_eq!(report.cl_ord_id, 42);
            assert_eq!(report.symbol.as_str(), "AAPL");
            assert_eq!(report.side, Side::Buy);
        }
        other => panic!("unexpected message: {other:?}"),
    }

    trader.close().await.unwrap();
    assert_eq!(trader.state(), SessionState::Finalized);
}

#[tokio::test]
async fn order_cancel_request_is_rejected_by_the_mock_exchange() {
    let exchange = MockExchange::start().await.unwrap();
    let trader = Trader::new(config_for(exchange.local_addr())).unwrap();

    trader.open().await.unwrap();
    trader
        .wait_until_established(Duration::from_secs(2))
        .await
        .unwrap();

    let cancel = trader
        .create_order_cancel_request()
        .cl_ord_id(2)
        .orig_cl_ord_id(1)
        .symbol(Symbol::new("MSFT").unwrap())
        .side(Side::Sell)
        .build();
    trader.send(cancel).await.unwrap();

    let msg = trader.next_message().await.expect("cancel reject expected");
    match msg {
        Message::OrderCancelReject(reject) => {
            assert_eq!(reject.cl_ord_id, 2);
            assert_eq!(reject.orig_cl_ord_id, 1);
            assert_eq!(reject.ord_status, b'8');
        }
        other => panic!("unexpected message: {other:?}"),
    }

    trader.close().await.unwrap();
}
