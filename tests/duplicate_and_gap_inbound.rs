//! Scenario: the exchange sends the first fill twice (duplicate) and drops
//! the second fill outright (gap). The client must discard the duplicate
//! silently and recover the gap via a `RetransmitRequest` once the next
//! heartbeat reveals it, without ever handing a duplicate to the caller.

use std::net::SocketAddr;
use std::time::Duration;

use fixp_protocol::{OrdType, Side, Symbol, TimeInForce};
use fixp_test_support::{ExchangeBehavior, MockExchange};
use fixp_trader::codec::Message;
use fixp_trader::{Trader, TraderConfig};

fn config_for(addr: SocketAddr) -> TraderConfig {
    let mut config = TraderConfig::default();
    config.transport.scheme = "ws".to_owned();
    config.transport.host = addr.ip().to_string();
    config.transport.port = addr.port();
    config.transport.path = String::new();
    config.heartbeat_interval_ms = 150;
    config.timeout_seconds = 2;
    config
}

async fn next_order(trader: &Trader, cl_ord_id: u64) {
    let order = trader
        .create_order()
        .cl_ord_id(cl_ord_id)
        .symbol(Symbol::new("GOOG").unwrap())
        .side(Side::Buy)
        .order_qty(1)
        .price(1)
        .ord_type(OrdType::Limit)
        .time_in_force(TimeInForce::Day)
        .build();
    trader.send(order).await.unwrap();
}

#[tokio::test]
async fn duplicate_is_discarded_and_gap_is_recovered_via_retransmit() {
    let exchange = MockExchange::start_with_behavior(ExchangeBehavior {
        duplicate_first_execution_report: true,
        gap_before_second_execution_report: true,
        ..Default::default()
    })
    .await
    .unwrap();
    let trader = Trader::new(config_for(exchange.local_addr())).unwrap();

    trader.open().await.unwrap();
    trader
        .wait_until_established(Duration::from_secs(2))
        .await
        .unwrap();

    next_order(&trader, 1).await;
    let first = tokio::time::timeout(Duration::from_secs(1), trader.next_message())
        .await
        .unwrap()
        .expect("first execution report expected");
    match first {
        Message::ExecutionReport(report) => assert_eq!(report.cl_ord_id, 1),
        other => panic!("unexpected message: {other:?}"),
    }

    // The duplicate delivery of the same report must not surface as a
    // second message; nothing else should be waiting right now.
    let immediate = tokio::time::timeout(Duration::from_millis(50), trader.next_message()).await;
    assert!(immediate.is_err(), "duplicate execution report leaked through");

    next_order(&trader, 2).await;

    // The second fill is dropped at the exchange; the client only learns
    // about the gap from a heartbeat and recovers it via retransmit.
    let recovered = tokio::time::timeout(Duration::from_secs(2), trader.next_message())
        .await
        .unwrap()
        .expect("retransmitted execution report expected");
    match recovered {
        Message::ExecutionReport(report) => assert_eq!(report.symbol.as_str(), "RETRY"),
        other => panic!("unexpected message: {other:?}"),
    }

    trader.close().await.unwrap();
}
