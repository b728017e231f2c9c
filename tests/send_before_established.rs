//! Scenario: the exchange accepts `Negotiate` but never acks `Establish`.
//! `send` must fail with `NotEstablished` once the bounded wait times out,
//! release its buffer, and leave the session state untouched.

use std::net::SocketAddr;
use std::time::Duration;

use fixp_protocol::{OrdType, Side, Symbol, TimeInForce};
use fixp_test_support::{ExchangeBehavior, MockExchange};
use fixp_trader::error::TraderError;
use fixp_trader::session::SessionState;
use fixp_trader::{Trader, TraderConfig};

fn config_for(addr: SocketAddr) -> TraderConfig {
    let mut config = TraderConfig::default();
    config.transport.scheme = "ws".to_owned();
    config.transport.host = addr.ip().to_string();
    config.transport.port = addr.port();
    config.transport.path = String::new();
    config.heartbeat_interval_ms = 500;
    config.timeout_seconds = 1;
    config
}

#[tokio::test]
async fn send_times_out_when_establish_is_never_acked() {
    let exchange = MockExchange::start_with_behavior(ExchangeBehavior {
        withhold_establishment_ack: true,
        ..Default::default()
    })
    .await
    .unwrap();
    let trader = Trader::new(config_for(exchange.local_addr())).unwrap();

    trader.open().await.unwrap();

    // Give the negotiate round trip a moment, then confirm we're stuck in
    // NEGOTIATED rather than ESTABLISHED.
    let _ = trader
        .wait_until_established(Duration::from_millis(200))
        .await;
    assert_eq!(trader.state(), SessionState::Negotiated);

    let order = trader
        .create_order()
        .cl_ord_id(1)
        .symbol(Symbol::new("IBM").unwrap())
        .side(Side::Buy)
        .order_qty(5)
        .price(100)
        .ord_type(OrdType::Limit)
        .time_in_force(TimeInForce::Day)
        .build();

    let err = trader.send(order).await.unwrap_err();
    assert!(matches!(err, TraderError::NotEstablished));

    // State is unchanged by the failed send.
    assert_eq!(trader.state(), SessionState::Negotiated);
}
