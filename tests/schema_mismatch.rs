//! Scenario: the exchange sends a `NegotiationResponse` with a corrupted
//! schema id. The trader's codec must reject it and surface a codec error
//! on the error channel rather than silently treating it as a negotiation.

use std::net::SocketAddr;
use std::time::Duration;

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
async fn corrupted_negotiation_response_schema_is_reported_and_session_stays_not_negotiated() {
    let exchange = MockExchange::start_with_behavior(ExchangeBehavior {
        corrupt_negotiation_response_schema: true,
        ..Default::default()
    })
    .await
    .unwrap();
    let trader = Trader::new(config_for(exchange.local_addr())).unwrap();

    trader.open().await.unwrap();

    let err = tokio::time::timeout(Duration::from_secs(1), trader.next_error())
        .await
        .expect("an error should have been reported")
        .expect("error channel should not have closed");
    assert!(matches!(err, TraderError::Codec(_)));

    assert_eq!(trader.state(), SessionState::NotNegotiated);
}
