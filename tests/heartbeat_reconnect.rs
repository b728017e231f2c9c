//! Scenario: the exchange stops sending heartbeats after the handshake.
//! The client's own heartbeat monitor must notice the stalled inbound
//! stream, demote the session to NOT_ESTABLISHED, and a subsequent `open`
//! must re-establish without renegotiating.

use std::net::SocketAddr;
use std::time::Duration;

use fixp_test_support::{ExchangeBehavior, MockExchange};
use fixp_trader::session::SessionState;
use fixp_trader::{Trader, TraderConfig};

fn config_for(addr: SocketAddr) -> TraderConfig {
    let mut config = TraderConfig::default();
    config.transport.scheme = "ws".to_owned();
    config.transport.host = addr.ip().to_string();
    config.transport.port = addr.port();
    config.transport.path = String::new();
    config.heartbeat_interval_ms = 100;
    config.timeout_seconds = 2;
    config
}

#[tokio::test]
async fn stalled_heartbeats_demote_the_session_and_reconnect_recovers_it() {
    let exchange = MockExchange::start_with_behavior(ExchangeBehavior {
        suppress_heartbeats: true,
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
    assert_eq!(trader.state(), SessionState::Established);

    // No heartbeat arrives; after 2x the interval the liveness monitor
    // demotes the session on its own, without any external trigger.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(trader.state(), SessionState::NotEstablished);

    // A fresh `open` re-establishes the same session identity directly,
    // skipping negotiate.
    trader.open().await.unwrap();
    trader
        .wait_until_established(Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(trader.state(), SessionState::Established);

    trader.close().await.unwrap();
}
